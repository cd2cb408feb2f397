//! Organica - self-hosted storefront service.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use organica::config::Config;
use organica::http::{router, AppState};
use organica::storage;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let backend = storage::connect(&config.storage).await?;
    let state = AppState::new(backend, config.cookie_secure);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(
        port = config.port,
        backend = config.storage.kind(),
        "organica listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
