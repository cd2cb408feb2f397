//! Environment-driven configuration, read once at startup.

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub cookie_secure: bool,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug)]
pub enum StorageConfig {
    Memory,
    Postgres { url: String },
    Mongo { url: String, database: String },
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageConfig::Memory => "memory",
            StorageConfig::Postgres { .. } => "postgres",
            StorageConfig::Mongo { .. } => "mongodb",
        }
    }
}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MONGO_DATABASE: &str = "organica";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = select_backend(
            std::env::var("STORAGE_BACKEND").ok().as_deref(),
            std::env::var("DATABASE_URL").ok(),
            std::env::var("MONGODB_URL").ok(),
            std::env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| DEFAULT_MONGO_DATABASE.to_string()),
        )?;
        let port = std::env::var("PORT")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("PORT must be a number")?
            .unwrap_or(DEFAULT_PORT);
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self {
            port,
            cookie_secure,
            storage,
        })
    }
}

/// Explicit `STORAGE_BACKEND` wins; otherwise infer from whichever
/// connection string is configured, falling back to memory for local
/// development.
fn select_backend(
    explicit: Option<&str>,
    database_url: Option<String>,
    mongodb_url: Option<String>,
    mongodb_database: String,
) -> anyhow::Result<StorageConfig> {
    match explicit {
        Some("memory") => Ok(StorageConfig::Memory),
        Some("postgres") => Ok(StorageConfig::Postgres {
            url: database_url.context("DATABASE_URL is required for the postgres backend")?,
        }),
        Some("mongodb") => Ok(StorageConfig::Mongo {
            url: mongodb_url.context("MONGODB_URL is required for the mongodb backend")?,
            database: mongodb_database,
        }),
        Some(other) => anyhow::bail!(
            "unknown STORAGE_BACKEND {other:?} (expected memory, postgres or mongodb)"
        ),
        None => {
            if let Some(url) = database_url {
                Ok(StorageConfig::Postgres { url })
            } else if let Some(url) = mongodb_url {
                Ok(StorageConfig::Mongo {
                    url,
                    database: mongodb_database,
                })
            } else {
                Ok(StorageConfig::Memory)
            }
        }
    }
}
