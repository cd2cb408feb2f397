//! HTTP surface: the axum router and its handlers.
//!
//! Handlers stay thin: resolve the session, validate the payload,
//! delegate to a service. The storage backend is injected into the
//! services once at construction; handlers never reach for it
//! directly.

use std::sync::Arc;

use axum::extract::{FromRequest, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::Validate;

use crate::cart::CartEngine;
use crate::catalog::Catalog;
use crate::checkout::Checkout;
use crate::error::{Error, Result};
use crate::models::{Product, ProductDraft, ProductPatch, ShippingDetails};
use crate::session;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub cart: CartEngine,
    pub checkout: Checkout,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, cookie_secure: bool) -> Self {
        Self {
            catalog: Catalog::new(storage.clone()),
            cart: CartEngine::new(storage.clone()),
            checkout: Checkout::new(storage),
            cookie_secure,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/products", get(list_products))
        .route("/api/products/:id", get(get_product))
        .route("/api/cart", get(get_cart).post(add_to_cart))
        .route(
            "/api/cart/:item_id",
            axum::routing::patch(update_cart_item).delete(remove_cart_item),
        )
        .route("/api/orders", get(list_orders).post(place_order))
        .route("/api/admin/products", post(create_product))
        .route(
            "/api/admin/products/:id",
            put(update_product).delete(delete_product),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON body extractor whose rejection follows the error taxonomy:
/// a missing or malformed body is a 400 validation failure, not
/// axum's default 422.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
struct Payload<T>(T);

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "organica" }))
}

async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog.list().await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog.get(id).await?))
}

async fn get_cart(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let (session_id, jar) = session::resolve(jar, state.cookie_secure);
    let lines = state.cart.list(&session_id).await?;
    Ok((jar, Json(lines)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AddToCartRequest {
    product_id: Uuid,
    #[validate(range(min = 1, max = 99, message = "quantity must be between 1 and 99"))]
    quantity: i32,
}

async fn add_to_cart(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(request): Payload<AddToCartRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;
    let (session_id, jar) = session::resolve(jar, state.cookie_secure);
    let line = state
        .cart
        .add(&session_id, request.product_id, request.quantity)
        .await?;
    Ok((StatusCode::CREATED, jar, Json(line)))
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateQuantityRequest {
    #[validate(range(min = 1, max = 99, message = "quantity must be between 1 and 99"))]
    quantity: i32,
}

async fn update_cart_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    jar: CookieJar,
    Payload(request): Payload<UpdateQuantityRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;
    let (session_id, jar) = session::resolve(jar, state.cookie_secure);
    let line = state
        .cart
        .set_quantity(&session_id, item_id, request.quantity)
        .await?;
    Ok((jar, Json(line)))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let (session_id, jar) = session::resolve(jar, state.cookie_secure);
    state.cart.remove(&session_id, item_id).await?;
    Ok((jar, Json(json!({ "success": true }))))
}

async fn place_order(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(contact): Payload<ShippingDetails>,
) -> Result<impl IntoResponse> {
    let (session_id, jar) = session::resolve(jar, state.cookie_secure);
    let order = state.checkout.place_order(&session_id, contact).await?;
    Ok((StatusCode::CREATED, jar, Json(order)))
}

async fn list_orders(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let (session_id, jar) = session::resolve(jar, state.cookie_secure);
    let orders = state.checkout.orders(&session_id).await?;
    Ok((jar, Json(orders)))
}

async fn create_product(
    State(state): State<AppState>,
    Payload(draft): Payload<ProductDraft>,
) -> Result<impl IntoResponse> {
    let product = state.catalog.create(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Payload(patch): Payload<ProductPatch>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog.update(id, patch).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.catalog.delete(id).await?;
    Ok(Json(json!({ "success": true })))
}
