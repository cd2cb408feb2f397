//! Error taxonomy and the HTTP mapping for it.
//!
//! Four classes: validation (400 with the offending field set),
//! not-found (404, also covers items owned by another session so
//! foreign ids are indistinguishable from missing ones), business
//! rules (400 with a distinct message), and storage failures (500
//! with a generic body; details go to the log only).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("product not found")]
    ProductNotFound,

    #[error("cart item not found")]
    CartItemNotFound,

    #[error("product is out of stock")]
    OutOfStock,

    #[error("cannot hold more than 99 units of one product")]
    QuantityLimitExceeded,

    #[error("quantity must be between 1 and 99")]
    InvalidQuantity,

    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid input")]
    Validation(#[from] validator::ValidationErrors),

    #[error("invalid request body")]
    MalformedBody(#[from] axum::extract::rejection::JsonRejection),

    #[error("product {0} is no longer available")]
    ProductUnavailable(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::ProductNotFound | Error::CartItemNotFound => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
            Error::OutOfStock
            | Error::QuantityLimitExceeded
            | Error::InvalidQuantity
            | Error::EmptyCart => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            Error::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid input", "details": errors }),
            ),
            Error::MalformedBody(rejection) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid input", "details": rejection.body_text() }),
            ),
            Error::ProductUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
            Error::Storage(source) => {
                tracing::error!(%source, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "storage failure" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
