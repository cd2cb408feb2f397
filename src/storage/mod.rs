//! Pluggable persistence behind one interface.
//!
//! Three backends implement [`Storage`]: an in-memory map, Postgres
//! via sqlx, and MongoDB. The backend is chosen once at startup from
//! configuration and injected into the services as `Arc<dyn Storage>`;
//! it never changes at runtime.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::models::{CartItem, Order, Product, ProductPatch};

mod memory;
mod mongo;
mod postgres;

pub use memory::MemoryStorage;
pub use mongo::MongoStorage;
pub use postgres::PgStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("document store error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("stored record could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("conflicting concurrent update")]
    Conflict,
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn list_products(&self) -> StorageResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> StorageResult<Option<Product>>;
    async fn insert_product(&self, product: Product) -> StorageResult<Product>;
    async fn update_product(&self, id: Uuid, patch: ProductPatch)
        -> StorageResult<Option<Product>>;
    /// Returns whether a record existed to remove.
    async fn delete_product(&self, id: Uuid) -> StorageResult<bool>;

    async fn cart_items(&self, session_id: &str) -> StorageResult<Vec<CartItem>>;
    /// Single-item lookup with the same ownership rule as the other
    /// cart operations: a foreign session's item reads as absent.
    async fn get_cart_item(
        &self,
        session_id: &str,
        item_id: Uuid,
    ) -> StorageResult<Option<CartItem>>;
    /// Atomic capped merge on the (session, product) key: creates the
    /// line or adds `quantity` to it in one step. Returns `None` when
    /// the merged quantity would exceed `max_quantity`, leaving prior
    /// state untouched.
    async fn upsert_cart_item(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: i32,
        max_quantity: i32,
    ) -> StorageResult<Option<CartItem>>;
    /// Overwrites the stored quantity. Ownership is part of the query:
    /// an item belonging to another session is reported as absent.
    async fn set_cart_item_quantity(
        &self,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> StorageResult<Option<CartItem>>;
    /// Same ownership rule as [`Storage::set_cart_item_quantity`].
    async fn remove_cart_item(&self, session_id: &str, item_id: Uuid) -> StorageResult<bool>;
    async fn clear_cart(&self, session_id: &str) -> StorageResult<()>;

    /// Persists the order, then removes exactly the cart lines named
    /// by `line_ids` from that session's cart; a line added after the
    /// snapshot was taken survives. The order write always precedes
    /// the removal, so a crash in between leaves the cart intact and
    /// the placed order readable.
    async fn create_order(&self, order: Order, line_ids: &[Uuid]) -> StorageResult<Order>;
    async fn orders_for_session(&self, session_id: &str) -> StorageResult<Vec<Order>>;
}

/// Builds the backend selected by configuration, running whatever
/// startup work it needs (migrations, index creation, demo seed).
pub async fn connect(config: &StorageConfig) -> anyhow::Result<Arc<dyn Storage>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryStorage::with_demo_catalog())),
        StorageConfig::Postgres { url } => Ok(Arc::new(PgStorage::connect(url).await?)),
        StorageConfig::Mongo { url, database } => {
            Ok(Arc::new(MongoStorage::connect(url, database).await?))
        }
    }
}
