//! Cart engine: session-scoped line items with quantity and stock
//! guards.
//!
//! One line per (session, product); repeated adds merge through the
//! backend's atomic upsert so concurrent adds cannot lose an update.
//! A line may only be read, mutated, or deleted by the session that
//! created it; a foreign item id is reported as not found, never as
//! someone else's.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::CartLine;
use crate::storage::Storage;

pub const MIN_LINE_QUANTITY: i32 = 1;
pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Clone)]
pub struct CartEngine {
    storage: Arc<dyn Storage>,
}

impl CartEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn check_bounds(quantity: i32) -> Result<()> {
        if (MIN_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&quantity) {
            Ok(())
        } else {
            Err(Error::InvalidQuantity)
        }
    }

    /// Adds `quantity` of a product, merging with an existing line.
    /// Fails without touching stored state when the product is
    /// missing, out of stock, or the merged quantity would pass the
    /// cap.
    pub async fn add(&self, session_id: &str, product_id: Uuid, quantity: i32) -> Result<CartLine> {
        Self::check_bounds(quantity)?;
        let product = self
            .storage
            .get_product(product_id)
            .await?
            .ok_or(Error::ProductNotFound)?;
        if !product.in_stock {
            return Err(Error::OutOfStock);
        }
        let item = self
            .storage
            .upsert_cart_item(session_id, product_id, quantity, MAX_LINE_QUANTITY)
            .await?
            .ok_or(Error::QuantityLimitExceeded)?;
        Ok(CartLine { item, product })
    }

    /// Overwrites a line's quantity. Foreign or missing items are both
    /// `CartItemNotFound`. The product is resolved before the write,
    /// so a line whose product has vanished is refused with the stored
    /// quantity untouched.
    pub async fn set_quantity(
        &self,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartLine> {
        Self::check_bounds(quantity)?;
        let item = self
            .storage
            .get_cart_item(session_id, item_id)
            .await?
            .ok_or(Error::CartItemNotFound)?;
        let product = self
            .storage
            .get_product(item.product_id)
            .await?
            .ok_or(Error::ProductNotFound)?;
        let item = self
            .storage
            .set_cart_item_quantity(session_id, item_id, quantity)
            .await?
            .ok_or(Error::CartItemNotFound)?;
        Ok(CartLine { item, product })
    }

    pub async fn remove(&self, session_id: &str, item_id: Uuid) -> Result<()> {
        if self.storage.remove_cart_item(session_id, item_id).await? {
            Ok(())
        } else {
            Err(Error::CartItemNotFound)
        }
    }

    /// Every line for the session joined with live catalog data, so
    /// the cart view follows current prices until an order snapshot
    /// freezes them. Lines whose product has since been deleted are
    /// hidden.
    pub async fn list(&self, session_id: &str) -> Result<Vec<CartLine>> {
        let items = self.storage.cart_items(session_id).await?;
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            match self.storage.get_product(item.product_id).await? {
                Some(product) => lines.push(CartLine { item, product }),
                None => tracing::warn!(
                    item_id = %item.id,
                    product_id = %item.product_id,
                    "cart line references a deleted product; hiding it"
                ),
            }
        }
        Ok(lines)
    }

    /// Idempotent; used by order placement and available on its own.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        Ok(self.storage.clear_cart(session_id).await?)
    }
}
