//! Pricing and order assembly.
//!
//! Totals are computed in decimal arithmetic: the subtotal is rounded
//! to two places at the final sum (not per line), shipping is a flat
//! 10 waived above a subtotal of 100, tax is a flat 10%. Placing an
//! order snapshots the priced items so later catalog changes never
//! alter it, and the cart is cleared only after the order write
//! succeeds.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::{Order, OrderItem, ShippingDetails};
use crate::storage::Storage;

#[derive(Clone)]
pub struct Checkout {
    storage: Arc<dyn Storage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Prices a set of (unit price, quantity) lines.
pub fn price_lines(lines: &[(Decimal, i32)]) -> Totals {
    let raw: Decimal = lines
        .iter()
        .map(|(price, quantity)| price * Decimal::from(*quantity))
        .sum();
    let subtotal = raw.round_dp(2);
    // Shipping carries two decimal places so every money field
    // serializes with the same scale.
    let shipping = if subtotal > Decimal::ONE_HUNDRED {
        Decimal::new(0, 2)
    } else {
        Decimal::new(1000, 2)
    };
    let tax = (subtotal * Decimal::new(1, 1)).round_dp(2);
    let total = (subtotal + shipping + tax).round_dp(2);
    Totals {
        subtotal,
        shipping,
        tax,
        total,
    }
}

impl Checkout {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Assembles an immutable order from the session's current cart.
    ///
    /// A cart line whose product has vanished from the catalog is
    /// fatal for the attempt; nothing is dropped silently and the
    /// cart is left untouched.
    pub async fn place_order(&self, session_id: &str, contact: ShippingDetails) -> Result<Order> {
        contact.validate()?;

        let cart_items = self.storage.cart_items(session_id).await?;
        if cart_items.is_empty() {
            return Err(Error::EmptyCart);
        }

        let mut items = Vec::with_capacity(cart_items.len());
        for cart_item in &cart_items {
            let product = self
                .storage
                .get_product(cart_item.product_id)
                .await?
                .ok_or(Error::ProductUnavailable(cart_item.product_id))?;
            items.push(OrderItem {
                product_id: product.id,
                name: product.name,
                unit_price: product.price,
                quantity: cart_item.quantity,
            });
        }

        let totals = price_lines(
            &items
                .iter()
                .map(|item| (item.unit_price, item.quantity))
                .collect::<Vec<_>>(),
        );

        let order = Order {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            items,
            subtotal: totals.subtotal,
            shipping: totals.shipping,
            tax: totals.tax,
            total: totals.total,
            contact,
            created_at: Utc::now(),
        };

        // The backend persists first and clears second, removing only
        // the lines this snapshot covers.
        let line_ids: Vec<Uuid> = cart_items.iter().map(|item| item.id).collect();
        let order = self.storage.create_order(order, &line_ids).await?;
        tracing::info!(order_id = %order.id, total = %order.total, "order placed");
        Ok(order)
    }

    pub async fn orders(&self, session_id: &str) -> Result<Vec<Order>> {
        Ok(self.storage.orders_for_session(session_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartEngine;
    use crate::catalog::Catalog;
    use crate::models::{ProductDraft, ProductPatch};
    use crate::storage::MemoryStorage;

    fn contact() -> ShippingDetails {
        ShippingDetails {
            shipping_name: "Ada".into(),
            shipping_email: "ada@example.com".into(),
            shipping_address: "1 Main St".into(),
            shipping_city: "Lagos".into(),
            shipping_zip: "10001".into(),
            shipping_country: "NG".into(),
        }
    }

    fn draft(name: &str, price: &str) -> ProductDraft {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "description": "desc",
            "price": price,
            "category": "Nuts",
            "image": "a.png",
        }))
        .unwrap()
    }

    struct Shop {
        catalog: Catalog,
        cart: CartEngine,
        checkout: Checkout,
    }

    fn shop() -> Shop {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        Shop {
            catalog: Catalog::new(storage.clone()),
            cart: CartEngine::new(storage.clone()),
            checkout: Checkout::new(storage),
        }
    }

    #[test]
    fn shipping_is_waived_above_one_hundred() {
        // 2 x 60.00 -> subtotal 120.00, free shipping, tax 12.00.
        let totals = price_lines(&[(Decimal::new(6000, 2), 2)]);
        assert_eq!(totals.subtotal, Decimal::new(12000, 2));
        assert_eq!(totals.shipping, Decimal::ZERO);
        // Waived shipping still carries cents on the wire.
        assert_eq!(totals.shipping.to_string(), "0.00");
        assert_eq!(totals.tax, Decimal::new(1200, 2));
        assert_eq!(totals.total, Decimal::new(13200, 2));
    }

    #[test]
    fn flat_shipping_applies_at_or_below_threshold() {
        // 1 x 20.00 -> subtotal 20.00, shipping 10, tax 2.00.
        let totals = price_lines(&[(Decimal::new(2000, 2), 1)]);
        assert_eq!(totals.subtotal, Decimal::new(2000, 2));
        assert_eq!(totals.shipping, Decimal::TEN);
        assert_eq!(totals.tax, Decimal::new(200, 2));
        assert_eq!(totals.total, Decimal::new(3200, 2));

        // Exactly 100 still pays shipping; the threshold is strict.
        let totals = price_lines(&[(Decimal::new(10000, 2), 1)]);
        assert_eq!(totals.shipping, Decimal::TEN);
    }

    #[test]
    fn subtotal_is_rounded_to_cents_at_the_final_sum() {
        let totals = price_lines(&[(Decimal::new(3333, 3), 3), (Decimal::new(1111, 3), 1)]);
        // 3.333 * 3 + 1.111 = 11.110 -> 11.11
        assert_eq!(totals.subtotal, Decimal::new(1111, 2));
    }

    #[tokio::test]
    async fn placing_an_order_snapshots_and_clears_only_this_cart() {
        let shop = shop();
        let product = shop.catalog.create(draft("Almonds", "60.00")).await.unwrap();
        shop.cart.add("s1", product.id, 2).await.unwrap();
        shop.cart.add("s2", product.id, 1).await.unwrap();

        let order = shop.checkout.place_order("s1", contact()).await.unwrap();
        assert_eq!(order.total, Decimal::new(13200, 2));
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);

        assert!(shop.cart.list("s1").await.unwrap().is_empty());
        assert_eq!(shop.cart.list("s2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_cart_is_refused_with_no_side_effects() {
        let shop = shop();
        assert!(matches!(
            shop.checkout.place_order("s1", contact()).await,
            Err(Error::EmptyCart)
        ));
        assert!(shop.checkout.orders("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_shipping_fields_are_rejected() {
        let shop = shop();
        let product = shop.catalog.create(draft("Almonds", "20.00")).await.unwrap();
        shop.cart.add("s1", product.id, 1).await.unwrap();

        let mut bad = contact();
        bad.shipping_email = "not-an-email".into();
        assert!(matches!(
            shop.checkout.place_order("s1", bad).await,
            Err(Error::Validation(_))
        ));
        // The cart survives the failed attempt.
        assert_eq!(shop.cart.list("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn vanished_product_fails_the_attempt_and_keeps_the_cart() {
        let shop = shop();
        let product = shop.catalog.create(draft("Almonds", "20.00")).await.unwrap();
        shop.cart.add("s1", product.id, 1).await.unwrap();
        shop.catalog.delete(product.id).await.unwrap();

        assert!(matches!(
            shop.checkout.place_order("s1", contact()).await,
            Err(Error::ProductUnavailable(id)) if id == product.id
        ));
        assert!(shop.checkout.orders("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_snapshot_is_immune_to_later_catalog_changes() {
        let shop = shop();
        let product = shop.catalog.create(draft("Almonds", "20.00")).await.unwrap();
        shop.cart.add("s1", product.id, 1).await.unwrap();
        let order = shop.checkout.place_order("s1", contact()).await.unwrap();

        shop.catalog
            .update(
                product.id,
                ProductPatch {
                    price: Some(Decimal::new(9900, 2)),
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        shop.catalog.delete(product.id).await.unwrap();

        let stored = shop.checkout.orders("s1").await.unwrap();
        assert_eq!(stored[0].id, order.id);
        assert_eq!(stored[0].items[0].name, "Almonds");
        assert_eq!(stored[0].items[0].unit_price, Decimal::new(2000, 2));
        assert_eq!(stored[0].total, Decimal::new(3200, 2));
    }
}
