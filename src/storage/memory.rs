//! In-memory backend: plain maps behind a `tokio::sync::RwLock`.
//!
//! The default backend for local development. Every cart mutation
//! runs under a single write-lock acquisition, so the merge-on-add
//! read-modify-write cannot interleave with another add for the same
//! (session, product) pair.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Storage, StorageResult};
use crate::models::{CartItem, Order, Product, ProductPatch};

#[derive(Default)]
struct Inner {
    products: HashMap<Uuid, Product>,
    cart: HashMap<Uuid, CartItem>,
    orders: HashMap<Uuid, Order>,
}

pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// An instance pre-populated with a small catalog, used when the
    /// memory backend is selected so the storefront is browsable
    /// without an admin step.
    pub fn with_demo_catalog() -> Self {
        let mut products = HashMap::new();
        for product in demo_catalog() {
            products.insert(product.id, product);
        }
        Self {
            inner: RwLock::new(Inner {
                products,
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_products(&self) -> StorageResult<Vec<Product>> {
        let guard = self.inner.read().await;
        let mut products: Vec<Product> = guard.products.values().cloned().collect();
        products.sort_by_key(|p| (p.created_at, p.id));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> StorageResult<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn insert_product(&self, product: Product) -> StorageResult<Product> {
        self.inner
            .write()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        patch: ProductPatch,
    ) -> StorageResult<Option<Product>> {
        let mut guard = self.inner.write().await;
        Ok(guard.products.get_mut(&id).map(|product| {
            product.apply(patch);
            product.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> StorageResult<bool> {
        Ok(self.inner.write().await.products.remove(&id).is_some())
    }

    async fn cart_items(&self, session_id: &str) -> StorageResult<Vec<CartItem>> {
        let guard = self.inner.read().await;
        let mut items: Vec<CartItem> = guard
            .cart
            .values()
            .filter(|item| item.session_id == session_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        Ok(items)
    }

    async fn get_cart_item(
        &self,
        session_id: &str,
        item_id: Uuid,
    ) -> StorageResult<Option<CartItem>> {
        let guard = self.inner.read().await;
        Ok(guard
            .cart
            .get(&item_id)
            .filter(|item| item.session_id == session_id)
            .cloned())
    }

    async fn upsert_cart_item(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: i32,
        max_quantity: i32,
    ) -> StorageResult<Option<CartItem>> {
        let mut guard = self.inner.write().await;
        if let Some(existing) = guard
            .cart
            .values_mut()
            .find(|item| item.session_id == session_id && item.product_id == product_id)
        {
            let merged = existing.quantity + quantity;
            if merged > max_quantity {
                return Ok(None);
            }
            existing.quantity = merged;
            return Ok(Some(existing.clone()));
        }

        if quantity > max_quantity {
            return Ok(None);
        }
        let item = CartItem {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            product_id,
            quantity,
            created_at: Utc::now(),
        };
        guard.cart.insert(item.id, item.clone());
        Ok(Some(item))
    }

    async fn set_cart_item_quantity(
        &self,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> StorageResult<Option<CartItem>> {
        let mut guard = self.inner.write().await;
        Ok(guard
            .cart
            .get_mut(&item_id)
            .filter(|item| item.session_id == session_id)
            .map(|item| {
                item.quantity = quantity;
                item.clone()
            }))
    }

    async fn remove_cart_item(&self, session_id: &str, item_id: Uuid) -> StorageResult<bool> {
        let mut guard = self.inner.write().await;
        let owned = guard
            .cart
            .get(&item_id)
            .is_some_and(|item| item.session_id == session_id);
        if owned {
            guard.cart.remove(&item_id);
        }
        Ok(owned)
    }

    async fn clear_cart(&self, session_id: &str) -> StorageResult<()> {
        self.inner
            .write()
            .await
            .cart
            .retain(|_, item| item.session_id != session_id);
        Ok(())
    }

    async fn create_order(&self, order: Order, line_ids: &[Uuid]) -> StorageResult<Order> {
        // One guard for both steps: the order is visible before the
        // cart rows disappear. Only the snapshotted lines go; an add
        // racing the checkout keeps its row.
        let mut guard = self.inner.write().await;
        guard.orders.insert(order.id, order.clone());
        let session_id = order.session_id.clone();
        guard
            .cart
            .retain(|id, item| item.session_id != session_id || !line_ids.contains(id));
        Ok(order)
    }

    async fn orders_for_session(&self, session_id: &str) -> StorageResult<Vec<Order>> {
        let guard = self.inner.read().await;
        let mut orders: Vec<Order> = guard
            .orders
            .values()
            .filter(|order| order.session_id == session_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }
}

fn demo_catalog() -> Vec<Product> {
    let now = Utc::now();
    vec![
        Product {
            id: Uuid::new_v4(),
            name: "Premium Organic Almonds".into(),
            description: "Raw, unsalted almonds sourced from premium farms. Rich in protein, \
                          fiber, and healthy fats."
                .into(),
            price: Decimal::new(1899, 2),
            original_price: Some(Decimal::new(2299, 2)),
            category: "Nuts".into(),
            image: "https://via.placeholder.com/400?text=Almonds".into(),
            images: vec!["https://via.placeholder.com/400?text=Almonds".into()],
            rating: Decimal::new(48, 1),
            review_count: 156,
            in_stock: true,
            featured: true,
            tags: vec!["Organic".into(), "Raw".into(), "Natural".into()],
            created_at: now,
        },
        Product {
            id: Uuid::new_v4(),
            name: "Golden Flax Seeds".into(),
            description: "Golden flax seeds packed with omega-3 fatty acids and fiber. Non-GMO \
                          and certified organic."
                .into(),
            price: Decimal::new(1299, 2),
            original_price: None,
            category: "Grains".into(),
            image: "https://via.placeholder.com/400?text=FlaxSeeds".into(),
            images: vec!["https://via.placeholder.com/400?text=FlaxSeeds".into()],
            rating: Decimal::new(47, 1),
            review_count: 89,
            in_stock: true,
            featured: true,
            tags: vec!["Organic".into(), "Vegan".into()],
            created_at: now,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShippingDetails;

    fn order(session_id: &str) -> Order {
        Order {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            items: vec![],
            subtotal: Decimal::new(2000, 2),
            shipping: Decimal::new(1000, 2),
            tax: Decimal::new(200, 2),
            total: Decimal::new(3200, 2),
            contact: ShippingDetails {
                shipping_name: "Ada".into(),
                shipping_email: "ada@example.com".into(),
                shipping_address: "1 Main St".into(),
                shipping_city: "Lagos".into(),
                shipping_zip: "10001".into(),
                shipping_country: "NG".into(),
            },
            created_at: Utc::now(),
        }
    }

    fn product() -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Flax".into(),
            description: "Seeds".into(),
            price: Decimal::new(1299, 2),
            original_price: None,
            category: "Grains".into(),
            image: "a.png".into(),
            images: vec!["a.png".into()],
            rating: Decimal::new(45, 1),
            review_count: 0,
            in_stock: true,
            featured: false,
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_merges_and_caps() {
        let storage = MemoryStorage::new();
        let product_id = Uuid::new_v4();

        let item = storage
            .upsert_cart_item("s1", product_id, 95, 99)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 95);

        // Over the cap: rejected, prior state untouched.
        assert!(storage
            .upsert_cart_item("s1", product_id, 10, 99)
            .await
            .unwrap()
            .is_none());
        let items = storage.cart_items("s1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 95);

        let item = storage
            .upsert_cart_item("s1", product_id, 4, 99)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 99);
    }

    #[tokio::test]
    async fn foreign_session_items_look_absent() {
        let storage = MemoryStorage::new();
        let item = storage
            .upsert_cart_item("s1", Uuid::new_v4(), 2, 99)
            .await
            .unwrap()
            .unwrap();

        assert!(storage
            .set_cart_item_quantity("s2", item.id, 5)
            .await
            .unwrap()
            .is_none());
        assert!(!storage.remove_cart_item("s2", item.id).await.unwrap());
        assert_eq!(storage.cart_items("s1").await.unwrap()[0].quantity, 2);
    }

    #[tokio::test]
    async fn demo_catalog_is_seeded() {
        let storage = MemoryStorage::with_demo_catalog();
        assert_eq!(storage.list_products().await.unwrap().len(), 2);
        assert!(MemoryStorage::new().list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_order_removes_only_the_lines_it_snapshotted() {
        let storage = MemoryStorage::new();
        let snapshotted = storage
            .upsert_cart_item("s1", Uuid::new_v4(), 2, 99)
            .await
            .unwrap()
            .unwrap();
        // A line added after the checkout read took its snapshot.
        let late_add = storage
            .upsert_cart_item("s1", Uuid::new_v4(), 1, 99)
            .await
            .unwrap()
            .unwrap();

        storage
            .create_order(order("s1"), &[snapshotted.id])
            .await
            .unwrap();

        let remaining = storage.cart_items("s1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, late_add.id);
        assert_eq!(storage.orders_for_session("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn patch_never_changes_id() {
        let storage = MemoryStorage::new();
        let original = storage.insert_product(product()).await.unwrap();
        let updated = storage
            .update_product(
                original.id,
                ProductPatch {
                    name: Some("Golden Flax".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.name, "Golden Flax");
    }
}
