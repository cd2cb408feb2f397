//! Relational backend on Postgres via sqlx.
//!
//! Schema lives in `migrations/` and is applied on connect. The
//! capped merge-on-add is a single `INSERT ... ON CONFLICT ... DO
//! UPDATE ... WHERE` statement, and order placement runs in one
//! transaction, so both invariants hold without application-side
//! locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::models::{CartItem, Order, OrderItem, Product, ProductPatch, ShippingDetails};

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::Sql(e.into()))?;
        Ok(Self { pool })
    }
}

/// Orders keep their item snapshot in a JSONB column; everything else
/// maps straight onto `Order` fields.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    session_id: String,
    items: serde_json::Value,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    shipping_name: String,
    shipping_email: String,
    shipping_address: String,
    shipping_city: String,
    shipping_zip: String,
    shipping_country: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StorageError;

    fn try_from(row: OrderRow) -> StorageResult<Order> {
        let items: Vec<OrderItem> = serde_json::from_value(row.items)?;
        Ok(Order {
            id: row.id,
            session_id: row.session_id,
            items,
            subtotal: row.subtotal,
            shipping: row.shipping,
            tax: row.tax,
            total: row.total,
            contact: ShippingDetails {
                shipping_name: row.shipping_name,
                shipping_email: row.shipping_email,
                shipping_address: row.shipping_address,
                shipping_city: row.shipping_city,
                shipping_zip: row.shipping_zip,
                shipping_country: row.shipping_country,
            },
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn list_products(&self) -> StorageResult<Vec<Product>> {
        Ok(
            sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_product(&self, id: Uuid) -> StorageResult<Option<Product>> {
        Ok(
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_product(&self, p: Product) -> StorageResult<Product> {
        Ok(sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, name, description, price, original_price, category, \
             image, images, rating, review_count, in_stock, featured, tags, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.original_price)
        .bind(&p.category)
        .bind(&p.image)
        .bind(&p.images)
        .bind(p.rating)
        .bind(p.review_count)
        .bind(p.in_stock)
        .bind(p.featured)
        .bind(&p.tags)
        .bind(p.created_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_product(
        &self,
        id: Uuid,
        patch: ProductPatch,
    ) -> StorageResult<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>(
            "UPDATE products SET \
             name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             price = COALESCE($4, price), \
             original_price = COALESCE($5, original_price), \
             category = COALESCE($6, category), \
             image = COALESCE($7, image), \
             images = COALESCE($8, images), \
             rating = COALESCE($9, rating), \
             review_count = COALESCE($10, review_count), \
             in_stock = COALESCE($11, in_stock), \
             featured = COALESCE($12, featured), \
             tags = COALESCE($13, tags) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.price)
        .bind(patch.original_price)
        .bind(patch.category)
        .bind(patch.image)
        .bind(patch.images)
        .bind(patch.rating)
        .bind(patch.review_count)
        .bind(patch.in_stock)
        .bind(patch.featured)
        .bind(patch.tags)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_product(&self, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cart_items(&self, session_id: &str) -> StorageResult<Vec<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE session_id = $1 ORDER BY created_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_cart_item(
        &self,
        session_id: &str,
        item_id: Uuid,
    ) -> StorageResult<Option<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE id = $1 AND session_id = $2",
        )
        .bind(item_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_cart_item(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: i32,
        max_quantity: i32,
    ) -> StorageResult<Option<CartItem>> {
        // When the conditional DO UPDATE does not fire the statement
        // returns no row, which signals the cap rejection.
        Ok(sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (id, session_id, product_id, quantity, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (session_id, product_id) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             WHERE cart_items.quantity + EXCLUDED.quantity <= $5 \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(product_id)
        .bind(quantity)
        .bind(max_quantity)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_cart_item_quantity(
        &self,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> StorageResult<Option<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = $3 WHERE id = $1 AND session_id = $2 RETURNING *",
        )
        .bind(item_id)
        .bind(session_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn remove_cart_item(&self, session_id: &str, item_id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND session_id = $2")
            .bind(item_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, session_id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_order(&self, order: Order, line_ids: &[Uuid]) -> StorageResult<Order> {
        let items = serde_json::to_value(&order.items)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orders (id, session_id, items, subtotal, shipping, tax, total, \
             shipping_name, shipping_email, shipping_address, shipping_city, shipping_zip, \
             shipping_country, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(order.id)
        .bind(&order.session_id)
        .bind(items)
        .bind(order.subtotal)
        .bind(order.shipping)
        .bind(order.tax)
        .bind(order.total)
        .bind(&order.contact.shipping_name)
        .bind(&order.contact.shipping_email)
        .bind(&order.contact.shipping_address)
        .bind(&order.contact.shipping_city)
        .bind(&order.contact.shipping_zip)
        .bind(&order.contact.shipping_country)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND id = ANY($2)")
            .bind(&order.session_id)
            .bind(line_ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn orders_for_session(&self, session_id: &str) -> StorageResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE session_id = $1 ORDER BY created_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }
}
