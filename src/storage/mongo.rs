//! Document-store backend on MongoDB.
//!
//! Collections hold the serde models directly, so bson field names
//! follow the wire casing (camelCase). A unique (sessionId,
//! productId) index backs the merge-on-add guarantee: the capped
//! merge is a guarded `find_one_and_update`, and a lost race on the
//! fresh-insert path falls back to the merge once.
//!
//! There are no cross-collection transactions here; order placement
//! writes the order first and clears the cart second, so a crash in
//! between is safe to retry.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use serde::Serialize;
use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::models::{CartItem, Order, Product, ProductPatch};

pub struct MongoStorage {
    products: Collection<Product>,
    cart: Collection<CartItem>,
    orders: Collection<Order>,
}

impl MongoStorage {
    pub async fn connect(url: &str, database: &str) -> StorageResult<Self> {
        let client = Client::with_uri_str(url).await?;
        let db = client.database(database);
        let storage = Self {
            products: db.collection("products"),
            cart: db.collection("cart_items"),
            orders: db.collection("orders"),
        };
        storage.ensure_indexes().await?;
        Ok(storage)
    }

    async fn ensure_indexes(&self) -> StorageResult<()> {
        let unique_line = IndexModel::builder()
            .keys(doc! { "sessionId": 1, "productId": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.cart.create_index(unique_line, None).await?;
        self.orders
            .create_index(
                IndexModel::builder().keys(doc! { "sessionId": 1 }).build(),
                None,
            )
            .await?;
        Ok(())
    }
}

fn to_bson<T: Serialize>(value: &T) -> StorageResult<Bson> {
    mongodb::bson::to_bson(value).map_err(|e| StorageError::Mongo(e.into()))
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

fn by_creation() -> FindOptions {
    FindOptions::builder().sort(doc! { "createdAt": 1 }).build()
}

#[async_trait]
impl Storage for MongoStorage {
    async fn list_products(&self) -> StorageResult<Vec<Product>> {
        let cursor = self.products.find(doc! {}, by_creation()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get_product(&self, id: Uuid) -> StorageResult<Option<Product>> {
        Ok(self
            .products
            .find_one(doc! { "id": id.to_string() }, None)
            .await?)
    }

    async fn insert_product(&self, product: Product) -> StorageResult<Product> {
        self.products.insert_one(&product, None).await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        patch: ProductPatch,
    ) -> StorageResult<Option<Product>> {
        let mut set = Document::new();
        if let Some(v) = patch.name {
            set.insert("name", v);
        }
        if let Some(v) = patch.description {
            set.insert("description", v);
        }
        if let Some(v) = patch.price {
            set.insert("price", to_bson(&v)?);
        }
        if let Some(v) = patch.original_price {
            set.insert("originalPrice", to_bson(&v)?);
        }
        if let Some(v) = patch.category {
            set.insert("category", v);
        }
        if let Some(v) = patch.image {
            set.insert("image", v);
        }
        if let Some(v) = patch.images {
            set.insert("images", to_bson(&v)?);
        }
        if let Some(v) = patch.rating {
            set.insert("rating", to_bson(&v)?);
        }
        if let Some(v) = patch.review_count {
            set.insert("reviewCount", v);
        }
        if let Some(v) = patch.in_stock {
            set.insert("inStock", v);
        }
        if let Some(v) = patch.featured {
            set.insert("featured", v);
        }
        if let Some(v) = patch.tags {
            set.insert("tags", to_bson(&v)?);
        }
        if set.is_empty() {
            return self.get_product(id).await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .products
            .find_one_and_update(doc! { "id": id.to_string() }, doc! { "$set": set }, options)
            .await?)
    }

    async fn delete_product(&self, id: Uuid) -> StorageResult<bool> {
        let result = self
            .products
            .delete_one(doc! { "id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn cart_items(&self, session_id: &str) -> StorageResult<Vec<CartItem>> {
        let cursor = self
            .cart
            .find(doc! { "sessionId": session_id }, by_creation())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get_cart_item(
        &self,
        session_id: &str,
        item_id: Uuid,
    ) -> StorageResult<Option<CartItem>> {
        Ok(self
            .cart
            .find_one(
                doc! { "id": item_id.to_string(), "sessionId": session_id },
                None,
            )
            .await?)
    }

    async fn upsert_cart_item(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: i32,
        max_quantity: i32,
    ) -> StorageResult<Option<CartItem>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        for _ in 0..2 {
            // Merge path: only matches while the merged quantity stays
            // within the cap, making cap enforcement part of the same
            // atomic update.
            let guard = doc! {
                "sessionId": session_id,
                "productId": product_id.to_string(),
                "quantity": { "$lte": max_quantity - quantity },
            };
            if let Some(item) = self
                .cart
                .find_one_and_update(
                    guard,
                    doc! { "$inc": { "quantity": quantity } },
                    options.clone(),
                )
                .await?
            {
                return Ok(Some(item));
            }

            // No match: either the line exists over the cap, or it does
            // not exist yet.
            let key = doc! { "sessionId": session_id, "productId": product_id.to_string() };
            if self.cart.find_one(key, None).await?.is_some() {
                return Ok(None);
            }

            let item = CartItem {
                id: Uuid::new_v4(),
                session_id: session_id.to_string(),
                product_id,
                quantity,
                created_at: Utc::now(),
            };
            match self.cart.insert_one(&item, None).await {
                Ok(_) => return Ok(Some(item)),
                // Concurrent first add won the unique index; merge
                // into the winner instead.
                Err(e) if is_duplicate_key(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::Conflict)
    }

    async fn set_cart_item_quantity(
        &self,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> StorageResult<Option<CartItem>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .cart
            .find_one_and_update(
                doc! { "id": item_id.to_string(), "sessionId": session_id },
                doc! { "$set": { "quantity": quantity } },
                options,
            )
            .await?)
    }

    async fn remove_cart_item(&self, session_id: &str, item_id: Uuid) -> StorageResult<bool> {
        let result = self
            .cart
            .delete_one(
                doc! { "id": item_id.to_string(), "sessionId": session_id },
                None,
            )
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn clear_cart(&self, session_id: &str) -> StorageResult<()> {
        self.cart
            .delete_many(doc! { "sessionId": session_id }, None)
            .await?;
        Ok(())
    }

    async fn create_order(&self, order: Order, line_ids: &[Uuid]) -> StorageResult<Order> {
        // Create before clear: an interruption here leaves the cart
        // intact while the order is already durable. Only the
        // snapshotted lines are removed.
        self.orders.insert_one(&order, None).await?;
        let ids: Vec<String> = line_ids.iter().map(Uuid::to_string).collect();
        self.cart
            .delete_many(
                doc! { "sessionId": &order.session_id, "id": { "$in": ids } },
                None,
            )
            .await?;
        Ok(order)
    }

    async fn orders_for_session(&self, session_id: &str) -> StorageResult<Vec<Order>> {
        let cursor = self
            .orders
            .find(doc! { "sessionId": session_id }, by_creation())
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
