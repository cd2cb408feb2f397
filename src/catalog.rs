//! Product catalog service: admin CRUD plus browsing reads.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::{Product, ProductDraft, ProductPatch};
use crate::storage::Storage;

#[derive(Clone)]
pub struct Catalog {
    storage: Arc<dyn Storage>,
}

impl Catalog {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.storage.list_products().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product> {
        self.storage
            .get_product(id)
            .await?
            .ok_or(Error::ProductNotFound)
    }

    /// Validates the draft, assigns a fresh id, and persists. A draft
    /// without an explicit gallery gets one made of its primary image.
    pub async fn create(&self, draft: ProductDraft) -> Result<Product> {
        draft.validate()?;
        let mut images = draft.images;
        if images.is_empty() {
            images.push(draft.image.clone());
        }
        let product = Product {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            price: draft.price,
            original_price: draft.original_price,
            category: draft.category,
            image: draft.image,
            images,
            rating: draft.rating,
            review_count: draft.review_count,
            in_stock: draft.in_stock,
            featured: draft.featured,
            tags: draft.tags,
            created_at: Utc::now(),
        };
        Ok(self.storage.insert_product(product).await?)
    }

    /// Merges the supplied fields into the stored record. Changing the
    /// primary image without an explicit gallery replaces the gallery
    /// with that image.
    pub async fn update(&self, id: Uuid, mut patch: ProductPatch) -> Result<Product> {
        patch.validate()?;
        if patch.images.is_none() {
            if let Some(image) = &patch.image {
                patch.images = Some(vec![image.clone()]);
            }
        }
        self.storage
            .update_product(id, patch)
            .await?
            .ok_or(Error::ProductNotFound)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.storage.delete_product(id).await? {
            Ok(())
        } else {
            Err(Error::ProductNotFound)
        }
    }
}
