//! Entity and wire types shared by the services and storage backends.
//!
//! Prices and totals are `rust_decimal::Decimal` with two-digit cent
//! precision. JSON field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category: String,
    pub image: String,
    pub images: Vec<String>,
    pub rating: Decimal,
    pub review_count: i32,
    pub in_stock: bool,
    pub featured: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields an administrator supplies when creating a product.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "an image is required"))]
    pub image: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_rating")]
    pub rating: Decimal,
    #[serde(default)]
    pub review_count: i32,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update for a product. Absent fields are left untouched;
/// the id can never change.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "description cannot be empty"))]
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    #[validate(length(min = 1, message = "category cannot be empty"))]
    pub category: Option<String>,
    #[validate(length(min = 1, message = "image cannot be empty"))]
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub rating: Option<Decimal>,
    pub review_count: Option<i32>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl Product {
    /// Merges a patch into this record in place.
    pub fn apply(&mut self, patch: ProductPatch) {
        let ProductPatch {
            name,
            description,
            price,
            original_price,
            category,
            image,
            images,
            rating,
            review_count,
            in_stock,
            featured,
            tags,
        } = patch;
        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = description {
            self.description = v;
        }
        if let Some(v) = price {
            self.price = v;
        }
        if let Some(v) = original_price {
            self.original_price = Some(v);
        }
        if let Some(v) = category {
            self.category = v;
        }
        if let Some(v) = image {
            self.image = v;
        }
        if let Some(v) = images {
            self.images = v;
        }
        if let Some(v) = rating {
            self.rating = v;
        }
        if let Some(v) = review_count {
            self.review_count = v;
        }
        if let Some(v) = in_stock {
            self.in_stock = v;
        }
        if let Some(v) = featured {
            self.featured = v;
        }
        if let Some(v) = tags {
            self.tags = v;
        }
    }
}

/// One cart row: a (session, product) pair with a merged quantity.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub session_id: String,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart item joined with its current catalog record. Cart reads
/// always reflect live prices; only order snapshots are frozen.
#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
}

/// An item captured at order-placement time. Later catalog edits or
/// deletions never change it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[validate(length(min = 1, message = "shipping name is required"))]
    pub shipping_name: String,
    #[validate(email(message = "a valid email is required"))]
    pub shipping_email: String,
    #[validate(length(min = 1, message = "shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "shipping city is required"))]
    pub shipping_city: String,
    #[validate(length(min = 1, message = "shipping zip is required"))]
    pub shipping_zip: String,
    #[validate(length(min = 1, message = "shipping country is required"))]
    pub shipping_country: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub session_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    #[serde(flatten)]
    pub contact: ShippingDetails,
    pub created_at: DateTime<Utc>,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut error = ValidationError::new("range");
        error.message = Some("price must not be negative".into());
        return Err(error);
    }
    Ok(())
}

fn default_rating() -> Decimal {
    Decimal::new(45, 1)
}

fn default_true() -> bool {
    true
}
