//! Organica storefront core.
//!
//! A small e-commerce service: product catalog, session-scoped
//! shopping carts, and checkout with immutable order snapshots.
//! Persistence is pluggable (in-memory, Postgres, MongoDB) behind the
//! [`storage::Storage`] trait, selected once at startup and injected
//! into the services.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod session;
pub mod storage;

pub use error::{Error, Result};
