//! Upstream APIs the pipeline extracts from.
//!
//! - [`dummyjson`] - catalog: products, users, carts (required)
//! - [`stripe`] - billing: charges, refunds, invoices (optional)
//!
//! Tasks depend on the [`CatalogSource`] and [`BillingSource`] traits, not
//! the HTTP clients, so runs can be driven from fixtures.

pub mod dummyjson;
pub mod stripe;

use async_trait::async_trait;

pub use dummyjson::{
    CartProductRecord, CartRecord, DummyJsonClient, ProductRecord, SourceError, UserRecord,
};
pub use stripe::{BillingError, Charge, Invoice, InvoiceLine, Refund, StripeClient};

/// Source of catalog collections. Each call returns the full collection.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn products(&self) -> Result<Vec<ProductRecord>, SourceError>;
    async fn users(&self) -> Result<Vec<UserRecord>, SourceError>;
    async fn carts(&self) -> Result<Vec<CartRecord>, SourceError>;
}

/// Source of billing records. Each call returns at most `cap` records.
#[async_trait]
pub trait BillingSource: Send + Sync {
    async fn charges(&self, cap: usize) -> Result<Vec<Charge>, BillingError>;
    async fn refunds(&self, cap: usize) -> Result<Vec<Refund>, BillingError>;
    async fn invoices(&self, cap: usize) -> Result<Vec<Invoice>, BillingError>;
}
