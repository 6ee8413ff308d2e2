//! Warehouse access.
//!
//! Every write is a full replace: ensure the table exists, truncate it,
//! insert the new rows, commit. [`Warehouse::replace`] applies that to a
//! group of tables (a parent and its children) inside one transaction.

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;

use ecom_extract_core::SqlValue;

pub use memory::MemoryWarehouse;
pub use postgres::PgWarehouse;
pub use schema::{ColumnDef, TableDef};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., duplicate primary key).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The table has never been created.
    #[error("table not found: {0}")]
    MissingTable(&'static str),
}

/// The full replacement contents of one table.
#[derive(Debug, Clone)]
pub struct TableBatch {
    pub table: &'static TableDef,
    pub rows: Vec<Vec<SqlValue>>,
}

impl TableBatch {
    #[must_use]
    pub const fn new(table: &'static TableDef, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { table, rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Storage backend for the `raw_*` tables.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Replace the contents of every table in `batches` as one unit.
    ///
    /// Returns the number of rows inserted per batch, in input order.
    async fn replace(&self, batches: Vec<TableBatch>) -> Result<Vec<u64>, WarehouseError>;

    /// Read all rows of `table`, ordered by primary key.
    async fn fetch_all(&self, table: &'static TableDef)
    -> Result<Vec<Vec<SqlValue>>, WarehouseError>;

    /// Check that the warehouse is reachable.
    async fn ping(&self) -> Result<(), WarehouseError>;
}
