//! The shared load contract used by every extraction task.
//!
//! A load validates the rows against the table definition, then hands the
//! whole set to the warehouse as a single replace (ensure, truncate, insert,
//! commit). After success the table holds exactly the rows passed in.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use ecom_extract_core::{RowDecodeError, SqlValue, ToRow};

use crate::warehouse::{TableBatch, TableDef, Warehouse, WarehouseError};

/// Errors that can occur while loading or reading back a table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A row does not match the table definition; nothing was written.
    #[error("{table} row {row}: {reason}")]
    Shape {
        table: &'static str,
        row: usize,
        reason: String,
    },

    /// The warehouse reported a different row count than was sent.
    #[error("{table}: inserted {inserted} of {expected} rows")]
    Incomplete {
        table: &'static str,
        expected: u64,
        inserted: u64,
    },

    /// A stored row could not be decoded.
    #[error("{table}: {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: RowDecodeError,
    },

    /// Warehouse operation failed.
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

/// Convert typed rows into a batch for `table`.
#[must_use]
pub fn batch_of<R: ToRow>(table: &'static TableDef, rows: Vec<R>) -> TableBatch {
    TableBatch::new(table, rows.into_iter().map(ToRow::into_values).collect())
}

/// Check every row of `batch` against its table definition.
///
/// # Errors
///
/// Returns `LoadError::Shape` for the first row with the wrong number of
/// values or a value that does not fit its column.
pub fn validate(batch: &TableBatch) -> Result<(), LoadError> {
    let table = batch.table;
    for (idx, row) in batch.rows.iter().enumerate() {
        if row.len() != table.width() {
            return Err(LoadError::Shape {
                table: table.name,
                row: idx,
                reason: format!("expected {} values, got {}", table.width(), row.len()),
            });
        }
        if let Some((column, value)) = table
            .columns
            .iter()
            .zip(row)
            .find(|(column, value)| !value.fits(column.ty))
        {
            return Err(LoadError::Shape {
                table: table.name,
                row: idx,
                reason: format!(
                    "column {} expects {}, got {value:?}",
                    column.name,
                    column.ty.sql()
                ),
            });
        }
    }
    Ok(())
}

/// Loads full-refresh snapshots into the warehouse.
#[derive(Clone)]
pub struct Loader {
    warehouse: Arc<dyn Warehouse>,
}

impl Loader {
    #[must_use]
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Replace one table with `rows`.
    ///
    /// # Errors
    ///
    /// See [`Loader::load_all`].
    pub async fn load<R: ToRow + Send>(
        &self,
        table: &'static TableDef,
        rows: Vec<R>,
    ) -> Result<u64, LoadError> {
        let counts = self.load_all(vec![batch_of(table, rows)]).await?;
        Ok(counts.first().copied().unwrap_or_default())
    }

    /// Replace a parent table and its children as one unit.
    ///
    /// Returns the inserted row count per batch, in input order. An empty
    /// batch still empties its table.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Shape` before touching the warehouse if any row is
    /// malformed, `LoadError::Warehouse` if the replace fails, and
    /// `LoadError::Incomplete` if the warehouse inserted fewer rows than sent.
    pub async fn load_all(&self, batches: Vec<TableBatch>) -> Result<Vec<u64>, LoadError> {
        for batch in &batches {
            validate(batch)?;
        }

        let expected: Vec<(&'static str, u64)> = batches
            .iter()
            .map(|b| (b.table.name, b.len() as u64))
            .collect();

        let counts = self.warehouse.replace(batches).await?;

        for ((table, expected), inserted) in expected.iter().zip(&counts) {
            if expected != inserted {
                return Err(LoadError::Incomplete {
                    table: *table,
                    expected: *expected,
                    inserted: *inserted,
                });
            }
            debug!(table, rows = inserted, "Loaded");
        }

        info!(
            tables = ?expected.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            rows = counts.iter().sum::<u64>(),
            "Snapshot replaced"
        );
        Ok(counts)
    }

    /// Read `table` back as typed rows, ordered by primary key.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Warehouse` if the read fails and
    /// `LoadError::Decode` if a stored row does not decode.
    pub async fn read<R>(&self, table: &'static TableDef) -> Result<Vec<R>, LoadError>
    where
        R: for<'a> TryFrom<&'a [SqlValue], Error = RowDecodeError>,
    {
        let rows = self.warehouse.fetch_all(table).await?;
        rows.iter()
            .map(|row| {
                R::try_from(row.as_slice()).map_err(|source| LoadError::Decode {
                    table: table.name,
                    source,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").finish_non_exhaustive()
    }
}
