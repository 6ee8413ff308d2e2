//! `PostgreSQL` warehouse.
//!
//! Queries are built at runtime from [`TableDef`]s, so they go through
//! `sqlx::query` and `QueryBuilder` rather than the checked macros.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, instrument};

use ecom_extract_core::{ColumnType, SqlValue};

use super::{TableBatch, TableDef, Warehouse, WarehouseError};

/// Postgres caps a single statement at this many bind parameters.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per `INSERT` for a table of the given width.
#[must_use]
pub const fn rows_per_statement(width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    let rows = MAX_BIND_PARAMS / width;
    if rows == 0 { 1 } else { rows }
}

/// Warehouse backed by a `PgPool`.
///
/// Each call acquires its own pooled connection and returns it on every
/// exit path.
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create every owned table that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `WarehouseError::Database` if a statement fails.
    pub async fn ensure_all(&self) -> Result<(), WarehouseError> {
        for table in super::schema::ALL_TABLES {
            sqlx::query(&table.create_sql()).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    #[instrument(skip(self, batches), fields(tables = batches.len()))]
    async fn replace(&self, batches: Vec<TableBatch>) -> Result<Vec<u64>, WarehouseError> {
        let mut tx = self.pool.begin().await?;

        for batch in &batches {
            sqlx::query(&batch.table.create_sql())
                .execute(&mut *tx)
                .await?;
        }
        for batch in &batches {
            sqlx::query(&batch.table.truncate_sql())
                .execute(&mut *tx)
                .await?;
        }

        let mut counts = Vec::with_capacity(batches.len());
        for batch in batches {
            let table = batch.table;
            let mut inserted = 0_u64;

            for chunk in batch.rows.chunks(rows_per_statement(table.width())) {
                let typed = chunk
                    .iter()
                    .map(|row| bind_row(table, row))
                    .collect::<Result<Vec<_>, _>>()?;

                let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
                    "INSERT INTO {} ({}) ",
                    table.name,
                    table.column_list()
                ));
                builder.push_values(typed, |mut values, row| {
                    for value in row {
                        push_bind(&mut values, value);
                    }
                });

                inserted += builder.build().execute(&mut *tx).await?.rows_affected();
            }

            debug!(table = table.name, rows = inserted, "Table replaced");
            counts.push(inserted);
        }

        tx.commit().await?;
        Ok(counts)
    }

    #[instrument(skip(self), fields(table = table.name))]
    async fn fetch_all(
        &self,
        table: &'static TableDef,
    ) -> Result<Vec<Vec<SqlValue>>, WarehouseError> {
        let rows = sqlx::query(&table.select_sql())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| decode_row(table, row)).collect()
    }

    async fn ping(&self) -> Result<(), WarehouseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Binding
// =============================================================================

/// A value paired with the Rust type it binds as. `NULL`s still carry the
/// column type so Postgres can infer the parameter type.
#[derive(Debug)]
enum Bind {
    Int(Option<i64>),
    Decimal(Option<Decimal>),
    Text(Option<String>),
    Bool(Option<bool>),
    Date(Option<NaiveDate>),
    Timestamp(Option<NaiveDateTime>),
    Json(Option<Json<serde_json::Value>>),
}

fn bind_row(table: &TableDef, row: &[SqlValue]) -> Result<Vec<Bind>, WarehouseError> {
    if row.len() != table.width() {
        return Err(WarehouseError::DataCorruption(format!(
            "{}: expected {} values, got {}",
            table.name,
            table.width(),
            row.len()
        )));
    }

    table
        .columns
        .iter()
        .zip(row)
        .map(|(column, value)| {
            typed(column.ty, value).ok_or_else(|| {
                WarehouseError::DataCorruption(format!(
                    "{}.{}: value {value:?} does not fit {}",
                    table.name,
                    column.name,
                    column.ty.sql()
                ))
            })
        })
        .collect()
}

fn typed(ty: ColumnType, value: &SqlValue) -> Option<Bind> {
    let bind = match (ty, value) {
        (ColumnType::Integer, SqlValue::Null) => Bind::Int(None),
        (ColumnType::Integer, SqlValue::Int(v)) => Bind::Int(Some(*v)),
        (ColumnType::Decimal(..), SqlValue::Null) => Bind::Decimal(None),
        (ColumnType::Decimal(..), v @ (SqlValue::Decimal(_) | SqlValue::Int(_))) => {
            Bind::Decimal(v.as_decimal())
        }
        (ColumnType::Text, SqlValue::Null) => Bind::Text(None),
        (ColumnType::Text, SqlValue::Text(v)) => Bind::Text(Some(v.clone())),
        (ColumnType::Boolean, SqlValue::Null) => Bind::Bool(None),
        (ColumnType::Boolean, SqlValue::Bool(v)) => Bind::Bool(Some(*v)),
        (ColumnType::Date, SqlValue::Null) => Bind::Date(None),
        (ColumnType::Date, SqlValue::Date(v)) => Bind::Date(Some(*v)),
        (ColumnType::Timestamp, SqlValue::Null) => Bind::Timestamp(None),
        (ColumnType::Timestamp, SqlValue::Timestamp(v)) => Bind::Timestamp(Some(*v)),
        (ColumnType::Jsonb, SqlValue::Null) => Bind::Json(None),
        (ColumnType::Jsonb, SqlValue::Json(v)) => Bind::Json(Some(Json(v.clone()))),
        _ => return None,
    };
    Some(bind)
}

fn push_bind(values: &mut Separated<'_, '_, Postgres, &'static str>, value: Bind) {
    match value {
        Bind::Int(v) => values.push_bind(v),
        Bind::Decimal(v) => values.push_bind(v),
        Bind::Text(v) => values.push_bind(v),
        Bind::Bool(v) => values.push_bind(v),
        Bind::Date(v) => values.push_bind(v),
        Bind::Timestamp(v) => values.push_bind(v),
        Bind::Json(v) => values.push_bind(v),
    };
}

// =============================================================================
// Decoding
// =============================================================================

fn decode_row(table: &TableDef, row: &PgRow) -> Result<Vec<SqlValue>, WarehouseError> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            decode_column(row, idx, column.ty).map_err(|e| {
                WarehouseError::DataCorruption(format!("{}.{}: {e}", table.name, column.name))
            })
        })
        .collect()
}

fn decode_column(row: &PgRow, idx: usize, ty: ColumnType) -> Result<SqlValue, sqlx::Error> {
    let value: SqlValue = match ty {
        ColumnType::Integer => row.try_get::<Option<i32>, _>(idx)?.into(),
        ColumnType::Decimal(..) => row.try_get::<Option<Decimal>, _>(idx)?.into(),
        ColumnType::Text => row.try_get::<Option<String>, _>(idx)?.into(),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(idx)?.into(),
        ColumnType::Date => row.try_get::<Option<NaiveDate>, _>(idx)?.into(),
        ColumnType::Timestamp => row.try_get::<Option<NaiveDateTime>, _>(idx)?.into(),
        ColumnType::Jsonb => row.try_get::<Option<serde_json::Value>, _>(idx)?.into(),
    };
    Ok(value)
}
