//! In-process warehouse for dry runs and tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use ecom_extract_core::SqlValue;

use super::{TableBatch, TableDef, Warehouse, WarehouseError};

/// Warehouse that keeps every table in memory.
///
/// Mirrors the Postgres contract: a replace is all-or-nothing, primary keys
/// must be unique, and reading a table that was never written fails.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: RwLock<BTreeMap<&'static str, Vec<Vec<SqlValue>>>>,
    mutations: AtomicU64,
}

impl MemoryWarehouse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently stored in `table`, or `None` if it was never created.
    pub async fn rows(&self, table: &TableDef) -> Option<Vec<Vec<SqlValue>>> {
        self.tables.read().await.get(table.name).cloned()
    }

    /// Row count of `table`; zero if it was never created.
    pub async fn row_count(&self, table: &TableDef) -> usize {
        self.tables
            .read()
            .await
            .get(table.name)
            .map_or(0, Vec::len)
    }

    /// Names of every table that exists.
    pub async fn table_names(&self) -> Vec<&'static str> {
        self.tables.read().await.keys().copied().collect()
    }

    /// Number of successful `replace` calls.
    #[must_use]
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

fn check_keys(batch: &TableBatch) -> Result<(), WarehouseError> {
    let key = batch.table.key_indices();
    let mut seen = HashSet::with_capacity(batch.rows.len());

    for row in &batch.rows {
        if row.len() != batch.table.width() {
            return Err(WarehouseError::DataCorruption(format!(
                "{}: expected {} values, got {}",
                batch.table.name,
                batch.table.width(),
                row.len()
            )));
        }

        let mut parts = Vec::with_capacity(key.len());
        for idx in &key {
            match row.get(*idx) {
                Some(SqlValue::Null) | None => {
                    return Err(WarehouseError::Conflict(format!(
                        "{}: null primary key",
                        batch.table.name
                    )));
                }
                Some(value) => parts.push(format!("{value:?}")),
            }
        }

        let key_text = parts.join("|");
        if !seen.insert(key_text.clone()) {
            return Err(WarehouseError::Conflict(format!(
                "{}: duplicate key ({key_text})",
                batch.table.name
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn replace(&self, batches: Vec<TableBatch>) -> Result<Vec<u64>, WarehouseError> {
        for batch in &batches {
            check_keys(batch)?;
        }

        let mut tables = self.tables.write().await;
        let mut counts = Vec::with_capacity(batches.len());
        for batch in batches {
            counts.push(batch.rows.len() as u64);
            tables.insert(batch.table.name, batch.rows);
        }
        drop(tables);

        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(counts)
    }

    async fn fetch_all(
        &self,
        table: &'static TableDef,
    ) -> Result<Vec<Vec<SqlValue>>, WarehouseError> {
        let mut rows = self
            .rows(table)
            .await
            .ok_or(WarehouseError::MissingTable(table.name))?;

        let key = table.key_indices();
        rows.sort_by(|a, b| {
            key.iter()
                .map(|idx| compare(a.get(*idx), b.get(*idx)))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), WarehouseError> {
        Ok(())
    }
}

fn compare(a: Option<&SqlValue>, b: Option<&SqlValue>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(SqlValue::Int(a)), Some(SqlValue::Int(b))) => a.cmp(b),
        (Some(SqlValue::Text(a)), Some(SqlValue::Text(b))) => a.cmp(b),
        _ => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::schema::{RAW_CART_ITEMS, RAW_CARTS};

    fn cart(id: i64) -> Vec<SqlValue> {
        vec![
            SqlValue::Int(id),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Int(1),
            SqlValue::Int(2),
        ]
    }

    #[tokio::test]
    async fn test_replace_then_fetch_sorted() {
        let warehouse = MemoryWarehouse::new();
        let counts = warehouse
            .replace(vec![TableBatch::new(&RAW_CARTS, vec![cart(3), cart(1), cart(2)])])
            .await
            .expect("replace");
        assert_eq!(counts, vec![3]);

        let rows = warehouse.fetch_all(&RAW_CARTS).await.expect("fetch");
        let ids: Vec<_> = rows
            .iter()
            .filter_map(|r| r.first().and_then(SqlValue::as_i64))
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_duplicate_key_leaves_previous_contents() {
        let warehouse = MemoryWarehouse::new();
        warehouse
            .replace(vec![TableBatch::new(&RAW_CARTS, vec![cart(1)])])
            .await
            .expect("replace");

        let err = warehouse
            .replace(vec![
                TableBatch::new(&RAW_CARTS, vec![cart(5)]),
                TableBatch::new(&RAW_CART_ITEMS, Vec::new()),
                TableBatch::new(&RAW_CARTS, vec![cart(7), cart(7)]),
            ])
            .await
            .expect_err("duplicate key");
        assert!(matches!(err, WarehouseError::Conflict(_)));

        assert_eq!(warehouse.row_count(&RAW_CARTS).await, 1);
        assert!(warehouse.rows(&RAW_CART_ITEMS).await.is_none());
        assert_eq!(warehouse.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_table() {
        let warehouse = MemoryWarehouse::new();
        assert!(matches!(
            warehouse.fetch_all(&RAW_CARTS).await,
            Err(WarehouseError::MissingTable("raw_carts"))
        ));
    }
}
