//! Task results and the end-of-run extraction summary.

use serde::{Deserialize, Serialize};

/// Result of the products extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductsResult {
    pub products_count: u64,
}

/// Result of the users extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsersResult {
    pub users_count: u64,
}

/// Result of the carts extraction (carts and their line items).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartsResult {
    pub carts_count: u64,
    pub cart_items_count: u64,
}

/// Result of order derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrdersResult {
    pub orders_count: u64,
    pub order_items_count: u64,
}

/// Outcome of an optional billing extraction.
///
/// A missing credential is `Skipped`, not an error. Any failure after the
/// credential check is captured as `Failed` and never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingOutcome {
    /// No usable credential configured; nothing was touched.
    Skipped,
    /// Records were fetched and loaded.
    Succeeded {
        /// Primary records loaded (charges, refunds or invoices).
        count: u64,
        /// Child records loaded (invoice lines); zero for other entities.
        item_count: u64,
    },
    /// The attempt failed; the error is reported, not raised.
    Failed {
        /// Description of the failure.
        error: String,
    },
}

impl BillingOutcome {
    /// Records loaded; zero when skipped or failed.
    #[must_use]
    pub const fn count(&self) -> u64 {
        match self {
            Self::Succeeded { count, .. } => *count,
            Self::Skipped | Self::Failed { .. } => 0,
        }
    }

    /// Child records loaded; zero when skipped or failed.
    #[must_use]
    pub const fn item_count(&self) -> u64 {
        match self {
            Self::Succeeded { item_count, .. } => *item_count,
            Self::Skipped | Self::Failed { .. } => 0,
        }
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Skipped | Self::Succeeded { .. } => None,
        }
    }

    /// Flattened report entry.
    #[must_use]
    pub fn report(&self) -> BillingReport {
        BillingReport {
            count: self.count(),
            item_count: self.item_count(),
            skipped: self.is_skipped(),
            error: self.error().map(str::to_string),
        }
    }
}

/// Serializable view of a [`BillingOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingReport {
    pub count: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub item_count: u64,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Catalog counts in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub products: u64,
    pub users: u64,
    pub carts: u64,
    pub cart_items: u64,
    pub orders: u64,
    pub order_items: u64,
}

/// Billing entries in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSummary {
    pub payments: BillingReport,
    pub refunds: BillingReport,
    pub invoices: BillingReport,
}

/// Terminal report of a run, grouped by source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub dummyjson: CatalogSummary,
    pub stripe: BillingSummary,
}
