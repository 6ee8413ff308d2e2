//! Definitions of the `raw_*` tables the pipeline owns.
//!
//! Column order here is the insert order of the matching row type in
//! `ecom_extract_core::types::row`.

use ecom_extract_core::ColumnType::{self, Boolean, Date, Decimal, Integer, Jsonb, Text, Timestamp};

/// A single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    /// SQL default expression, if any
    pub default: Option<&'static str>,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        default: None,
    }
}

/// A warehouse table.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    /// Insertable columns, in insert order
    pub columns: &'static [ColumnDef],
    /// Primary key column names
    pub key: &'static [&'static str],
    /// Whether the table carries `extracted_at TIMESTAMP DEFAULT NOW()`
    pub extracted_at: bool,
    /// Truncate with `CASCADE` (parent tables)
    pub cascade: bool,
}

impl TableDef {
    /// Number of insertable columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.columns.len()
    }

    /// Comma-separated insert column list.
    #[must_use]
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Positions of the key columns within [`Self::columns`].
    #[must_use]
    pub fn key_indices(&self) -> Vec<usize> {
        self.key
            .iter()
            .filter_map(|k| self.columns.iter().position(|c| c.name == *k))
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("{} {}", c.name, c.ty.sql());
                if self.key == [c.name] {
                    line.push_str(" PRIMARY KEY");
                }
                if let Some(default) = c.default {
                    line.push_str(" DEFAULT ");
                    line.push_str(default);
                }
                line
            })
            .collect();

        if self.extracted_at {
            lines.push("extracted_at TIMESTAMP DEFAULT NOW()".to_string());
        }
        if self.key.len() > 1 {
            lines.push(format!("PRIMARY KEY ({})", self.key.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            lines.join(",\n    ")
        )
    }

    /// `TRUNCATE TABLE` statement.
    #[must_use]
    pub fn truncate_sql(&self) -> String {
        if self.cascade {
            format!("TRUNCATE TABLE {} CASCADE", self.name)
        } else {
            format!("TRUNCATE TABLE {}", self.name)
        }
    }

    /// `SELECT` of the insertable columns, ordered by key.
    #[must_use]
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.column_list(),
            self.name,
            self.key.join(", ")
        )
    }
}

// =============================================================================
// Catalog
// =============================================================================

pub static RAW_PRODUCTS: TableDef = TableDef {
    name: "raw_products",
    columns: &[
        col("id", Integer),
        col("title", Text),
        col("description", Text),
        col("category", Text),
        col("price", Decimal(10, 2)),
        col("discount_percentage", Decimal(5, 2)),
        col("rating", Decimal(3, 2)),
        col("stock", Integer),
        col("brand", Text),
        col("sku", Text),
        col("weight", Decimal(10, 2)),
        col("thumbnail", Text),
        col("images", Jsonb),
    ],
    key: &["id"],
    extracted_at: true,
    cascade: false,
};

pub static RAW_USERS: TableDef = TableDef {
    name: "raw_users",
    columns: &[
        col("id", Integer),
        col("first_name", Text),
        col("last_name", Text),
        col("maiden_name", Text),
        col("age", Integer),
        col("gender", Text),
        col("email", Text),
        col("phone", Text),
        col("username", Text),
        col("birth_date", Date),
        col("image", Text),
        col("blood_group", Text),
        col("height", Decimal(5, 2)),
        col("weight", Decimal(5, 2)),
        col("eye_color", Text),
        col("hair_color", Text),
        col("hair_type", Text),
        col("ip", Text),
        col("address", Jsonb),
        col("mac_address", Text),
        col("university", Text),
        col("bank", Jsonb),
        col("company", Jsonb),
        col("ein", Text),
        col("ssn", Text),
        col("user_agent", Text),
        col("crypto", Jsonb),
        col("role", Text),
    ],
    key: &["id"],
    extracted_at: true,
    cascade: false,
};

pub static RAW_CARTS: TableDef = TableDef {
    name: "raw_carts",
    columns: &[
        col("id", Integer),
        col("user_id", Integer),
        col("total", Decimal(10, 2)),
        col("discounted_total", Decimal(10, 2)),
        col("total_products", Integer),
        col("total_quantity", Integer),
    ],
    key: &["id"],
    extracted_at: true,
    cascade: true,
};

pub static RAW_CART_ITEMS: TableDef = TableDef {
    name: "raw_cart_items",
    columns: &[
        col("cart_id", Integer),
        col("product_id", Integer),
        col("title", Text),
        col("price", Decimal(10, 2)),
        col("quantity", Integer),
        col("total", Decimal(10, 2)),
        col("discount_percentage", Decimal(5, 2)),
        col("discounted_total", Decimal(10, 2)),
        col("thumbnail", Text),
    ],
    key: &["cart_id", "product_id"],
    extracted_at: true,
    cascade: false,
};

// =============================================================================
// Derived
// =============================================================================

pub static RAW_ORDERS: TableDef = TableDef {
    name: "raw_orders",
    columns: &[
        col("order_id", Integer),
        col("user_id", Integer),
        col("order_date", Timestamp),
        col("total_amount", Decimal(10, 2)),
        col("discounted_amount", Decimal(10, 2)),
        col("total_items", Integer),
        ColumnDef {
            name: "status",
            ty: Text,
            default: Some("'completed'"),
        },
    ],
    key: &["order_id"],
    extracted_at: true,
    cascade: true,
};

pub static RAW_ORDER_ITEMS: TableDef = TableDef {
    name: "raw_order_items",
    columns: &[
        col("order_id", Integer),
        col("product_id", Integer),
        col("product_title", Text),
        col("quantity", Integer),
        col("unit_price", Decimal(10, 2)),
        col("total_price", Decimal(10, 2)),
        col("discount_percentage", Decimal(5, 2)),
    ],
    key: &["order_id", "product_id"],
    extracted_at: false,
    cascade: false,
};

// =============================================================================
// Billing
// =============================================================================

pub static RAW_STRIPE_PAYMENTS: TableDef = TableDef {
    name: "raw_stripe_payments",
    columns: &[
        col("charge_id", Text),
        col("amount", Integer),
        col("amount_captured", Integer),
        col("amount_refunded", Integer),
        col("currency", Text),
        col("customer_id", Text),
        col("description", Text),
        col("invoice_id", Text),
        col("payment_method", Text),
        col("receipt_email", Text),
        col("receipt_url", Text),
        col("status", Text),
        col("created_at", Timestamp),
        col("paid", Boolean),
        col("refunded", Boolean),
        col("captured", Boolean),
        col("failure_code", Text),
        col("failure_message", Text),
        col("metadata", Jsonb),
    ],
    key: &["charge_id"],
    extracted_at: true,
    cascade: false,
};

pub static RAW_STRIPE_REFUNDS: TableDef = TableDef {
    name: "raw_stripe_refunds",
    columns: &[
        col("refund_id", Text),
        col("charge_id", Text),
        col("amount", Integer),
        col("currency", Text),
        col("reason", Text),
        col("status", Text),
        col("created_at", Timestamp),
        col("receipt_number", Text),
        col("source_transfer_reversal", Text),
        col("transfer_reversal", Text),
        col("metadata", Jsonb),
    ],
    key: &["refund_id"],
    extracted_at: true,
    cascade: false,
};

pub static RAW_STRIPE_INVOICES: TableDef = TableDef {
    name: "raw_stripe_invoices",
    columns: &[
        col("invoice_id", Text),
        col("customer_id", Text),
        col("subscription_id", Text),
        col("amount_due", Integer),
        col("amount_paid", Integer),
        col("amount_remaining", Integer),
        col("currency", Text),
        col("description", Text),
        col("invoice_pdf", Text),
        col("hosted_invoice_url", Text),
        col("number", Text),
        col("status", Text),
        col("created_at", Timestamp),
        col("due_date", Timestamp),
        col("period_start", Timestamp),
        col("period_end", Timestamp),
        col("paid", Boolean),
        col("attempted", Boolean),
        col("metadata", Jsonb),
    ],
    key: &["invoice_id"],
    extracted_at: true,
    cascade: true,
};

pub static RAW_STRIPE_INVOICE_ITEMS: TableDef = TableDef {
    name: "raw_stripe_invoice_items",
    columns: &[
        col("item_id", Text),
        col("invoice_id", Text),
        col("amount", Integer),
        col("currency", Text),
        col("description", Text),
        col("quantity", Integer),
        col("unit_amount", Integer),
    ],
    key: &["item_id"],
    extracted_at: true,
    cascade: false,
};

/// Every table, in dependency-friendly creation order.
pub static ALL_TABLES: [&TableDef; 10] = [
    &RAW_PRODUCTS,
    &RAW_USERS,
    &RAW_CARTS,
    &RAW_CART_ITEMS,
    &RAW_ORDERS,
    &RAW_ORDER_ITEMS,
    &RAW_STRIPE_PAYMENTS,
    &RAW_STRIPE_REFUNDS,
    &RAW_STRIPE_INVOICES,
    &RAW_STRIPE_INVOICE_ITEMS,
];
