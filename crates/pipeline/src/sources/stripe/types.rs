//! Stripe API objects and their warehouse rows.
//!
//! Only the fields the warehouse stores are modelled. Unix timestamps are
//! converted to UTC.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

use ecom_extract_core::{InvoiceItemRow, InvoiceRow, PaymentRow, RefundRow};

/// One page of a Stripe list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Objects that can be used as a `starting_after` cursor.
pub trait StripeObject {
    fn id(&self) -> &str;
}

/// Convert a Unix timestamp to a UTC timestamp.
#[must_use]
pub fn utc_timestamp(secs: Option<i64>) -> Option<NaiveDateTime> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| dt.naive_utc())
}

fn metadata_or_empty(value: Option<Value>) -> Value {
    value.unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

/// A charge (`/v1/charges`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Charge {
    pub id: String,
    pub amount: Option<i64>,
    pub amount_captured: Option<i64>,
    pub amount_refunded: Option<i64>,
    pub currency: Option<String>,
    pub customer: Option<String>,
    pub description: Option<String>,
    pub invoice: Option<String>,
    pub payment_method: Option<String>,
    pub receipt_email: Option<String>,
    pub receipt_url: Option<String>,
    pub status: Option<String>,
    pub created: Option<i64>,
    pub paid: Option<bool>,
    pub refunded: Option<bool>,
    pub captured: Option<bool>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub metadata: Option<Value>,
}

impl StripeObject for Charge {
    fn id(&self) -> &str {
        &self.id
    }
}

impl From<Charge> for PaymentRow {
    fn from(c: Charge) -> Self {
        Self {
            charge_id: c.id,
            amount: c.amount,
            amount_captured: c.amount_captured,
            amount_refunded: c.amount_refunded,
            currency: c.currency,
            customer_id: c.customer,
            description: c.description,
            invoice_id: c.invoice,
            payment_method: c.payment_method,
            receipt_email: c.receipt_email,
            receipt_url: c.receipt_url,
            status: c.status,
            created_at: utc_timestamp(c.created),
            paid: c.paid,
            refunded: c.refunded,
            captured: c.captured,
            failure_code: c.failure_code,
            failure_message: c.failure_message,
            metadata: metadata_or_empty(c.metadata),
        }
    }
}

/// A refund (`/v1/refunds`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Refund {
    pub id: String,
    pub charge: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub reason: Option<String>,
    pub status: Option<String>,
    pub created: Option<i64>,
    pub receipt_number: Option<String>,
    pub source_transfer_reversal: Option<String>,
    pub transfer_reversal: Option<String>,
    pub metadata: Option<Value>,
}

impl StripeObject for Refund {
    fn id(&self) -> &str {
        &self.id
    }
}

impl From<Refund> for RefundRow {
    fn from(r: Refund) -> Self {
        Self {
            refund_id: r.id,
            charge_id: r.charge,
            amount: r.amount,
            currency: r.currency,
            reason: r.reason,
            status: r.status,
            created_at: utc_timestamp(r.created),
            receipt_number: r.receipt_number,
            source_transfer_reversal: r.source_transfer_reversal,
            transfer_reversal: r.transfer_reversal,
            metadata: metadata_or_empty(r.metadata),
        }
    }
}

/// Price attached to an invoice line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinePrice {
    pub unit_amount: Option<i64>,
}

/// A line of an invoice (`lines.data[]`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceLine {
    pub id: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub unit_amount: Option<i64>,
    pub price: Option<LinePrice>,
}

/// An invoice (`/v1/invoices`) with its first page of lines.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub amount_due: Option<i64>,
    pub amount_paid: Option<i64>,
    pub amount_remaining: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub invoice_pdf: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub number: Option<String>,
    pub status: Option<String>,
    pub created: Option<i64>,
    pub due_date: Option<i64>,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    pub paid: Option<bool>,
    pub attempted: Option<bool>,
    pub metadata: Option<Value>,
    pub lines: Option<ListPage<InvoiceLine>>,
}

impl StripeObject for Invoice {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Invoice {
    /// Split into the invoice row and one row per line.
    #[must_use]
    pub fn into_rows(self) -> (InvoiceRow, Vec<InvoiceItemRow>) {
        let items = self
            .lines
            .map(|page| page.data)
            .unwrap_or_default()
            .into_iter()
            .map(|line| InvoiceItemRow {
                item_id: line.id,
                invoice_id: self.id.clone(),
                amount: line.amount,
                currency: line.currency,
                description: line.description,
                quantity: line.quantity,
                unit_amount: line
                    .unit_amount
                    .or_else(|| line.price.and_then(|p| p.unit_amount)),
            })
            .collect();

        let invoice = InvoiceRow {
            invoice_id: self.id,
            customer_id: self.customer,
            subscription_id: self.subscription,
            amount_due: self.amount_due,
            amount_paid: self.amount_paid,
            amount_remaining: self.amount_remaining,
            currency: self.currency,
            description: self.description,
            invoice_pdf: self.invoice_pdf,
            hosted_invoice_url: self.hosted_invoice_url,
            number: self.number,
            status: self.status,
            created_at: utc_timestamp(self.created),
            due_date: utc_timestamp(self.due_date),
            period_start: utc_timestamp(self.period_start),
            period_end: utc_timestamp(self.period_end),
            paid: self.paid,
            attempted: self.attempted,
            metadata: metadata_or_empty(self.metadata),
        };

        (invoice, items)
    }
}
