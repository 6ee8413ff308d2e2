//! Warehouse row shapes, one per owned table.
//!
//! Field order matches the insert column order of the corresponding table.
//! Optional fields become `NULL`; nested structures are carried as JSON.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::id::{CartId, OrderId, ProductId, UserId};
use super::status::OrderStatus;
use super::value::SqlValue;

/// Conversion of a typed row into its column values.
pub trait ToRow {
    /// Column values in insert order.
    fn into_values(self) -> Vec<SqlValue>;
}

/// Errors decoding a stored row back into a typed row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowDecodeError {
    #[error("expected {expected} columns, found {found}")]
    Arity { expected: usize, found: usize },
    #[error("column {column} has an unexpected value")]
    Column { column: &'static str },
}

fn id_value(id: i32) -> SqlValue {
    SqlValue::Int(i64::from(id))
}

// =============================================================================
// Catalog rows
// =============================================================================

/// Row of `raw_products`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub id: ProductId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub rating: Option<Decimal>,
    pub stock: Option<i64>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<Decimal>,
    pub thumbnail: Option<String>,
    pub images: serde_json::Value,
}

impl ToRow for ProductRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            id_value(self.id.as_i32()),
            self.title.into(),
            self.description.into(),
            self.category.into(),
            self.price.into(),
            self.discount_percentage.into(),
            self.rating.into(),
            self.stock.into(),
            self.brand.into(),
            self.sku.into(),
            self.weight.into(),
            self.thumbnail.into(),
            self.images.into(),
        ]
    }
}

/// Row of `raw_users`.
///
/// `hair` is flattened into `hair_color`/`hair_type`; the other nested
/// objects stay as JSON blobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub maiden_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub image: Option<String>,
    pub blood_group: Option<String>,
    pub height: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub eye_color: Option<String>,
    pub hair_color: Option<String>,
    pub hair_type: Option<String>,
    pub ip: Option<String>,
    pub address: serde_json::Value,
    pub mac_address: Option<String>,
    pub university: Option<String>,
    pub bank: serde_json::Value,
    pub company: serde_json::Value,
    pub ein: Option<String>,
    pub ssn: Option<String>,
    pub user_agent: Option<String>,
    pub crypto: serde_json::Value,
    pub role: Option<String>,
}

impl ToRow for UserRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            id_value(self.id.as_i32()),
            self.first_name.into(),
            self.last_name.into(),
            self.maiden_name.into(),
            self.age.into(),
            self.gender.into(),
            self.email.into(),
            self.phone.into(),
            self.username.into(),
            self.birth_date.into(),
            self.image.into(),
            self.blood_group.into(),
            self.height.into(),
            self.weight.into(),
            self.eye_color.into(),
            self.hair_color.into(),
            self.hair_type.into(),
            self.ip.into(),
            self.address.into(),
            self.mac_address.into(),
            self.university.into(),
            self.bank.into(),
            self.company.into(),
            self.ein.into(),
            self.ssn.into(),
            self.user_agent.into(),
            self.crypto.into(),
            self.role.into(),
        ]
    }
}

/// Row of `raw_carts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartRow {
    pub id: CartId,
    pub user_id: Option<UserId>,
    pub total: Option<Decimal>,
    pub discounted_total: Option<Decimal>,
    pub total_products: Option<i64>,
    pub total_quantity: Option<i64>,
}

impl CartRow {
    pub const WIDTH: usize = 6;
}

impl ToRow for CartRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            id_value(self.id.as_i32()),
            self.user_id.map(|id| id.as_i32()).into(),
            self.total.into(),
            self.discounted_total.into(),
            self.total_products.into(),
            self.total_quantity.into(),
        ]
    }
}

impl TryFrom<&[SqlValue]> for CartRow {
    type Error = RowDecodeError;

    fn try_from(values: &[SqlValue]) -> Result<Self, Self::Error> {
        let [id, user_id, total, discounted_total, total_products, total_quantity] = values else {
            return Err(RowDecodeError::Arity {
                expected: Self::WIDTH,
                found: values.len(),
            });
        };

        Ok(Self {
            id: CartId::new(required_i32(id, "id")?),
            user_id: optional_i32(user_id, "user_id")?.map(UserId::new),
            total: optional_decimal(total, "total")?,
            discounted_total: optional_decimal(discounted_total, "discounted_total")?,
            total_products: optional_i64(total_products, "total_products")?,
            total_quantity: optional_i64(total_quantity, "total_quantity")?,
        })
    }
}

/// Row of `raw_cart_items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemRow {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
    pub total: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub discounted_total: Option<Decimal>,
    pub thumbnail: Option<String>,
}

impl CartItemRow {
    pub const WIDTH: usize = 9;
}

impl ToRow for CartItemRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            id_value(self.cart_id.as_i32()),
            id_value(self.product_id.as_i32()),
            self.title.into(),
            self.price.into(),
            self.quantity.into(),
            self.total.into(),
            self.discount_percentage.into(),
            self.discounted_total.into(),
            self.thumbnail.into(),
        ]
    }
}

impl TryFrom<&[SqlValue]> for CartItemRow {
    type Error = RowDecodeError;

    fn try_from(values: &[SqlValue]) -> Result<Self, Self::Error> {
        let [
            cart_id,
            product_id,
            title,
            price,
            quantity,
            total,
            discount_percentage,
            discounted_total,
            thumbnail,
        ] = values
        else {
            return Err(RowDecodeError::Arity {
                expected: Self::WIDTH,
                found: values.len(),
            });
        };

        Ok(Self {
            cart_id: CartId::new(required_i32(cart_id, "cart_id")?),
            product_id: ProductId::new(required_i32(product_id, "product_id")?),
            title: optional_text(title, "title")?,
            price: optional_decimal(price, "price")?,
            quantity: optional_i64(quantity, "quantity")?,
            total: optional_decimal(total, "total")?,
            discount_percentage: optional_decimal(discount_percentage, "discount_percentage")?,
            discounted_total: optional_decimal(discounted_total, "discounted_total")?,
            thumbnail: optional_text(thumbnail, "thumbnail")?,
        })
    }
}

// =============================================================================
// Derived rows
// =============================================================================

/// Row of `raw_orders`, derived 1:1 from a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRow {
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub order_date: NaiveDateTime,
    pub total_amount: Option<Decimal>,
    pub discounted_amount: Option<Decimal>,
    pub total_items: Option<i64>,
    pub status: OrderStatus,
}

impl ToRow for OrderRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            id_value(self.order_id.as_i32()),
            self.user_id.map(|id| id.as_i32()).into(),
            self.order_date.into(),
            self.total_amount.into(),
            self.discounted_amount.into(),
            self.total_items.into(),
            self.status.as_str().into(),
        ]
    }
}

/// Row of `raw_order_items`, derived 1:1 from a cart item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemRow {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_title: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
}

impl ToRow for OrderItemRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            id_value(self.order_id.as_i32()),
            id_value(self.product_id.as_i32()),
            self.product_title.into(),
            self.quantity.into(),
            self.unit_price.into(),
            self.total_price.into(),
            self.discount_percentage.into(),
        ]
    }
}

// =============================================================================
// Billing rows
// =============================================================================

/// Row of `raw_stripe_payments` (one Stripe charge).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub charge_id: String,
    pub amount: Option<i64>,
    pub amount_captured: Option<i64>,
    pub amount_refunded: Option<i64>,
    pub currency: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub invoice_id: Option<String>,
    pub payment_method: Option<String>,
    pub receipt_email: Option<String>,
    pub receipt_url: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub paid: Option<bool>,
    pub refunded: Option<bool>,
    pub captured: Option<bool>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub metadata: serde_json::Value,
}

impl ToRow for PaymentRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.charge_id.into(),
            self.amount.into(),
            self.amount_captured.into(),
            self.amount_refunded.into(),
            self.currency.into(),
            self.customer_id.into(),
            self.description.into(),
            self.invoice_id.into(),
            self.payment_method.into(),
            self.receipt_email.into(),
            self.receipt_url.into(),
            self.status.into(),
            self.created_at.into(),
            self.paid.into(),
            self.refunded.into(),
            self.captured.into(),
            self.failure_code.into(),
            self.failure_message.into(),
            self.metadata.into(),
        ]
    }
}

/// Row of `raw_stripe_refunds`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundRow {
    pub refund_id: String,
    pub charge_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub reason: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub receipt_number: Option<String>,
    pub source_transfer_reversal: Option<String>,
    pub transfer_reversal: Option<String>,
    pub metadata: serde_json::Value,
}

impl ToRow for RefundRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.refund_id.into(),
            self.charge_id.into(),
            self.amount.into(),
            self.currency.into(),
            self.reason.into(),
            self.status.into(),
            self.created_at.into(),
            self.receipt_number.into(),
            self.source_transfer_reversal.into(),
            self.transfer_reversal.into(),
            self.metadata.into(),
        ]
    }
}

/// Row of `raw_stripe_invoices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRow {
    pub invoice_id: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub amount_due: Option<i64>,
    pub amount_paid: Option<i64>,
    pub amount_remaining: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub invoice_pdf: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub number: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDateTime>,
    pub period_start: Option<NaiveDateTime>,
    pub period_end: Option<NaiveDateTime>,
    pub paid: Option<bool>,
    pub attempted: Option<bool>,
    pub metadata: serde_json::Value,
}

impl ToRow for InvoiceRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.invoice_id.into(),
            self.customer_id.into(),
            self.subscription_id.into(),
            self.amount_due.into(),
            self.amount_paid.into(),
            self.amount_remaining.into(),
            self.currency.into(),
            self.description.into(),
            self.invoice_pdf.into(),
            self.hosted_invoice_url.into(),
            self.number.into(),
            self.status.into(),
            self.created_at.into(),
            self.due_date.into(),
            self.period_start.into(),
            self.period_end.into(),
            self.paid.into(),
            self.attempted.into(),
            self.metadata.into(),
        ]
    }
}

/// Row of `raw_stripe_invoice_items` (one invoice line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceItemRow {
    pub item_id: String,
    pub invoice_id: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub unit_amount: Option<i64>,
}

impl ToRow for InvoiceItemRow {
    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.item_id.into(),
            self.invoice_id.into(),
            self.amount.into(),
            self.currency.into(),
            self.description.into(),
            self.quantity.into(),
            self.unit_amount.into(),
        ]
    }
}

// =============================================================================
// Decoding helpers
// =============================================================================

fn optional_i64(value: &SqlValue, column: &'static str) -> Result<Option<i64>, RowDecodeError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Int(v) => Ok(Some(*v)),
        _ => Err(RowDecodeError::Column { column }),
    }
}

fn optional_i32(value: &SqlValue, column: &'static str) -> Result<Option<i32>, RowDecodeError> {
    optional_i64(value, column)?
        .map(|v| i32::try_from(v).map_err(|_| RowDecodeError::Column { column }))
        .transpose()
}

fn required_i32(value: &SqlValue, column: &'static str) -> Result<i32, RowDecodeError> {
    optional_i32(value, column)?.ok_or(RowDecodeError::Column { column })
}

fn optional_decimal(
    value: &SqlValue,
    column: &'static str,
) -> Result<Option<Decimal>, RowDecodeError> {
    match value {
        SqlValue::Null => Ok(None),
        other => other
            .as_decimal()
            .map(Some)
            .ok_or(RowDecodeError::Column { column }),
    }
}

fn optional_text(value: &SqlValue, column: &'static str) -> Result<Option<String>, RowDecodeError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Text(v) => Ok(Some(v.clone())),
        _ => Err(RowDecodeError::Column { column }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cart() -> CartRow {
        CartRow {
            id: CartId::new(1),
            user_id: Some(UserId::new(33)),
            total: Some(Decimal::new(10_399, 2)),
            discounted_total: Some(Decimal::new(8_999, 2)),
            total_products: Some(2),
            total_quantity: Some(4),
        }
    }

    #[test]
    fn test_cart_row_decodes_its_own_values() {
        let cart = sample_cart();
        let values = cart.clone().into_values();
        assert_eq!(values.len(), CartRow::WIDTH);
        assert_eq!(CartRow::try_from(values.as_slice()), Ok(cart));
    }

    #[test]
    fn test_cart_row_rejects_wrong_arity() {
        let values = vec![SqlValue::Int(1)];
        assert_eq!(
            CartRow::try_from(values.as_slice()),
            Err(RowDecodeError::Arity {
                expected: CartRow::WIDTH,
                found: 1
            })
        );
    }

    #[test]
    fn test_cart_item_requires_product_id() {
        let mut values = CartItemRow {
            cart_id: CartId::new(1),
            product_id: ProductId::new(9),
            title: None,
            price: None,
            quantity: Some(1),
            total: None,
            discount_percentage: None,
            discounted_total: None,
            thumbnail: None,
        }
        .into_values();
        *values.get_mut(1).expect("product_id column") = SqlValue::Null;

        assert_eq!(
            CartItemRow::try_from(values.as_slice()),
            Err(RowDecodeError::Column {
                column: "product_id"
            })
        );
    }

    #[test]
    fn test_order_row_stores_status_text() {
        let values = OrderRow {
            order_id: OrderId::new(5),
            user_id: None,
            order_date: NaiveDateTime::default(),
            total_amount: None,
            discounted_amount: None,
            total_items: None,
            status: OrderStatus::Shipped,
        }
        .into_values();

        assert_eq!(values.get(6), Some(&SqlValue::Text("shipped".into())));
        assert_eq!(values.get(1), Some(&SqlValue::Null));
    }
}
