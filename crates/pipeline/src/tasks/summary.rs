//! End-of-run extraction summary.

use ecom_extract_core::{
    BillingOutcome, BillingReport, BillingSummary, CartsResult, CatalogSummary,
    ExtractionSummary, OrdersResult, ProductsResult, UsersResult,
};
use tracing::{info, warn};

/// Group the seven task results by source.
#[must_use]
pub fn summarize(
    products: ProductsResult,
    users: UsersResult,
    carts: CartsResult,
    orders: OrdersResult,
    payments: &BillingOutcome,
    refunds: &BillingOutcome,
    invoices: &BillingOutcome,
) -> ExtractionSummary {
    ExtractionSummary {
        dummyjson: CatalogSummary {
            products: products.products_count,
            users: users.users_count,
            carts: carts.carts_count,
            cart_items: carts.cart_items_count,
            orders: orders.orders_count,
            order_items: orders.order_items_count,
        },
        stripe: BillingSummary {
            payments: payments.report(),
            refunds: refunds.report(),
            invoices: invoices.report(),
        },
    }
}

fn log_billing(entity: &'static str, report: &BillingReport) {
    if report.skipped {
        info!(entity, "  {entity}: skipped (no Stripe key)");
    } else if let Some(error) = &report.error {
        warn!(entity, error = %error, "  {entity}: failed");
    } else if report.item_count > 0 {
        info!(
            entity,
            count = report.count,
            item_count = report.item_count,
            "  {entity}: {} ({} line items)",
            report.count,
            report.item_count
        );
    } else {
        info!(entity, count = report.count, "  {entity}: {}", report.count);
    }
}

/// Log the summary as a readable block.
pub fn log_summary(summary: &ExtractionSummary) {
    let catalog = &summary.dummyjson;
    info!("Extraction summary");
    info!("DummyJSON");
    info!("  products: {}", catalog.products);
    info!("  users: {}", catalog.users);
    info!("  carts: {} ({} items)", catalog.carts, catalog.cart_items);
    info!("  orders: {} ({} items)", catalog.orders, catalog.order_items);
    info!("Stripe");
    log_billing("payments", &summary.stripe.payments);
    log_billing("refunds", &summary.stripe.refunds);
    log_billing("invoices", &summary.stripe.invoices);
}
