//! Optional billing extraction: Stripe charges, refunds and invoices.
//!
//! These tasks never fail. A missing credential yields
//! [`BillingOutcome::Skipped`] without touching the warehouse, and any
//! fetch or load error is reported as [`BillingOutcome::Failed`].

use ecom_extract_core::{BillingOutcome, PaymentRow, RefundRow};
use thiserror::Error;
use tracing::{info, warn};

use crate::loader::{LoadError, Loader, batch_of};
use crate::sources::{BillingError, BillingSource};
use crate::warehouse::schema::{
    RAW_STRIPE_INVOICE_ITEMS, RAW_STRIPE_INVOICES, RAW_STRIPE_PAYMENTS, RAW_STRIPE_REFUNDS,
};

#[derive(Debug, Error)]
enum BillingTaskError {
    #[error(transparent)]
    Fetch(#[from] BillingError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

fn outcome(
    entity: &'static str,
    result: Result<(u64, u64), BillingTaskError>,
) -> BillingOutcome {
    match result {
        Ok((count, item_count)) => {
            info!(entity, count, item_count, "Billing extraction succeeded");
            BillingOutcome::Succeeded { count, item_count }
        }
        Err(e) => {
            warn!(entity, error = %e, "Billing extraction failed");
            BillingOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

fn skipped(entity: &'static str) -> BillingOutcome {
    info!(entity, "No Stripe key configured, skipping");
    BillingOutcome::Skipped
}

/// Extract up to `cap` charges into `raw_stripe_payments`.
pub async fn extract_payments(
    source: Option<&dyn BillingSource>,
    loader: &Loader,
    cap: usize,
) -> BillingOutcome {
    let Some(source) = source else {
        return skipped("payments");
    };

    let result = async {
        let charges = source.charges(cap).await?;
        let rows: Vec<PaymentRow> = charges.into_iter().map(PaymentRow::from).collect();
        let count = loader.load(&RAW_STRIPE_PAYMENTS, rows).await?;
        Ok::<_, BillingTaskError>((count, 0))
    }
    .await;

    outcome("payments", result)
}

/// Extract up to `cap` refunds into `raw_stripe_refunds`.
pub async fn extract_refunds(
    source: Option<&dyn BillingSource>,
    loader: &Loader,
    cap: usize,
) -> BillingOutcome {
    let Some(source) = source else {
        return skipped("refunds");
    };

    let result = async {
        let refunds = source.refunds(cap).await?;
        let rows: Vec<RefundRow> = refunds.into_iter().map(RefundRow::from).collect();
        let count = loader.load(&RAW_STRIPE_REFUNDS, rows).await?;
        Ok::<_, BillingTaskError>((count, 0))
    }
    .await;

    outcome("refunds", result)
}

/// Extract up to `cap` invoices and their lines into
/// `raw_stripe_invoices` and `raw_stripe_invoice_items`.
pub async fn extract_invoices(
    source: Option<&dyn BillingSource>,
    loader: &Loader,
    cap: usize,
) -> BillingOutcome {
    let Some(source) = source else {
        return skipped("invoices");
    };

    let result = async {
        let invoices = source.invoices(cap).await?;

        let mut rows = Vec::with_capacity(invoices.len());
        let mut lines = Vec::new();
        for invoice in invoices {
            let (row, items) = invoice.into_rows();
            rows.push(row);
            lines.extend(items);
        }

        let counts = loader
            .load_all(vec![
                batch_of(&RAW_STRIPE_INVOICES, rows),
                batch_of(&RAW_STRIPE_INVOICE_ITEMS, lines),
            ])
            .await?;
        Ok::<_, BillingTaskError>((
            counts.first().copied().unwrap_or_default(),
            counts.get(1).copied().unwrap_or_default(),
        ))
    }
    .await;

    outcome("invoices", result)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::sources::{Charge, Invoice, InvoiceLine, Refund};
    use crate::sources::stripe::ListPage;
    use crate::warehouse::MemoryWarehouse;

    struct Fixture {
        charges: usize,
        fail: bool,
    }

    #[async_trait]
    impl BillingSource for Fixture {
        async fn charges(&self, cap: usize) -> Result<Vec<Charge>, BillingError> {
            if self.fail {
                return Err(BillingError::RateLimited(30));
            }
            Ok((0..self.charges.min(cap))
                .map(|n| Charge {
                    id: format!("ch_{n}"),
                    amount: Some(1_000),
                    ..Charge::default()
                })
                .collect())
        }

        async fn refunds(&self, _cap: usize) -> Result<Vec<Refund>, BillingError> {
            Err(BillingError::Unauthorized)
        }

        async fn invoices(&self, _cap: usize) -> Result<Vec<Invoice>, BillingError> {
            Ok(vec![Invoice {
                id: "in_1".into(),
                lines: Some(ListPage {
                    data: vec![
                        InvoiceLine {
                            id: "il_1".into(),
                            ..InvoiceLine::default()
                        },
                        InvoiceLine {
                            id: "il_2".into(),
                            ..InvoiceLine::default()
                        },
                    ],
                    has_more: false,
                }),
                ..Invoice::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_no_source_is_skipped_without_mutation() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let loader = Loader::new(warehouse.clone());

        let outcome = extract_payments(None, &loader, 100).await;

        assert_eq!(outcome, BillingOutcome::Skipped);
        assert_eq!(warehouse.mutation_count(), 0);
        assert!(warehouse.table_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_charges_are_capped_and_loaded() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let loader = Loader::new(warehouse.clone());
        let source = Fixture {
            charges: 150,
            fail: false,
        };

        let outcome = extract_payments(Some(&source), &loader, 100).await;

        assert_eq!(
            outcome,
            BillingOutcome::Succeeded {
                count: 100,
                item_count: 0
            }
        );
        assert_eq!(warehouse.row_count(&RAW_STRIPE_PAYMENTS).await, 100);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_contained() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let loader = Loader::new(warehouse.clone());
        let source = Fixture {
            charges: 1,
            fail: true,
        };

        let payments = extract_payments(Some(&source), &loader, 100).await;
        let refunds = extract_refunds(Some(&source), &loader, 100).await;

        assert_eq!(payments.count(), 0);
        assert!(payments.error().is_some_and(|e| e.contains("Rate limited")));
        assert!(!payments.is_skipped());
        assert!(refunds.error().is_some());
        assert_eq!(warehouse.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_invoice_lines_are_counted() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let loader = Loader::new(warehouse.clone());
        let source = Fixture {
            charges: 0,
            fail: false,
        };

        let outcome = extract_invoices(Some(&source), &loader, 100).await;

        assert_eq!(outcome.count(), 1);
        assert_eq!(outcome.item_count(), 2);
        assert_eq!(warehouse.row_count(&RAW_STRIPE_INVOICE_ITEMS).await, 2);
    }
}
