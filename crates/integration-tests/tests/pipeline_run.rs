//! Full pipeline runs against the in-memory warehouse.

use std::sync::Arc;

use ecom_extract_core::{OrderStatus, SqlValue};
use ecom_extract_integration_tests::{
    SEED, StubCatalog, cart, context, fast_orchestrator, frozen_now,
};
use ecom_extract_pipeline::clock::FixedClock;
use ecom_extract_pipeline::loader::Loader;
use ecom_extract_pipeline::orchestrator::TaskState;
use ecom_extract_pipeline::tasks::{
    DERIVE_ORDERS, EXTRACT_CARTS, EXTRACT_PRODUCTS, EXTRACT_STRIPE_PAYMENTS, LOG_EXTRACTION_SUMMARY,
};
use ecom_extract_pipeline::warehouse::MemoryWarehouse;
use ecom_extract_pipeline::warehouse::schema::{
    RAW_CART_ITEMS, RAW_CARTS, RAW_ORDER_ITEMS, RAW_ORDERS, RAW_PRODUCTS, RAW_USERS,
};
use ecom_extract_pipeline::{Pipeline, PipelineContext, TaskOutput};
use rust_decimal::Decimal;

fn three_carts() -> StubCatalog {
    StubCatalog::with_carts(vec![
        cart(1, 100, 2, 2),
        cart(2, 50, 1, 1),
        cart(3, 200, 3, 3),
    ])
}

#[tokio::test]
async fn test_three_carts_become_three_orders() {
    let warehouse = Arc::new(MemoryWarehouse::new());
    let pipeline = Pipeline::new(
        context(warehouse.clone(), Arc::new(three_carts())),
        fast_orchestrator(),
    )
    .expect("pipeline");

    let report = pipeline.run().await;
    assert!(report.is_success(), "{:?}", report.unsuccessful().collect::<Vec<_>>());

    let Some(TaskOutput::Orders(orders)) = report.output(DERIVE_ORDERS) else {
        panic!("derive_orders produced no result");
    };
    assert_eq!(orders.orders_count, 3);
    assert_eq!(orders.order_items_count, 6);

    let rows = warehouse.rows(&RAW_ORDERS).await.expect("raw_orders");
    let keys: Vec<_> = rows.iter().filter_map(|r| r.first().cloned()).collect();
    assert_eq!(
        keys,
        vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
    );

    // order_id, user_id, order_date, total_amount, discounted_amount, total_items, status
    let first = rows.first().expect("order 1");
    assert_eq!(first.get(3), Some(&SqlValue::Decimal(Decimal::from(100))));
    assert_eq!(first.get(5), Some(&SqlValue::Int(2)));
    let third = rows.get(2).expect("order 3");
    assert_eq!(third.get(3), Some(&SqlValue::Decimal(Decimal::from(200))));
    assert_eq!(third.get(5), Some(&SqlValue::Int(3)));

    for row in &rows {
        let Some(SqlValue::Text(status)) = row.get(6) else {
            panic!("status missing");
        };
        assert!(status.parse::<OrderStatus>().is_ok(), "bad status {status}");
    }

    assert_eq!(
        warehouse.row_count(&RAW_ORDER_ITEMS).await,
        warehouse.row_count(&RAW_CART_ITEMS).await
    );
    assert_eq!(
        warehouse.row_count(&RAW_ORDERS).await,
        warehouse.row_count(&RAW_CARTS).await
    );

    let summary = report
        .output(LOG_EXTRACTION_SUMMARY)
        .and_then(TaskOutput::as_summary)
        .expect("summary");
    assert_eq!(summary.dummyjson.products, 1);
    assert_eq!(summary.dummyjson.users, 1);
    assert_eq!(summary.dummyjson.carts, 3);
    assert_eq!(summary.dummyjson.cart_items, 6);
    assert!(summary.stripe.payments.skipped);
    assert!(summary.stripe.invoices.skipped);
}

#[tokio::test]
async fn test_rerun_replaces_snapshot() {
    let warehouse = Arc::new(MemoryWarehouse::new());
    let pipeline = Pipeline::new(
        context(warehouse.clone(), Arc::new(three_carts())),
        fast_orchestrator(),
    )
    .expect("pipeline");

    let report = pipeline.run().await;
    assert!(report.is_success());
    assert_eq!(report.seed, Some(SEED));
    let first = warehouse.rows(&RAW_ORDERS).await;
    let report = pipeline.run().await;
    assert!(report.is_success());
    assert_eq!(report.seed, Some(SEED));
    let second = warehouse.rows(&RAW_ORDERS).await;

    assert_eq!(warehouse.row_count(&RAW_CARTS).await, 3);
    assert_eq!(warehouse.row_count(&RAW_CART_ITEMS).await, 6);
    assert_eq!(warehouse.row_count(&RAW_PRODUCTS).await, 1);
    assert_eq!(warehouse.row_count(&RAW_USERS).await, 1);
    // Same seed and clock, so the derived orders are identical
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unseeded_runs_draw_fresh_seeds() {
    let carts = (1..=200).map(|id| cart(id, 10, 1, 1)).collect();
    let warehouse = Arc::new(MemoryWarehouse::new());
    let ctx = PipelineContext::new(
        Loader::new(warehouse.clone()),
        Arc::new(StubCatalog::with_carts(carts)),
    )
    .with_clock(Arc::new(FixedClock(frozen_now())));
    let pipeline = Pipeline::new(ctx, fast_orchestrator()).expect("pipeline");

    let first = pipeline.run().await;
    assert!(first.is_success());
    let first_rows = warehouse.rows(&RAW_ORDERS).await.expect("raw_orders");
    let second = pipeline.run().await;
    assert!(second.is_success());
    let second_rows = warehouse.rows(&RAW_ORDERS).await.expect("raw_orders");

    assert!(first.seed.is_some());
    assert_ne!(first.seed, second.seed);
    assert_eq!(first_rows.len(), 200);
    assert_ne!(first_rows, second_rows);
}

#[tokio::test]
async fn test_empty_products_collection() {
    let warehouse = Arc::new(MemoryWarehouse::new());
    let mut catalog = three_carts();
    catalog.products.clear();
    let pipeline = Pipeline::new(context(warehouse.clone(), Arc::new(catalog)), fast_orchestrator())
        .expect("pipeline");

    let report = pipeline.run().await;

    assert!(report.is_success());
    assert_eq!(
        report.output(EXTRACT_PRODUCTS),
        Some(&TaskOutput::Products(ecom_extract_core::ProductsResult {
            products_count: 0
        }))
    );
    assert_eq!(warehouse.row_count(&RAW_PRODUCTS).await, 0);
}

#[tokio::test]
async fn test_transient_cart_failure_is_retried() {
    let warehouse = Arc::new(MemoryWarehouse::new());
    let catalog = Arc::new(three_carts().failing_carts(2));
    let pipeline = Pipeline::new(context(warehouse.clone(), catalog.clone()), fast_orchestrator())
        .expect("pipeline");

    let report = pipeline.run().await;

    assert!(report.is_success());
    assert_eq!(catalog.cart_calls(), 3);
    assert_eq!(report.task(EXTRACT_CARTS).map(|t| t.attempts), Some(3));
    assert_eq!(warehouse.row_count(&RAW_ORDERS).await, 3);
}

#[tokio::test]
async fn test_cart_failure_fails_only_dependents() {
    let warehouse = Arc::new(MemoryWarehouse::new());
    let catalog = three_carts().failing_carts(u32::MAX);
    let pipeline = Pipeline::new(context(warehouse.clone(), Arc::new(catalog)), fast_orchestrator())
        .expect("pipeline");

    let report = pipeline.run().await;

    assert!(!report.is_success());
    let carts = report.task(EXTRACT_CARTS).expect("carts");
    assert_eq!(carts.state, TaskState::Failed);
    assert_eq!(carts.attempts, 3);
    assert!(carts.error.as_deref().is_some_and(|e| e.contains("503")));

    for task in [DERIVE_ORDERS, LOG_EXTRACTION_SUMMARY] {
        let run = report.task(task).expect("task");
        assert_eq!(run.state, TaskState::UpstreamFailed);
        assert_eq!(run.attempts, 0);
    }

    assert_eq!(
        report.task(EXTRACT_PRODUCTS).map(|t| t.state),
        Some(TaskState::Success)
    );
    assert_eq!(
        report.task(EXTRACT_STRIPE_PAYMENTS).map(|t| t.state),
        Some(TaskState::Success)
    );
    assert_eq!(warehouse.row_count(&RAW_PRODUCTS).await, 1);
    assert!(warehouse.rows(&RAW_ORDERS).await.is_none());
}

#[tokio::test]
async fn test_status_distribution_over_ten_thousand_carts() {
    let carts = (1..=10_000).map(|id| cart(id, 10, 1, 0)).collect();
    let warehouse = Arc::new(MemoryWarehouse::new());
    let pipeline = Pipeline::new(
        context(warehouse.clone(), Arc::new(StubCatalog::with_carts(carts))),
        fast_orchestrator(),
    )
    .expect("pipeline");

    assert!(pipeline.run().await.is_success());

    let rows = warehouse.rows(&RAW_ORDERS).await.expect("raw_orders");
    assert_eq!(rows.len(), 10_000);

    for (status, weight) in OrderStatus::ALL.iter().zip(OrderStatus::WEIGHTS) {
        let seen = rows
            .iter()
            .filter(|row| row.get(6) == Some(&SqlValue::Text(status.as_str().to_string())))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let observed = seen as f64 / 10_000.0;
        assert!(
            (observed - weight).abs() < 0.02,
            "{status}: observed {observed}, expected {weight}"
        );
    }
}
