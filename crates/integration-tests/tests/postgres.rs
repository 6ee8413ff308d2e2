//! Loader and pipeline runs against a live `PostgreSQL` warehouse.
//!
//! These tests require:
//! - A running `PostgreSQL` database reachable at `DATABASE_URL`
//!
//! Run with: cargo test -p ecom-extract-integration-tests -- --ignored

use std::sync::Arc;

use ecom_extract_core::{CartId, CartItemRow, CartRow, OrderId, ProductId, UserId};
use ecom_extract_integration_tests::{StubCatalog, cart, context, fast_orchestrator};
use ecom_extract_pipeline::Pipeline;
use ecom_extract_pipeline::db;
use ecom_extract_pipeline::loader::{Loader, batch_of};
use ecom_extract_pipeline::warehouse::schema::{RAW_CART_ITEMS, RAW_CARTS, RAW_ORDERS};
use ecom_extract_pipeline::warehouse::{PgWarehouse, Warehouse};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;

async fn pool() -> PgPool {
    let url: SecretString = db::connection_target(std::env::var("DATABASE_URL").ok());
    db::create_pool(&url, 4).await.expect("Failed to connect to DATABASE_URL")
}

fn cart_row(id: i32) -> CartRow {
    CartRow {
        id: CartId::new(id),
        user_id: Some(UserId::new(id)),
        total: Some(Decimal::new(12_345, 2)),
        discounted_total: None,
        total_products: Some(1),
        total_quantity: Some(2),
    }
}

fn item_row(cart_id: i32, product_id: i32) -> CartItemRow {
    CartItemRow {
        cart_id: CartId::new(cart_id),
        product_id: ProductId::new(product_id),
        title: Some("Annibale Colombo Bed".into()),
        price: Some(Decimal::new(189_999, 2)),
        quantity: Some(2),
        total: Some(Decimal::new(379_998, 2)),
        discount_percentage: None,
        discounted_total: None,
        thumbnail: None,
    }
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL (DATABASE_URL)"]
async fn test_load_is_idempotent() {
    let warehouse = Arc::new(PgWarehouse::new(pool().await));
    warehouse.ping().await.expect("ping");
    let loader = Loader::new(warehouse);

    for _ in 0..2 {
        let counts = loader
            .load_all(vec![
                batch_of(&RAW_CARTS, vec![cart_row(1), cart_row(2)]),
                batch_of(&RAW_CART_ITEMS, vec![item_row(1, 7), item_row(2, 7)]),
            ])
            .await
            .expect("load");
        assert_eq!(counts, vec![2, 2]);
    }

    let carts: Vec<CartRow> = loader.read(&RAW_CARTS).await.expect("read back");
    assert_eq!(carts, vec![cart_row(1), cart_row(2)]);
    let items: Vec<CartItemRow> = loader.read(&RAW_CART_ITEMS).await.expect("read back");
    assert_eq!(items.len(), 2);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL (DATABASE_URL)"]
async fn test_pipeline_run_against_postgres() {
    let pool = pool().await;
    let warehouse = PgWarehouse::new(pool.clone());
    warehouse.ensure_all().await.expect("ensure tables");

    let catalog = StubCatalog::with_carts(vec![
        cart(1, 100, 2, 2),
        cart(2, 50, 1, 1),
        cart(3, 200, 3, 3),
    ]);
    let pipeline = Pipeline::new(
        context(Arc::new(warehouse), Arc::new(catalog)),
        fast_orchestrator(),
    )
    .expect("pipeline");

    let report = pipeline.run().await;
    assert!(report.is_success());

    let orders: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", RAW_ORDERS.name))
        .fetch_one(&pool)
        .await
        .expect("count orders");
    assert_eq!(orders, 3);

    let keys: Vec<OrderId> = sqlx::query_scalar("SELECT order_id FROM raw_orders ORDER BY order_id")
        .fetch_all(&pool)
        .await
        .expect("order keys");
    assert_eq!(keys, vec![OrderId::new(1), OrderId::new(2), OrderId::new(3)]);

    let statuses: Vec<String> = sqlx::query_scalar("SELECT DISTINCT status FROM raw_orders")
        .fetch_all(&pool)
        .await
        .expect("statuses");
    for status in statuses {
        assert!(
            ["completed", "shipped", "pending", "cancelled"].contains(&status.as_str()),
            "unexpected status {status}"
        );
    }
}
