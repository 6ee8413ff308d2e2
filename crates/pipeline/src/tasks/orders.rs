//! Order derivation.
//!
//! DummyJSON has no order history, so each stored cart becomes one order
//! and each cart line one order item. Order dates and statuses are
//! synthetic: every cart takes one draw for its date and one for its status
//! from a [`SeededRng`], in cart-id order, so a seed reproduces a run.

use chrono::{DateTime, TimeDelta, Utc};
use ecom_extract_core::{
    CartItemRow, CartRow, OrderId, OrderItemRow, OrderRow, OrderStatus, OrdersResult,
};
use tracing::info;

use crate::clock::Clock;
use crate::config::DerivationConfig;
use crate::loader::{Loader, batch_of};
use crate::orchestrator::TaskError;
use crate::rng::SeededRng;
use crate::warehouse::schema::{RAW_CART_ITEMS, RAW_CARTS, RAW_ORDER_ITEMS, RAW_ORDERS};

const MICROS_PER_DAY: i64 = 86_400 * 1_000_000;

/// Orders and order items derived from one cart snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedOrders {
    pub orders: Vec<OrderRow>,
    pub items: Vec<OrderItemRow>,
}

/// `now` minus a uniform fraction of `window_days`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn back_date(now: DateTime<Utc>, window_days: u32, draw: f64) -> DateTime<Utc> {
    let window = i64::from(window_days) * MICROS_PER_DAY;
    let offset = (draw * window as f64) as i64;
    now - TimeDelta::microseconds(offset)
}

/// Derive one order per cart and one order item per cart line.
///
/// Totals, quantities and keys are copied; only `order_date` and `status`
/// are drawn from `rng`.
#[must_use]
pub fn derive_orders(
    carts: &[CartRow],
    items: &[CartItemRow],
    now: DateTime<Utc>,
    rng: &mut SeededRng,
    window_days: u32,
) -> DerivedOrders {
    let orders = carts
        .iter()
        .map(|cart| {
            let order_date = back_date(now, window_days, rng.next_f64()).naive_utc();
            let status = OrderStatus::from_draw(rng.next_f64());
            OrderRow {
                order_id: OrderId::from(cart.id),
                user_id: cart.user_id,
                order_date,
                total_amount: cart.total,
                discounted_amount: cart.discounted_total,
                total_items: cart.total_quantity,
                status,
            }
        })
        .collect();

    let items = items
        .iter()
        .map(|item| OrderItemRow {
            order_id: OrderId::from(item.cart_id),
            product_id: item.product_id,
            product_title: item.title.clone(),
            quantity: item.quantity,
            unit_price: item.price,
            total_price: item.total,
            discount_percentage: item.discount_percentage,
        })
        .collect();

    DerivedOrders { orders, items }
}

/// Read the stored carts back, derive orders, and replace `raw_orders` and
/// `raw_order_items` together.
///
/// # Errors
///
/// Returns `TaskError::Load` if the carts cannot be read or the orders
/// cannot be loaded.
pub async fn derive_and_load(
    loader: &Loader,
    clock: &dyn Clock,
    derivation: DerivationConfig,
    seed: u64,
) -> Result<OrdersResult, TaskError> {
    let carts: Vec<CartRow> = loader.read(&RAW_CARTS).await?;
    let items: Vec<CartItemRow> = loader.read(&RAW_CART_ITEMS).await?;

    let mut rng = SeededRng::from_seed(seed);
    info!(
        seed = rng.seed(),
        carts = carts.len(),
        cart_items = items.len(),
        window_days = derivation.window_days,
        "Deriving orders"
    );

    let derived = derive_orders(&carts, &items, clock.now(), &mut rng, derivation.window_days);

    let counts = loader
        .load_all(vec![
            batch_of(&RAW_ORDERS, derived.orders),
            batch_of(&RAW_ORDER_ITEMS, derived.items),
        ])
        .await?;

    Ok(OrdersResult {
        orders_count: counts.first().copied().unwrap_or_default(),
        order_items_count: counts.get(1).copied().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use ecom_extract_core::{CartId, ProductId, UserId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::clock::FixedClock;
    use crate::warehouse::MemoryWarehouse;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_765_800_000, 0).expect("timestamp")
    }

    fn cart(id: i32, total: i64, quantity: i64) -> CartRow {
        CartRow {
            id: CartId::new(id),
            user_id: Some(UserId::new(id + 100)),
            total: Some(Decimal::from(total)),
            discounted_total: Some(Decimal::from(total - 1)),
            total_products: Some(quantity),
            total_quantity: Some(quantity),
        }
    }

    fn item(cart_id: i32, product_id: i32) -> CartItemRow {
        CartItemRow {
            cart_id: CartId::new(cart_id),
            product_id: ProductId::new(product_id),
            title: Some(format!("product {product_id}")),
            price: Some(Decimal::from(10)),
            quantity: Some(2),
            total: Some(Decimal::from(20)),
            discount_percentage: Some(Decimal::new(525, 2)),
            discounted_total: Some(Decimal::from(19)),
            thumbnail: None,
        }
    }

    #[test]
    fn test_fields_are_copied() {
        let mut rng = SeededRng::from_seed(1);
        let derived = derive_orders(&[cart(7, 100, 2)], &[item(7, 3)], now(), &mut rng, 30);

        let order = derived.orders.first().expect("order");
        assert_eq!(order.order_id, OrderId::new(7));
        assert_eq!(order.user_id, Some(UserId::new(107)));
        assert_eq!(order.total_amount, Some(Decimal::from(100)));
        assert_eq!(order.discounted_amount, Some(Decimal::from(99)));
        assert_eq!(order.total_items, Some(2));

        let line = derived.items.first().expect("item");
        assert_eq!(line.order_id, OrderId::new(7));
        assert_eq!(line.product_id, ProductId::new(3));
        assert_eq!(line.product_title.as_deref(), Some("product 3"));
        assert_eq!(line.unit_price, Some(Decimal::from(10)));
        assert_eq!(line.total_price, Some(Decimal::from(20)));
        assert_eq!(line.discount_percentage, Some(Decimal::new(525, 2)));
    }

    #[test]
    fn test_dates_fall_inside_window() {
        let carts: Vec<CartRow> = (1..=500).map(|id| cart(id, 10, 1)).collect();
        let mut rng = SeededRng::from_seed(99);
        let derived = derive_orders(&carts, &[], now(), &mut rng, 30);

        let latest = now().naive_utc();
        let earliest = (now() - TimeDelta::days(30)).naive_utc();
        for order in &derived.orders {
            assert!(order.order_date <= latest);
            assert!(order.order_date > earliest);
        }
    }

    #[test]
    fn test_same_seed_same_orders() {
        let carts: Vec<CartRow> = (1..=50).map(|id| cart(id, 10, 1)).collect();
        let a = derive_orders(&carts, &[], now(), &mut SeededRng::from_seed(5), 30);
        let b = derive_orders(&carts, &[], now(), &mut SeededRng::from_seed(5), 30);
        assert_eq!(a, b);
    }

    #[test]
    fn test_status_distribution() {
        let carts: Vec<CartRow> = (1..=10_000).map(|id| cart(id, 10, 1)).collect();
        let mut rng = SeededRng::from_seed(2025);
        let derived = derive_orders(&carts, &[], now(), &mut rng, 30);

        let mut counts: BTreeMap<OrderStatus, usize> = BTreeMap::new();
        for order in &derived.orders {
            *counts.entry(order.status).or_default() += 1;
        }

        for (status, weight) in OrderStatus::ALL.iter().zip(OrderStatus::WEIGHTS) {
            #[allow(clippy::cast_precision_loss)]
            let observed = counts.get(status).copied().unwrap_or_default() as f64 / 10_000.0;
            assert!(
                (observed - weight).abs() < 0.02,
                "{status}: observed {observed}, expected {weight}"
            );
        }
    }

    #[test]
    fn test_zero_window_dates_at_now() {
        let mut rng = SeededRng::from_seed(3);
        let derived = derive_orders(&[cart(1, 10, 1)], &[], now(), &mut rng, 0);
        let order = derived.orders.first().expect("order");
        assert_eq!(order.order_date, now().naive_utc());
    }

    #[tokio::test]
    async fn test_derive_and_load_counts_match_carts() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let loader = Loader::new(warehouse.clone());
        loader
            .load_all(vec![
                batch_of(&RAW_CARTS, vec![cart(1, 100, 2), cart(2, 50, 1)]),
                batch_of(&RAW_CART_ITEMS, vec![item(1, 10), item(1, 11), item(2, 10)]),
            ])
            .await
            .expect("seed carts");

        let result = derive_and_load(
            &loader,
            &FixedClock(now()),
            DerivationConfig::default(),
            42,
        )
        .await
        .expect("derive");

        assert_eq!(result.orders_count, 2);
        assert_eq!(result.order_items_count, 3);
        assert_eq!(warehouse.row_count(&RAW_ORDERS).await, 2);
        assert_eq!(warehouse.row_count(&RAW_ORDER_ITEMS).await, 3);
    }

    #[tokio::test]
    async fn test_missing_carts_table_is_an_error() {
        let loader = Loader::new(Arc::new(MemoryWarehouse::new()));
        let err = derive_and_load(
            &loader,
            &FixedClock(now()),
            DerivationConfig::default(),
            42,
        )
        .await
        .expect_err("no carts");
        assert!(matches!(err, TaskError::Load(_)));
    }
}
