//! Catalog extraction: products, users and carts.

use ecom_extract_core::{
    CartItemRow, CartRow, CartsResult, ProductRow, ProductsResult, UserRow, UsersResult,
};
use tracing::info;

use crate::loader::{Loader, batch_of};
use crate::orchestrator::TaskError;
use crate::sources::CatalogSource;
use crate::warehouse::schema::{RAW_CART_ITEMS, RAW_CARTS, RAW_PRODUCTS, RAW_USERS};

/// Fetch every product and replace `raw_products`.
///
/// # Errors
///
/// Returns `TaskError::Source` if the fetch fails and `TaskError::Load` if
/// the load fails.
pub async fn extract_products(
    source: &dyn CatalogSource,
    loader: &Loader,
) -> Result<ProductsResult, TaskError> {
    let records = source.products().await?;
    info!(records = records.len(), "Fetched products");

    let rows: Vec<ProductRow> = records.into_iter().map(ProductRow::from).collect();
    let products_count = loader.load(&RAW_PRODUCTS, rows).await?;

    Ok(ProductsResult { products_count })
}

/// Fetch every user and replace `raw_users`.
///
/// # Errors
///
/// Returns `TaskError::Source` if the fetch fails and `TaskError::Load` if
/// the load fails.
pub async fn extract_users(
    source: &dyn CatalogSource,
    loader: &Loader,
) -> Result<UsersResult, TaskError> {
    let records = source.users().await?;
    info!(records = records.len(), "Fetched users");

    let rows: Vec<UserRow> = records.into_iter().map(UserRow::from).collect();
    let users_count = loader.load(&RAW_USERS, rows).await?;

    Ok(UsersResult { users_count })
}

/// Fetch every cart and replace `raw_carts` and `raw_cart_items` together.
///
/// # Errors
///
/// Returns `TaskError::Source` if the fetch fails and `TaskError::Load` if
/// the load fails.
pub async fn extract_carts(
    source: &dyn CatalogSource,
    loader: &Loader,
) -> Result<CartsResult, TaskError> {
    let records = source.carts().await?;
    info!(records = records.len(), "Fetched carts");

    let mut carts: Vec<CartRow> = Vec::with_capacity(records.len());
    let mut items: Vec<CartItemRow> = Vec::new();
    for record in records {
        let (cart, lines) = record.into_rows();
        carts.push(cart);
        items.extend(lines);
    }

    let counts = loader
        .load_all(vec![
            batch_of(&RAW_CARTS, carts),
            batch_of(&RAW_CART_ITEMS, items),
        ])
        .await?;

    Ok(CartsResult {
        carts_count: counts.first().copied().unwrap_or_default(),
        cart_items_count: counts.get(1).copied().unwrap_or_default(),
    })
}
