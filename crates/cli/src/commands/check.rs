//! `check`: validate configuration and warehouse connectivity.

use ecom_extract_pipeline::PipelineConfig;
use ecom_extract_pipeline::config::looks_like_stripe_key;
use ecom_extract_pipeline::pipeline::{WarehouseTarget, connect_warehouse};

/// Log the resolved configuration and ping the warehouse.
///
/// # Errors
///
/// Returns an error if the warehouse cannot be reached.
pub async fn execute(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        catalog = config.catalog.base_url.as_str(),
        http_timeout_secs = config.http_timeout.as_secs(),
        retries = config.orchestrator.retries,
        max_parallel_tasks = config.orchestrator.max_parallel_tasks,
        "Configuration loaded"
    );

    match &config.stripe {
        Some(stripe) if looks_like_stripe_key(&stripe.api_key) => {
            tracing::info!(record_cap = stripe.record_cap, "Stripe key configured");
        }
        Some(_) => tracing::warn!("STRIPE_API_KEY does not look like a Stripe secret key"),
        None => tracing::info!("No Stripe key configured; billing tasks will be skipped"),
    }

    let warehouse = connect_warehouse(config, WarehouseTarget::Postgres).await?;
    warehouse.ping().await?;
    tracing::info!("Warehouse reachable and tables present");
    Ok(())
}
