//! The extraction pipeline: its task graph and how it is wired to sources
//! and a warehouse.
//!
//! ```text
//! extract_products ─┐
//! extract_users ────┤
//! extract_carts ──> derive_orders ─┤
//! extract_stripe_payments ─────────┼──> log_extraction_summary
//! extract_stripe_refunds ──────────┤
//! extract_stripe_invoices ─────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::{DerivationConfig, PipelineConfig};
use crate::db;
use crate::loader::Loader;
use crate::orchestrator::{GraphError, Orchestrator, OrchestratorConfig, RunReport, TaskGraph};
use crate::rng::SeededRng;
use crate::sources::{
    BillingError, BillingSource, CatalogSource, DummyJsonClient, SourceError, StripeClient,
};
use crate::tasks::{
    self, DERIVE_ORDERS, EXTRACT_CARTS, EXTRACT_PRODUCTS, EXTRACT_STRIPE_INVOICES,
    EXTRACT_STRIPE_PAYMENTS, EXTRACT_STRIPE_REFUNDS, EXTRACT_USERS, LOG_EXTRACTION_SUMMARY,
    TaskOutput,
};
use crate::warehouse::{MemoryWarehouse, PgWarehouse, Warehouse, WarehouseError};

/// Errors assembling a pipeline from configuration.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("catalog client: {0}")]
    Catalog(#[from] SourceError),

    #[error("billing client: {0}")]
    Billing(#[from] BillingError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("warehouse: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("task graph: {0}")]
    Graph(#[from] GraphError),
}

/// Where a run writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarehouseTarget {
    /// `PostgreSQL` at `DATABASE_URL`.
    #[default]
    Postgres,
    /// In-process tables, discarded at exit.
    Memory,
}

/// Everything the task bodies share.
pub struct PipelineContext {
    loader: Loader,
    catalog: Arc<dyn CatalogSource>,
    billing: Option<Arc<dyn BillingSource>>,
    record_cap: usize,
    clock: Arc<dyn Clock>,
    derivation: DerivationConfig,
    /// Seed of the run in progress
    run_seed: AtomicU64,
}

impl PipelineContext {
    /// Context with no billing source, the system clock and a fresh seed per run.
    #[must_use]
    pub fn new(loader: Loader, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            loader,
            catalog,
            billing: None,
            record_cap: 100,
            clock: Arc::new(SystemClock),
            derivation: DerivationConfig::default(),
            run_seed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_billing(mut self, source: Arc<dyn BillingSource>, record_cap: usize) -> Self {
        self.billing = Some(source);
        self.record_cap = record_cap;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Order derivation settings. A configured seed is reused by every run.
    #[must_use]
    pub fn with_derivation(mut self, derivation: DerivationConfig) -> Self {
        self.derivation = derivation;
        self
    }

    /// Seed configured for every run, if any.
    #[must_use]
    pub const fn configured_seed(&self) -> Option<u64> {
        self.derivation.seed
    }

    /// Seed every order derivation attempt of the current run starts from.
    fn run_seed(&self) -> u64 {
        self.run_seed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn loader(&self) -> &Loader {
        &self.loader
    }

    fn billing(&self) -> Option<&dyn BillingSource> {
        self.billing.as_deref()
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("billing", &self.billing.is_some())
            .field("record_cap", &self.record_cap)
            .field("derivation", &self.derivation)
            .field("seed", &self.derivation.seed)
            .finish_non_exhaustive()
    }
}

/// Build the extraction graph over `ctx`.
///
/// # Errors
///
/// Returns `GraphError` if the graph is malformed.
pub fn build_graph(ctx: &Arc<PipelineContext>) -> Result<TaskGraph<TaskOutput>, GraphError> {
    let products = Arc::clone(ctx);
    let users = Arc::clone(ctx);
    let carts = Arc::clone(ctx);
    let orders = Arc::clone(ctx);
    let payments = Arc::clone(ctx);
    let refunds = Arc::clone(ctx);
    let invoices = Arc::clone(ctx);

    TaskGraph::builder()
        .task(EXTRACT_PRODUCTS, &[], move |_| {
            let ctx = Arc::clone(&products);
            async move {
                tasks::catalog::extract_products(ctx.catalog.as_ref(), &ctx.loader)
                    .await
                    .map(TaskOutput::Products)
            }
        })
        .task(EXTRACT_USERS, &[], move |_| {
            let ctx = Arc::clone(&users);
            async move {
                tasks::catalog::extract_users(ctx.catalog.as_ref(), &ctx.loader)
                    .await
                    .map(TaskOutput::Users)
            }
        })
        .task(EXTRACT_CARTS, &[], move |_| {
            let ctx = Arc::clone(&carts);
            async move {
                tasks::catalog::extract_carts(ctx.catalog.as_ref(), &ctx.loader)
                    .await
                    .map(TaskOutput::Carts)
            }
        })
        .task(DERIVE_ORDERS, &[EXTRACT_CARTS], move |_| {
            let ctx = Arc::clone(&orders);
            async move {
                tasks::orders::derive_and_load(
                    &ctx.loader,
                    ctx.clock.as_ref(),
                    ctx.derivation,
                    ctx.run_seed(),
                )
                .await
                .map(TaskOutput::Orders)
            }
        })
        .task(EXTRACT_STRIPE_PAYMENTS, &[], move |_| {
            let ctx = Arc::clone(&payments);
            async move {
                let outcome =
                    tasks::billing::extract_payments(ctx.billing(), &ctx.loader, ctx.record_cap)
                        .await;
                Ok(TaskOutput::Billing(outcome))
            }
        })
        .task(EXTRACT_STRIPE_REFUNDS, &[], move |_| {
            let ctx = Arc::clone(&refunds);
            async move {
                let outcome =
                    tasks::billing::extract_refunds(ctx.billing(), &ctx.loader, ctx.record_cap)
                        .await;
                Ok(TaskOutput::Billing(outcome))
            }
        })
        .task(EXTRACT_STRIPE_INVOICES, &[], move |_| {
            let ctx = Arc::clone(&invoices);
            async move {
                let outcome =
                    tasks::billing::extract_invoices(ctx.billing(), &ctx.loader, ctx.record_cap)
                        .await;
                Ok(TaskOutput::Billing(outcome))
            }
        })
        .task(
            LOG_EXTRACTION_SUMMARY,
            &[
                EXTRACT_PRODUCTS,
                EXTRACT_USERS,
                EXTRACT_CARTS,
                DERIVE_ORDERS,
                EXTRACT_STRIPE_PAYMENTS,
                EXTRACT_STRIPE_REFUNDS,
                EXTRACT_STRIPE_INVOICES,
            ],
            |inputs| async move {
                let summary = tasks::summary::summarize(
                    tasks::products_input(&inputs, EXTRACT_PRODUCTS)?,
                    tasks::users_input(&inputs, EXTRACT_USERS)?,
                    tasks::carts_input(&inputs, EXTRACT_CARTS)?,
                    tasks::orders_input(&inputs, DERIVE_ORDERS)?,
                    tasks::billing_input(&inputs, EXTRACT_STRIPE_PAYMENTS)?,
                    tasks::billing_input(&inputs, EXTRACT_STRIPE_REFUNDS)?,
                    tasks::billing_input(&inputs, EXTRACT_STRIPE_INVOICES)?,
                );
                tasks::summary::log_summary(&summary);
                Ok(TaskOutput::Summary(summary))
            },
        )
        .build()
}

/// A ready-to-run extraction pipeline.
#[derive(Debug)]
pub struct Pipeline {
    context: Arc<PipelineContext>,
    graph: TaskGraph<TaskOutput>,
    orchestrator: Orchestrator,
    /// Runs of one pipeline do not overlap
    running: Mutex<()>,
}

impl Pipeline {
    /// Assemble a pipeline over an existing context.
    ///
    /// # Errors
    ///
    /// Returns `GraphError` if the graph is malformed.
    pub fn new(context: PipelineContext, config: OrchestratorConfig) -> Result<Self, GraphError> {
        let context = Arc::new(context);
        let graph = build_graph(&context)?;
        Ok(Self {
            context,
            graph,
            orchestrator: Orchestrator::new(config),
            running: Mutex::new(()),
        })
    }

    /// Assemble a pipeline from configuration, connecting to the warehouse
    /// unless `target` is [`WarehouseTarget::Memory`].
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if a client cannot be built or the warehouse
    /// is unreachable.
    pub async fn from_config(
        config: &PipelineConfig,
        target: WarehouseTarget,
    ) -> Result<Self, PipelineError> {
        let warehouse = connect_warehouse(config, target).await?;

        let catalog = DummyJsonClient::new(&config.catalog, config.http_timeout)?;
        let mut context = PipelineContext::new(Loader::new(warehouse), Arc::new(catalog))
            .with_derivation(config.derivation);

        if let Some(stripe) = &config.stripe {
            let client = StripeClient::new(stripe, config.http_timeout)?;
            context = context.with_billing(Arc::new(client), stripe.record_cap);
        }

        info!(
            warehouse = ?target,
            billing = config.stripe.is_some(),
            seed = ?context.configured_seed(),
            "Pipeline assembled"
        );

        Ok(Self::new(context, config.orchestrator.clone())?)
    }

    #[must_use]
    pub const fn graph(&self) -> &TaskGraph<TaskOutput> {
        &self.graph
    }

    #[must_use]
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run the graph once.
    ///
    /// Without a configured seed each run draws its own from OS entropy. The
    /// seed used is recorded in the report so the run can be replayed.
    pub async fn run(&self) -> RunReport<TaskOutput> {
        let _running = self.running.lock().await;

        let seed = SeededRng::from_optional_seed(self.context.configured_seed()).seed();
        self.context.run_seed.store(seed, Ordering::SeqCst);
        info!(seed, "Run seed resolved");

        let mut report = self.orchestrator.run(&self.graph).await;
        report.seed = Some(seed);
        report
    }
}

/// Open the configured warehouse and make sure every table exists.
///
/// # Errors
///
/// Returns `PipelineError` if the pool cannot connect or a table cannot be
/// created.
pub async fn connect_warehouse(
    config: &PipelineConfig,
    target: WarehouseTarget,
) -> Result<Arc<dyn Warehouse>, PipelineError> {
    match target {
        WarehouseTarget::Memory => Ok(Arc::new(MemoryWarehouse::new())),
        WarehouseTarget::Postgres => {
            let pool =
                db::create_pool(&config.database.url, config.database.max_connections).await?;
            let warehouse = PgWarehouse::new(pool);
            warehouse.ensure_all().await?;
            Ok(Arc::new(warehouse))
        }
    }
}
