//! E-commerce extraction pipeline library.
//!
//! Pulls catalog data (products, users, carts) from DummyJSON and, when a
//! Stripe key is configured, billing data (charges, refunds, invoices) into
//! a `PostgreSQL` warehouse as full-refresh snapshots. Orders are derived
//! from the stored carts.
//!
//! # Layout
//!
//! - [`config`] - Environment configuration
//! - [`sources`] - Catalog and billing API clients
//! - [`warehouse`] - Table definitions and the `PostgreSQL`/in-memory stores
//! - [`loader`] - Truncate-and-replace loading
//! - [`orchestrator`] - Task graph with retries and failure propagation
//! - [`tasks`] - Task bodies
//! - [`pipeline`] - The extraction graph wired to its dependencies

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod clock;
pub mod config;
pub mod db;
pub mod loader;
pub mod orchestrator;
pub mod pipeline;
pub mod rng;
pub mod sources;
pub mod tasks;
pub mod warehouse;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{Pipeline, PipelineContext, PipelineError, WarehouseTarget};
pub use tasks::TaskOutput;
