//! E-commerce extraction core - Shared types library.
//!
//! This crate provides the types shared by the extraction components:
//! - `pipeline` - Extractors, loader, order derivation and the task orchestrator
//! - `cli` - Command-line entry point that triggers a pipeline run
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, order status, warehouse rows and task outcomes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
