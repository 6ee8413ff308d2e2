//! Core types for the extraction pipeline.
//!
//! This module provides type-safe wrappers for keys, statuses, warehouse
//! rows and task outcomes.

pub mod id;
pub mod outcome;
pub mod row;
pub mod status;
pub mod value;

pub use id::*;
pub use outcome::*;
pub use row::*;
pub use status::OrderStatus;
pub use value::{ColumnType, SqlValue};
