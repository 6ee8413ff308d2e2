//! Task bodies of the extraction graph.
//!
//! Each task is an async function over the sources and the [`Loader`]
//! returning a typed result; [`TaskOutput`] carries those results between
//! tasks and into the run report.
//!
//! [`Loader`]: crate::loader::Loader

pub mod billing;
pub mod catalog;
pub mod orders;
pub mod summary;

use ecom_extract_core::{
    BillingOutcome, CartsResult, ExtractionSummary, OrdersResult, ProductsResult, UsersResult,
};
use serde::Serialize;

use crate::orchestrator::{TaskError, TaskInputs};

pub const EXTRACT_PRODUCTS: &str = "extract_products";
pub const EXTRACT_USERS: &str = "extract_users";
pub const EXTRACT_CARTS: &str = "extract_carts";
pub const DERIVE_ORDERS: &str = "derive_orders";
pub const EXTRACT_STRIPE_PAYMENTS: &str = "extract_stripe_payments";
pub const EXTRACT_STRIPE_REFUNDS: &str = "extract_stripe_refunds";
pub const EXTRACT_STRIPE_INVOICES: &str = "extract_stripe_invoices";
pub const LOG_EXTRACTION_SUMMARY: &str = "log_extraction_summary";

/// Result of any task in the extraction graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutput {
    Products(ProductsResult),
    Users(UsersResult),
    Carts(CartsResult),
    Orders(OrdersResult),
    Billing(BillingOutcome),
    Summary(ExtractionSummary),
}

impl TaskOutput {
    /// The summary, if this is the summary task's output.
    #[must_use]
    pub const fn as_summary(&self) -> Option<&ExtractionSummary> {
        match self {
            Self::Summary(summary) => Some(summary),
            _ => None,
        }
    }
}

pub(crate) fn products_input(
    inputs: &TaskInputs<TaskOutput>,
    task: &'static str,
) -> Result<ProductsResult, TaskError> {
    match inputs.get(task)? {
        TaskOutput::Products(result) => Ok(*result),
        _ => Err(TaskError::UnexpectedInput(task)),
    }
}

pub(crate) fn users_input(
    inputs: &TaskInputs<TaskOutput>,
    task: &'static str,
) -> Result<UsersResult, TaskError> {
    match inputs.get(task)? {
        TaskOutput::Users(result) => Ok(*result),
        _ => Err(TaskError::UnexpectedInput(task)),
    }
}

pub(crate) fn carts_input(
    inputs: &TaskInputs<TaskOutput>,
    task: &'static str,
) -> Result<CartsResult, TaskError> {
    match inputs.get(task)? {
        TaskOutput::Carts(result) => Ok(*result),
        _ => Err(TaskError::UnexpectedInput(task)),
    }
}

pub(crate) fn orders_input(
    inputs: &TaskInputs<TaskOutput>,
    task: &'static str,
) -> Result<OrdersResult, TaskError> {
    match inputs.get(task)? {
        TaskOutput::Orders(result) => Ok(*result),
        _ => Err(TaskError::UnexpectedInput(task)),
    }
}

pub(crate) fn billing_input<'a>(
    inputs: &'a TaskInputs<TaskOutput>,
    task: &'static str,
) -> Result<&'a BillingOutcome, TaskError> {
    match inputs.get(task)? {
        TaskOutput::Billing(outcome) => Ok(outcome),
        _ => Err(TaskError::UnexpectedInput(task)),
    }
}
