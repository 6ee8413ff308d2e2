//! Task graph orchestration.
//!
//! A [`TaskGraph`] is built once from named tasks and their data
//! dependencies; an [`Orchestrator`] runs it with the immutable
//! [`OrchestratorConfig`] it was constructed with.

mod error;
mod executor;
mod graph;

use std::time::Duration;

use chrono::NaiveDate;

pub use error::{GraphError, TaskError};
pub use executor::{Orchestrator, RunReport, TaskRun, TaskState};
pub use graph::{TaskFn, TaskGraph, TaskGraphBuilder, TaskInputs};

/// Identity of the pipeline for the external scheduler.
///
/// The scheduler decides when a run starts; these values describe the
/// pipeline to it and label every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub pipeline_id: &'static str,
    pub description: &'static str,
    /// Cron preset or expression
    pub schedule: &'static str,
    pub start_date: NaiveDate,
    /// Whether missed intervals are replayed
    pub catchup: bool,
    pub tags: &'static [&'static str],
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            pipeline_id: "ecommerce_data_extraction",
            description: "Extract data from DummyJSON and Stripe APIs",
            schedule: "@daily",
            start_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap_or_default(),
            catchup: false,
            tags: &["extraction", "ecommerce", "api"],
        }
    }
}

/// Executor settings, fixed for the lifetime of an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub schedule: ScheduleConfig,
    /// Additional attempts after a task's first failure
    pub retries: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
    /// Upper bound on concurrently running tasks; `None` is unbounded
    pub max_parallel_tasks: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            retries: 2,
            retry_delay: Duration::from_secs(300),
            max_parallel_tasks: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_identity() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.pipeline_id, "ecommerce_data_extraction");
        assert_eq!(schedule.schedule, "@daily");
        assert_eq!(schedule.start_date.to_string(), "2025-12-15");
        assert!(!schedule.catchup);
        assert_eq!(schedule.tags, &["extraction", "ecommerce", "api"]);
    }

    #[test]
    fn test_default_retry_policy() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.retries, 2);
        assert_eq!(config.retry_delay, Duration::from_secs(300));
    }
}
