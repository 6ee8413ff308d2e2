//! `run`: execute the pipeline once.
//!
//! # Environment Variables
//!
//! See `ecom_extract_pipeline::config` for the full list. `--seed` overrides
//! `ORDER_SEED`.

use ecom_extract_pipeline::orchestrator::{RunReport, TaskState};
use ecom_extract_pipeline::{
    Pipeline, PipelineConfig, PipelineError, TaskOutput, WarehouseTarget,
};
use thiserror::Error;

use super::emit;

/// Errors that can occur during a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The pipeline could not be assembled.
    #[error("Failed to assemble pipeline: {0}")]
    Setup(#[from] PipelineError),

    /// At least one task did not succeed.
    #[error("Run {run_id} failed: {}", failed.join(", "))]
    TasksFailed { run_id: String, failed: Vec<String> },

    /// The report could not be written.
    #[error("Failed to write report: {0}")]
    Output(#[from] std::io::Error),

    /// The report could not be serialized.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Run every task once and report.
///
/// # Errors
///
/// Returns `RunError::TasksFailed` when any task failed or was skipped
/// because an upstream task failed.
pub async fn execute(
    mut config: PipelineConfig,
    seed: Option<u64>,
    dry_run: bool,
    json: bool,
) -> Result<(), RunError> {
    if seed.is_some() {
        config.derivation.seed = seed;
    }

    let target = if dry_run {
        WarehouseTarget::Memory
    } else {
        WarehouseTarget::Postgres
    };

    let pipeline = Pipeline::from_config(&config, target).await?;
    tracing::info!(
        pipeline = config.orchestrator.schedule.pipeline_id,
        configured_seed = ?config.derivation.seed,
        dry_run,
        "Starting extraction"
    );

    let report = pipeline.run().await;

    if json {
        emit(&serde_json::to_string_pretty(&report)?)?;
    }

    check_report(&report)
}

fn check_report(report: &RunReport<TaskOutput>) -> Result<(), RunError> {
    for task in &report.tasks {
        match task.state {
            TaskState::Success => {
                tracing::info!(task = task.name, attempts = task.attempts, "Task succeeded");
            }
            TaskState::Failed => tracing::error!(
                task = task.name,
                attempts = task.attempts,
                error = task.error.as_deref().unwrap_or_default(),
                "Task failed"
            ),
            TaskState::UpstreamFailed => {
                tracing::warn!(task = task.name, "Task not run: upstream failed");
            }
        }
    }

    if report.is_success() {
        tracing::info!(run_id = %report.run_id, "Run completed");
        Ok(())
    } else {
        Err(RunError::TasksFailed {
            run_id: report.run_id.to_string(),
            failed: report.unsuccessful().map(|t| t.name.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ecom_extract_pipeline::orchestrator::TaskRun;
    use uuid::Uuid;

    use super::*;

    fn task(name: &'static str, state: TaskState) -> TaskRun<TaskOutput> {
        TaskRun {
            name,
            state,
            attempts: 1,
            error: None,
            output: None,
            duration_ms: 0,
        }
    }

    fn report(tasks: Vec<TaskRun<TaskOutput>>) -> RunReport<TaskOutput> {
        RunReport {
            run_id: Uuid::nil(),
            pipeline_id: "ecommerce_data_extraction",
            started_at: Utc::now(),
            finished_at: Utc::now(),
            seed: Some(7),
            tasks,
        }
    }

    #[test]
    fn test_successful_report_passes() {
        let report = report(vec![task("extract_products", TaskState::Success)]);
        assert!(check_report(&report).is_ok());
    }

    #[test]
    fn test_failed_report_names_tasks() {
        let report = report(vec![
            task("extract_carts", TaskState::Failed),
            task("derive_orders", TaskState::UpstreamFailed),
            task("extract_users", TaskState::Success),
        ]);

        let err = check_report(&report).expect_err("failed");
        match err {
            RunError::TasksFailed { failed, .. } => {
                assert_eq!(failed, vec!["extract_carts", "derive_orders"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
