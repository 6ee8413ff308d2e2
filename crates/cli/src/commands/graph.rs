//! `graph`: print the task graph.

use ecom_extract_pipeline::{Pipeline, PipelineConfig, WarehouseTarget};

use super::emit;

/// Print every task in execution order with its dependencies.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be assembled or stdout is closed.
pub async fn print(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::from_config(config, WarehouseTarget::Memory).await?;
    let graph = pipeline.graph();
    let schedule = &config.orchestrator.schedule;

    emit(&format!(
        "{} ({}, start {}, catchup {})",
        schedule.pipeline_id, schedule.schedule, schedule.start_date, schedule.catchup
    ))?;
    emit(&format!(
        "retries {} every {}s",
        config.orchestrator.retries,
        config.orchestrator.retry_delay.as_secs()
    ))?;

    for (position, task) in graph.names_in_order().into_iter().enumerate() {
        let deps = graph.dependencies(task).unwrap_or_default();
        if deps.is_empty() {
            emit(&format!("{:>2}. {task}", position + 1))?;
        } else {
            emit(&format!("{:>2}. {task} <- {}", position + 1, deps.join(", ")))?;
        }
    }
    Ok(())
}
