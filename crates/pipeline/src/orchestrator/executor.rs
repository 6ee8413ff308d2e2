//! DAG execution with per-task retry.
//!
//! Tasks whose dependencies have all succeeded are spawned onto a `JoinSet`
//! immediately; nothing else orders them. A task that fails after its
//! retries marks every transitive dependent `upstream_failed`, while
//! unrelated branches keep running.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use uuid::Uuid;

use super::OrchestratorConfig;
use super::error::TaskError;
use super::graph::{TaskFn, TaskGraph, TaskInputs};

/// Terminal state of a task in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Success,
    Failed,
    UpstreamFailed,
}

/// What happened to one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRun<O> {
    pub name: &'static str,
    pub state: TaskState,
    /// Attempts made; zero when the task never started
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<O>,
    pub duration_ms: u64,
}

/// Result of one run of a task graph.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<O> {
    pub run_id: Uuid,
    pub pipeline_id: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Seed the run's random draws started from, when the graph uses one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Per-task results, in topological order
    pub tasks: Vec<TaskRun<O>>,
}

impl<O> RunReport<O> {
    /// True only when every task succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Success)
    }

    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskRun<O>> {
        self.tasks.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<&O> {
        self.task(name).and_then(|t| t.output.as_ref())
    }

    /// Tasks that did not succeed.
    pub fn unsuccessful(&self) -> impl Iterator<Item = &TaskRun<O>> {
        self.tasks.iter().filter(|t| t.state != TaskState::Success)
    }
}

/// Executes task graphs.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
}

struct Finished<O> {
    idx: usize,
    result: Result<O, TaskError>,
    attempts: u32,
    elapsed: Duration,
}

impl Orchestrator {
    #[must_use]
    pub const fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every task of `graph` once (with retries) and report the outcome.
    pub async fn run<O>(&self, graph: &TaskGraph<O>) -> RunReport<O>
    where
        O: Clone + Send + Sync + 'static,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let pipeline_id = self.config.schedule.pipeline_id;

        tracing::info!(
            pipeline = pipeline_id,
            run_id = %run_id,
            tasks = graph.len(),
            retries = self.config.retries,
            max_parallel_tasks = self.config.max_parallel_tasks,
            "Starting run"
        );

        let semaphore = self
            .config
            .max_parallel_tasks
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        let mut runs: Vec<Option<TaskRun<O>>> = graph.nodes.iter().map(|_| None).collect();
        let mut waiting: Vec<usize> = graph.nodes.iter().map(|n| n.deps.len()).collect();
        let mut outputs: BTreeMap<usize, O> = BTreeMap::new();
        let mut join_set: JoinSet<Finished<O>> = JoinSet::new();
        let mut spawned: HashMap<Id, usize> = HashMap::new();

        for idx in graph.order() {
            if waiting.get(*idx) == Some(&0) {
                self.spawn(&mut join_set, &mut spawned, graph, *idx, &outputs, semaphore.clone());
            }
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            let finished = match joined {
                Ok((id, finished)) => {
                    spawned.remove(&id);
                    finished
                }
                Err(join_err) => {
                    let Some(idx) = spawned.remove(&join_err.id()) else {
                        tracing::error!(error = %join_err, "Task join failed");
                        continue;
                    };
                    Finished {
                        idx,
                        result: Err(TaskError::Panicked(join_err.to_string())),
                        attempts: 1,
                        elapsed: Duration::ZERO,
                    }
                }
            };

            let Some(node) = graph.nodes.get(finished.idx) else {
                continue;
            };
            let duration_ms = u64::try_from(finished.elapsed.as_millis()).unwrap_or(u64::MAX);

            match finished.result {
                Ok(output) => {
                    tracing::info!(
                        task = node.name,
                        attempts = finished.attempts,
                        duration_ms,
                        "Task succeeded"
                    );
                    outputs.insert(finished.idx, output.clone());
                    set_run(
                        &mut runs,
                        finished.idx,
                        TaskRun {
                            name: node.name,
                            state: TaskState::Success,
                            attempts: finished.attempts,
                            error: None,
                            output: Some(output),
                            duration_ms,
                        },
                    );

                    let mut ready = Vec::new();
                    for dependent in &node.dependents {
                        if let Some(count) = waiting.get_mut(*dependent) {
                            *count = count.saturating_sub(1);
                            if *count == 0 {
                                ready.push(*dependent);
                            }
                        }
                    }
                    ready.sort_unstable();
                    for dependent in ready {
                        self.spawn(
                            &mut join_set,
                            &mut spawned,
                            graph,
                            dependent,
                            &outputs,
                            semaphore.clone(),
                        );
                    }
                }
                Err(error) => {
                    tracing::error!(
                        task = node.name,
                        attempts = finished.attempts,
                        error = %error,
                        "Task failed"
                    );
                    set_run(
                        &mut runs,
                        finished.idx,
                        TaskRun {
                            name: node.name,
                            state: TaskState::Failed,
                            attempts: finished.attempts,
                            error: Some(error.to_string()),
                            output: None,
                            duration_ms,
                        },
                    );

                    for dependent in graph.transitive_dependents(finished.idx) {
                        let Some(dep_node) = graph.nodes.get(dependent) else {
                            continue;
                        };
                        if runs.get(dependent).is_some_and(Option::is_none) {
                            tracing::warn!(
                                task = dep_node.name,
                                upstream = node.name,
                                "Skipping task, upstream failed"
                            );
                            set_run(
                                &mut runs,
                                dependent,
                                TaskRun {
                                    name: dep_node.name,
                                    state: TaskState::UpstreamFailed,
                                    attempts: 0,
                                    error: Some(format!("upstream task '{}' failed", node.name)),
                                    output: None,
                                    duration_ms: 0,
                                },
                            );
                        }
                    }
                }
            }
        }

        let tasks: Vec<TaskRun<O>> = graph
            .order()
            .iter()
            .filter_map(|idx| {
                let node = graph.nodes.get(*idx)?;
                Some(runs.get_mut(*idx)?.take().unwrap_or_else(|| TaskRun {
                    name: node.name,
                    state: TaskState::Failed,
                    attempts: 0,
                    error: Some("task did not complete".to_string()),
                    output: None,
                    duration_ms: 0,
                }))
            })
            .collect();

        let report = RunReport {
            run_id,
            pipeline_id,
            started_at,
            finished_at: Utc::now(),
            seed: None,
            tasks,
        };

        tracing::info!(
            pipeline = pipeline_id,
            run_id = %run_id,
            success = report.is_success(),
            failed = report.unsuccessful().count(),
            "Run finished"
        );
        report
    }

    fn spawn<O>(
        &self,
        join_set: &mut JoinSet<Finished<O>>,
        spawned: &mut HashMap<Id, usize>,
        graph: &TaskGraph<O>,
        idx: usize,
        outputs: &BTreeMap<usize, O>,
        semaphore: Option<Arc<Semaphore>>,
    ) where
        O: Clone + Send + Sync + 'static,
    {
        let Some(node) = graph.nodes.get(idx) else {
            return;
        };

        let inputs: BTreeMap<&'static str, O> = node
            .deps
            .iter()
            .filter_map(|dep| {
                let name = graph.nodes.get(*dep)?.name;
                Some((name, outputs.get(dep)?.clone()))
            })
            .collect();

        let name = node.name;
        let run = Arc::clone(&node.run);
        let retries = self.config.retries;
        let delay = self.config.retry_delay;

        let handle = join_set.spawn(async move {
            let started = Instant::now();
            let (result, attempts) =
                run_with_retry(name, &run, TaskInputs::new(inputs), retries, delay, semaphore)
                    .await;
            Finished {
                idx,
                result,
                attempts,
                elapsed: started.elapsed(),
            }
        });
        spawned.insert(handle.id(), idx);
    }
}

fn set_run<O>(runs: &mut [Option<TaskRun<O>>], idx: usize, run: TaskRun<O>) {
    if let Some(slot) = runs.get_mut(idx) {
        *slot = Some(run);
    }
}

/// Run one task, retrying up to `retries` times with a fixed `delay`.
///
/// Returns the final result and the number of attempts made.
async fn run_with_retry<O>(
    name: &'static str,
    run: &TaskFn<O>,
    inputs: TaskInputs<O>,
    retries: u32,
    delay: Duration,
    semaphore: Option<Arc<Semaphore>>,
) -> (Result<O, TaskError>, u32)
where
    O: Clone + Send + 'static,
{
    let max_attempts = retries.saturating_add(1);
    let mut attempt = 0_u32;

    loop {
        attempt += 1;

        let permit = match &semaphore {
            Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    return (
                        Err(TaskError::Panicked(format!("semaphore closed: {e}"))),
                        attempt,
                    );
                }
            },
            None => None,
        };

        tracing::debug!(task = name, attempt, max_attempts, "Task attempt starting");
        let attempt_inputs = inputs.clone();
        let result = AssertUnwindSafe(async move { run(attempt_inputs).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TaskError::Panicked(panic_message(&*panic))));
        drop(permit);

        match result {
            Ok(output) => return (Ok(output), attempt),
            Err(error) if attempt < max_attempts => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    task = name,
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %error,
                    "Task failed, will retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return (Err(error), attempt),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use super::*;
    use crate::orchestrator::ScheduleConfig;

    fn config(retries: u32) -> OrchestratorConfig {
        OrchestratorConfig {
            schedule: ScheduleConfig::default(),
            retries,
            retry_delay: Duration::from_millis(1),
            max_parallel_tasks: None,
        }
    }

    fn ok(value: u32) -> impl Fn(TaskInputs<u32>) -> futures::future::Ready<Result<u32, TaskError>> {
        move |_| futures::future::ready(Ok(value))
    }

    async fn explode(_: TaskInputs<u32>) -> Result<u32, TaskError> {
        panic!("exploded")
    }

    fn fail(_: TaskInputs<u32>) -> futures::future::Ready<Result<u32, TaskError>> {
        futures::future::ready(Err(TaskError::MissingInput("nothing")))
    }

    #[tokio::test]
    async fn test_outputs_flow_to_dependents() {
        let graph = TaskGraph::builder()
            .task("a", &[], ok(2))
            .task("b", &[], ok(3))
            .task("sum", &["a", "b"], |inputs: TaskInputs<u32>| async move {
                Ok::<_, TaskError>(inputs.get("a")? + inputs.get("b")?)
            })
            .build()
            .expect("graph");

        let report = Orchestrator::new(config(0)).run(&graph).await;

        assert!(report.is_success());
        assert_eq!(report.output("sum"), Some(&5));
        assert_eq!(report.task("a").map(|t| t.attempts), Some(1));
        assert_eq!(report.pipeline_id, "ecommerce_data_extraction");
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let graph = TaskGraph::builder()
            .task("flaky", &[], move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TaskError::MissingInput("transient"))
                    } else {
                        Ok(1_u32)
                    }
                }
            })
            .build()
            .expect("graph");

        let report = Orchestrator::new(config(2)).run(&graph).await;

        assert!(report.is_success());
        assert_eq!(report.task("flaky").map(|t| t.attempts), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_marks_only_dependents() {
        let graph = TaskGraph::builder()
            .task("carts", &[], fail)
            .task("orders", &["carts"], ok(1))
            .task("products", &[], ok(1))
            .task("summary", &["orders", "products"], ok(1))
            .build()
            .expect("graph");

        let report = Orchestrator::new(config(2)).run(&graph).await;

        assert!(!report.is_success());
        let state = |name| report.task(name).map(|t| t.state);
        assert_eq!(state("carts"), Some(TaskState::Failed));
        assert_eq!(report.task("carts").map(|t| t.attempts), Some(3));
        assert_eq!(state("orders"), Some(TaskState::UpstreamFailed));
        assert_eq!(state("summary"), Some(TaskState::UpstreamFailed));
        assert_eq!(state("products"), Some(TaskState::Success));
        assert_eq!(report.task("orders").map(|t| t.attempts), Some(0));
    }

    #[tokio::test]
    async fn test_panic_is_a_failure() {
        let graph = TaskGraph::builder()
            .task("boom", &[], explode)
            .build()
            .expect("graph");

        let report = Orchestrator::new(config(0)).run(&graph).await;
        let run = report.task("boom").expect("task");
        assert_eq!(run.state, TaskState::Failed);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("exploded")));
    }

    #[tokio::test]
    async fn test_panic_before_first_poll_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let graph = TaskGraph::builder()
            .task(
                "eager",
                &[],
                move |_: TaskInputs<u32>| -> futures::future::Ready<Result<u32, TaskError>> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    panic!("eager")
                },
            )
            .task("after", &["eager"], ok(1))
            .build()
            .expect("graph");

        let report = Orchestrator::new(config(1)).run(&graph).await;

        let run = report.task("eager").expect("task");
        assert_eq!(run.state, TaskState::Failed);
        assert_eq!(run.attempts, 2);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("eager")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            report.task("after").map(|t| t.state),
            Some(TaskState::UpstreamFailed)
        );
    }

    #[tokio::test]
    async fn test_parallelism_bound() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut builder = TaskGraph::builder();
        for name in ["a", "b", "c", "d"] {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            builder = builder.task(name, &[], move |_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(0_u32)
                }
            });
        }
        let graph = builder.build().expect("graph");

        let mut cfg = config(0);
        cfg.max_parallel_tasks = Some(2);
        let report = Orchestrator::new(cfg).run(&graph).await;

        assert!(report.is_success());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
