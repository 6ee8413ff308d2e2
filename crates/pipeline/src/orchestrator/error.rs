//! Orchestration errors.

use thiserror::Error;

use crate::loader::LoadError;
use crate::sources::SourceError;

/// Errors building a task graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("task '{0}' is registered more than once")]
    DuplicateTask(&'static str),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency {
        task: &'static str,
        dependency: &'static str,
    },

    #[error("dependency cycle through: {}", .0.join(", "))]
    Cycle(Vec<&'static str>),
}

/// Errors raised by a task body. Any of these consumes a retry.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Catalog fetch failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Loading or reading back a table failed.
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// A declared input was not delivered.
    #[error("missing input from task '{0}'")]
    MissingInput(&'static str),

    /// An input had a different shape than the task expects.
    #[error("unexpected output from task '{0}'")]
    UnexpectedInput(&'static str),

    /// The task body panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
}
