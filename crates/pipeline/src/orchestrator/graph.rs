//! Task graph construction and topological ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::error::{GraphError, TaskError};

/// Outputs of a task's dependencies, keyed by task name.
#[derive(Debug, Clone)]
pub struct TaskInputs<O> {
    outputs: BTreeMap<&'static str, O>,
}

impl<O> Default for TaskInputs<O> {
    fn default() -> Self {
        Self {
            outputs: BTreeMap::new(),
        }
    }
}

impl<O> TaskInputs<O> {
    #[must_use]
    pub const fn new(outputs: BTreeMap<&'static str, O>) -> Self {
        Self { outputs }
    }

    /// Output of dependency `task`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::MissingInput` if `task` delivered nothing.
    pub fn get(&self, task: &'static str) -> Result<&O, TaskError> {
        self.outputs.get(task).ok_or(TaskError::MissingInput(task))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Boxed task body.
pub type TaskFn<O> =
    Arc<dyn Fn(TaskInputs<O>) -> BoxFuture<'static, Result<O, TaskError>> + Send + Sync>;

pub(crate) struct TaskNode<O> {
    pub(crate) name: &'static str,
    pub(crate) deps: Vec<usize>,
    pub(crate) dependents: Vec<usize>,
    pub(crate) run: TaskFn<O>,
}

/// A validated DAG of named tasks.
pub struct TaskGraph<O> {
    pub(crate) nodes: Vec<TaskNode<O>>,
    order: Vec<usize>,
}

impl<O> TaskGraph<O> {
    #[must_use]
    pub fn builder() -> TaskGraphBuilder<O> {
        TaskGraphBuilder { specs: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Task indices in topological order.
    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    /// Task names in topological order.
    #[must_use]
    pub fn names_in_order(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter_map(|idx| self.nodes.get(*idx).map(|n| n.name))
            .collect()
    }

    /// Declared dependencies of `task`, or `None` if there is no such task.
    #[must_use]
    pub fn dependencies(&self, task: &str) -> Option<Vec<&'static str>> {
        let node = self.nodes.iter().find(|n| n.name == task)?;
        Some(
            node.deps
                .iter()
                .filter_map(|idx| self.nodes.get(*idx).map(|n| n.name))
                .collect(),
        )
    }

    /// Every task that depends on `idx`, directly or transitively.
    pub(crate) fn transitive_dependents(&self, idx: usize) -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                for dependent in &node.dependents {
                    if found.insert(*dependent) {
                        stack.push(*dependent);
                    }
                }
            }
        }
        found
    }
}

impl<O> std::fmt::Debug for TaskGraph<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("order", &self.names_in_order())
            .finish_non_exhaustive()
    }
}

struct TaskSpec<O> {
    name: &'static str,
    deps: Vec<&'static str>,
    run: TaskFn<O>,
}

/// Builder for [`TaskGraph`]. Dependencies may name tasks registered later.
pub struct TaskGraphBuilder<O> {
    specs: Vec<TaskSpec<O>>,
}

impl<O: Send + 'static> TaskGraphBuilder<O> {
    /// Register a task.
    #[must_use]
    pub fn task<F, Fut>(mut self, name: &'static str, deps: &[&'static str], run: F) -> Self
    where
        F: Fn(TaskInputs<O>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, TaskError>> + Send + 'static,
    {
        self.specs.push(TaskSpec {
            name,
            deps: deps.to_vec(),
            run: Arc::new(move |inputs| run(inputs).boxed()),
        });
        self
    }

    /// Validate the graph and compute its execution order.
    ///
    /// Ties between tasks that become ready together are broken by
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError` on duplicate names, unknown dependencies, or a
    /// dependency cycle.
    pub fn build(self) -> Result<TaskGraph<O>, GraphError> {
        let mut index: HashMap<&'static str, usize> = HashMap::with_capacity(self.specs.len());
        for (idx, spec) in self.specs.iter().enumerate() {
            if index.insert(spec.name, idx).is_some() {
                return Err(GraphError::DuplicateTask(spec.name));
            }
        }

        let mut nodes = Vec::with_capacity(self.specs.len());
        for spec in self.specs {
            let mut deps = Vec::with_capacity(spec.deps.len());
            for dependency in spec.deps {
                let idx = *index.get(dependency).ok_or(GraphError::UnknownDependency {
                    task: spec.name,
                    dependency,
                })?;
                if !deps.contains(&idx) {
                    deps.push(idx);
                }
            }
            nodes.push(TaskNode {
                name: spec.name,
                deps,
                dependents: Vec::new(),
                run: spec.run,
            });
        }

        let edges: Vec<(usize, usize)> = nodes
            .iter()
            .enumerate()
            .flat_map(|(idx, node)| node.deps.iter().map(move |dep| (*dep, idx)))
            .collect();
        for (dep, idx) in edges {
            if let Some(node) = nodes.get_mut(dep) {
                node.dependents.push(idx);
            }
        }

        let order = topological_order(&nodes)?;
        Ok(TaskGraph { nodes, order })
    }
}

/// Kahn's algorithm, always taking the lowest ready index next.
fn topological_order<O>(nodes: &[TaskNode<O>]) -> Result<Vec<usize>, GraphError> {
    let mut pending: Vec<usize> = nodes.iter().map(|n| n.deps.len()).collect();
    let mut ready: BTreeSet<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| idx)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        if let Some(node) = nodes.get(idx) {
            for dependent in &node.dependents {
                if let Some(count) = pending.get_mut(*dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let cycle = nodes
            .iter()
            .enumerate()
            .filter(|(idx, _)| !order.contains(idx))
            .map(|(_, n)| n.name)
            .collect();
        Err(GraphError::Cycle(cycle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: TaskInputs<u32>) -> impl Future<Output = Result<u32, TaskError>> {
        async { Ok(0) }
    }

    #[test]
    fn test_order_respects_dependencies_and_registration() {
        let graph = TaskGraph::builder()
            .task("summary", &["b", "a", "c"], noop)
            .task("a", &[], noop)
            .task("b", &[], noop)
            .task("c", &["a"], noop)
            .build()
            .expect("graph");

        assert_eq!(graph.names_in_order(), vec!["a", "b", "c", "summary"]);
        assert_eq!(graph.dependencies("c"), Some(vec!["a"]));
        assert_eq!(graph.dependencies("missing"), None);
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let err = TaskGraph::builder()
            .task("a", &[], noop)
            .task("a", &[], noop)
            .build()
            .expect_err("duplicate");
        assert_eq!(err, GraphError::DuplicateTask("a"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = TaskGraph::builder()
            .task("a", &["ghost"], noop)
            .build()
            .expect_err("unknown");
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                task: "a",
                dependency: "ghost"
            }
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let err = TaskGraph::builder()
            .task("root", &[], noop)
            .task("a", &["b"], noop)
            .task("b", &["a"], noop)
            .build()
            .expect_err("cycle");
        assert_eq!(err, GraphError::Cycle(vec!["a", "b"]));
    }

    #[test]
    fn test_transitive_dependents() {
        let graph = TaskGraph::builder()
            .task("a", &[], noop)
            .task("b", &["a"], noop)
            .task("c", &["b"], noop)
            .task("d", &[], noop)
            .build()
            .expect("graph");

        let dependents: Vec<_> = graph.transitive_dependents(0).into_iter().collect();
        assert_eq!(dependents, vec![1, 2]);
    }
}
