//! Task dependency graph.
//!
//! Tasks hold dependency ids; the graph is built from those ids as adjacency
//! lists and queried by id. Acyclicity is validated once at workflow start
//! with an iterative DFS.

use std::collections::{HashMap, HashSet};

use crate::error::TroupeError;
use crate::task::{Task, TaskId};

/// Adjacency-list view of a task list's `depends_on` declarations.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// task -> its direct dependencies
    dependencies: HashMap<TaskId, Vec<TaskId>>,
    /// task -> tasks that directly depend on it
    dependents: HashMap<TaskId, Vec<TaskId>>,
    /// Declaration order, used for deterministic tie-breaks.
    order: Vec<TaskId>,
}

impl DependencyGraph {
    /// Build and validate a graph from a task list.
    ///
    /// Fails if any `depends_on` id does not resolve, or if the graph has a
    /// cycle. Either failure is fatal to the workflow.
    pub fn build(tasks: &[Task]) -> Result<Self, TroupeError> {
        let known: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();

        let mut dependencies: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut order = Vec::with_capacity(tasks.len());

        for task in tasks {
            order.push(task.id.clone());
            dependencies.insert(task.id.clone(), task.depends_on.clone());
            dependents.entry(task.id.clone()).or_default();
            for dep in &task.depends_on {
                if !known.contains(dep) {
                    return Err(TroupeError::UnknownDependency {
                        task_id: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependents.entry(dep.clone()).or_default().push(task.id.clone());
            }
        }

        let graph = Self { dependencies, dependents, order };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Whether any task declares a dependency. Decides the topology.
    pub fn has_dependencies(&self) -> bool {
        self.dependencies.values().any(|deps| !deps.is_empty())
    }

    /// Tasks with no dependencies, in declaration order.
    pub fn roots(&self) -> Vec<TaskId> {
        self.order
            .iter()
            .filter(|id| self.dependencies.get(*id).map_or(true, |d| d.is_empty()))
            .cloned()
            .collect()
    }

    /// Direct dependencies of a task.
    pub fn dependencies_of(&self, id: &TaskId) -> &[TaskId] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All tasks reachable by following `depends_on` edges from `id`.
    pub fn transitive_dependencies(&self, id: &TaskId) -> HashSet<TaskId> {
        self.walk(id, &self.dependencies)
    }

    /// All tasks that transitively depend on `id`.
    pub fn transitive_dependents(&self, id: &TaskId) -> HashSet<TaskId> {
        self.walk(id, &self.dependents)
    }

    fn walk(&self, start: &TaskId, edges: &HashMap<TaskId, Vec<TaskId>>) -> HashSet<TaskId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&TaskId> = edges.get(start).map(|v| v.iter().collect()).unwrap_or_default();
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                if let Some(more) = edges.get(next) {
                    stack.extend(more.iter());
                }
            }
        }
        seen
    }

    /// Iterative three-color DFS over the dependency edges.
    fn check_acyclic(&self) -> Result<(), TroupeError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Finished,
        }

        let mut marks: HashMap<&TaskId, Mark> = HashMap::new();

        for start in &self.order {
            if marks.contains_key(start) {
                continue;
            }
            // Stack of (node, entered). A node is pushed once to enter (mark
            // in-progress, push children) and once to leave (mark finished).
            let mut stack = vec![(start, false)];
            while let Some((node, entered)) = stack.pop() {
                if entered {
                    marks.insert(node, Mark::Finished);
                    continue;
                }
                match marks.get(node) {
                    Some(Mark::Finished) => continue,
                    Some(Mark::InProgress) => {
                        let cycle = stack
                            .iter()
                            .filter(|(_, e)| *e)
                            .map(|(n, _)| (*n).clone())
                            .chain(std::iter::once(node.clone()))
                            .collect();
                        return Err(TroupeError::CycleInDependencies(cycle));
                    }
                    None => {}
                }
                marks.insert(node, Mark::InProgress);
                stack.push((node, true));
                for dep in self.dependencies_of(node) {
                    if marks.get(dep) != Some(&Mark::Finished) {
                        stack.push((dep, false));
                    }
                }
            }
        }
        Ok(())
    }
}
