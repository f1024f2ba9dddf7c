//! Deterministic scheduling for the two explicit topologies.
//!
//! One strategy handles both shapes, detected from the task list: if any task
//! declares `depends_on` the topology is hierarchical (DAG), otherwise it is
//! a linear sequence. Ties between runnable tasks always follow declaration
//! order.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::enums::TaskStatus;
use crate::store::TeamStore;
use crate::strategy::{agent_busy, assemble_context, dispatch, ExecutionStrategy, StrategyContext};
use crate::task::{Task, TaskId};

/// Reason string marking tasks parked by an upstream revision, so the unblock
/// pass never revives tasks blocked for other reasons (iteration exhaustion).
const REVISE_RIPPLE: &str = "blocked pending upstream revision";

/// Scheduler for sequential and hierarchical (DAG) topologies.
#[derive(Debug, Default)]
pub struct DeterministicStrategy;

impl DeterministicStrategy {
    pub fn new() -> Self {
        Self
    }

    fn hierarchical(&self, store: &TeamStore) -> bool {
        store.graph().map_or(false, |g| g.has_dependencies())
    }

    /// A TODO task is runnable when every dependency has completed.
    fn runnable(task: &Task, store: &TeamStore) -> bool {
        task.status == TaskStatus::Todo
            && task.depends_on.iter().all(|dep| {
                store
                    .task(dep)
                    .map_or(false, |d| d.status.is_completed())
            })
    }

    /// Hierarchical tick: fill remaining capacity with runnable tasks in
    /// declaration order, skipping tasks whose busy owner disallows cloning.
    fn hierarchical_tick(&self, ctx: &StrategyContext) {
        let max_concurrency = ctx.store.config().max_concurrency;
        let tasks = ctx.store.tasks();
        let mut capacity =
            max_concurrency.saturating_sub(ctx.store.with_state(|s| s.doing_count()));

        for task in &tasks {
            if capacity == 0 {
                break;
            }
            if !Self::runnable(task, &ctx.store) {
                continue;
            }
            if agent_busy(&ctx.store, &task.agent_id, &task.id) && !task.allow_parallel_execution {
                continue;
            }
            let context = self.context_for_task(&ctx.store, task);
            dispatch(ctx, &task.id, context, false);
            capacity -= 1;
        }
    }

    /// Sequential tick: with nothing in flight, promote the first task in
    /// declaration order that has not completed, provided it is TODO.
    fn sequential_tick(&self, ctx: &StrategyContext) {
        let tasks = ctx.store.tasks();
        let in_flight = tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::Doing | TaskStatus::Resumed));
        if in_flight {
            return;
        }
        let Some(next) = tasks.iter().find(|t| !t.status.is_completed()) else {
            return;
        };
        if next.status != TaskStatus::Todo {
            return;
        }
        let context = self.context_for_task(&ctx.store, next);
        dispatch(ctx, &next.id, context, false);
    }

    fn tick(&self, ctx: &StrategyContext) {
        if self.hierarchical(&ctx.store) {
            self.hierarchical_tick(ctx);
        } else {
            self.sequential_tick(ctx);
        }
    }

    /// Revision ripple for one task that entered REVISE.
    ///
    /// Hierarchical: every transitive dependent is parked as BLOCKED until the
    /// revision lands. Sequential: every task after the revised one in
    /// declaration order is reset to TODO. The revised task itself is then
    /// re-dispatched with its feedback attached.
    fn handle_revise(&self, ctx: &StrategyContext, task_id: &TaskId) {
        if self.hierarchical(&ctx.store) {
            let Some(graph) = ctx.store.graph() else { return };
            let dependents = graph.transitive_dependents(task_id);
            for task in ctx.store.tasks() {
                if !dependents.contains(&task.id) || task.status == TaskStatus::Aborted {
                    continue;
                }
                let _ = ctx.store.block_task(&task.id, REVISE_RIPPLE);
            }
        } else {
            let tasks = ctx.store.tasks();
            if let Some(index) = tasks.iter().position(|t| &t.id == task_id) {
                let later: Vec<TaskId> = tasks[index + 1..]
                    .iter()
                    .filter(|t| t.status != TaskStatus::Todo)
                    .map(|t| t.id.clone())
                    .collect();
                if !later.is_empty() {
                    let _ = ctx.store.update_status_of_multiple_tasks(&later, TaskStatus::Todo);
                }
            }
        }

        let Some(task) = ctx.store.task(task_id) else { return };
        let context = self.context_for_task(&ctx.store, &task);
        dispatch(ctx, task_id, context, false);
    }

    /// Completion ripple: release dependents parked by this task's revision.
    fn handle_completed(&self, ctx: &StrategyContext, task_id: &TaskId) {
        if !self.hierarchical(&ctx.store) {
            return;
        }
        let Some(graph) = ctx.store.graph() else { return };
        let dependents = graph.transitive_dependents(task_id);
        let parked: Vec<TaskId> = ctx
            .store
            .tasks()
            .iter()
            .filter(|t| {
                dependents.contains(&t.id)
                    && t.status == TaskStatus::Blocked
                    && t.blocked_reason.as_deref() == Some(REVISE_RIPPLE)
            })
            .map(|t| t.id.clone())
            .collect();
        if !parked.is_empty() {
            let _ = ctx.store.update_status_of_multiple_tasks(&parked, TaskStatus::Todo);
        }
    }
}

#[async_trait]
impl ExecutionStrategy for DeterministicStrategy {
    fn concurrency(&self, store: &TeamStore) -> usize {
        // The queue always gets the full ceiling in hierarchical mode; the
        // runnable rule already limits the initial set to the roots, and
        // later waves (a diamond's middle layer) may be wider than the roots.
        match store.graph() {
            Some(graph) if graph.has_dependencies() => store.config().max_concurrency,
            _ => 1,
        }
    }

    async fn start_execution(&self, ctx: &StrategyContext) {
        self.tick(ctx);
    }

    async fn execute_from_changed_tasks(&self, ctx: &StrategyContext, changed: &[TaskId]) {
        for task_id in changed {
            let Some(task) = ctx.store.task(task_id) else { continue };
            match task.status {
                TaskStatus::Done | TaskStatus::Validated => self.handle_completed(ctx, task_id),
                TaskStatus::Revise => self.handle_revise(ctx, task_id),
                _ => {}
            }
        }
        self.tick(ctx);
    }

    fn context_for_task(&self, store: &TeamStore, task: &Task) -> String {
        if self.hierarchical(store) {
            let deps: HashSet<TaskId> = store
                .graph()
                .map(|g| g.transitive_dependencies(&task.id))
                .unwrap_or_default();
            assemble_context(store, Some(&deps), None)
        } else {
            let index = store.with_state(|state| {
                state.tasks.iter().position(|t| t.id == task.id)
            });
            assemble_context(store, None, index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::config::ExecutionConfig;
    use crate::error::TroupeError;
    use crate::llm::{ChatMessage, LlmClient, LlmOutput};
    use crate::queue::{ExecutionQueue, Runner};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NoopLlm;

    #[async_trait]
    impl LlmClient for NoopLlm {
        async fn invoke(&self, _messages: &[ChatMessage]) -> Result<LlmOutput, TroupeError> {
            Ok(LlmOutput::new("ok"))
        }

        fn model(&self) -> &str {
            "noop"
        }
    }

    fn noop_runner() -> Runner {
        Arc::new(|_item| Box::pin(async {}))
    }

    fn context_with(tasks: Vec<Task>, max_concurrency: usize) -> StrategyContext {
        let config = ExecutionConfig::default().with_max_concurrency(max_concurrency);
        let store = Arc::new(TeamStore::new("t", config));
        store
            .add_agents(vec![
                Agent::new("w1", "r", "g", Arc::new(NoopLlm)).with_id("a1"),
                Agent::new("w2", "r", "g", Arc::new(NoopLlm)).with_id("a2"),
            ])
            .unwrap();
        store.add_tasks(tasks).unwrap();
        store.start(HashMap::new()).unwrap();
        let queue = Arc::new(ExecutionQueue::new(max_concurrency, noop_runner()));
        StrategyContext { store, queue }
    }

    fn task(id: &str, agent: &str, deps: &[&str]) -> Task {
        Task::new(format!("task {id}"), "o", agent)
            .with_id(id)
            .with_depends_on(deps.iter().map(|d| TaskId::new(*d)).collect())
    }

    #[tokio::test]
    async fn test_sequential_starts_first_task_only() {
        let ctx = context_with(
            vec![task("t1", "a1", &[]), task("t2", "a1", &[]), task("t3", "a1", &[])],
            5,
        );
        let strategy = DeterministicStrategy::new();
        assert_eq!(strategy.concurrency(&ctx.store), 1);

        strategy.start_execution(&ctx).await;
        let statuses: Vec<_> = ctx.store.tasks().iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Doing, TaskStatus::Todo, TaskStatus::Todo]
        );
    }

    #[tokio::test]
    async fn test_sequential_promotes_next_on_done() {
        let ctx = context_with(vec![task("t1", "a1", &[]), task("t2", "a1", &[])], 5);
        let strategy = DeterministicStrategy::new();
        strategy.start_execution(&ctx).await;

        ctx.store
            .complete_task(&TaskId::new("t1"), serde_json::json!("r1"), TaskStatus::Done)
            .unwrap();
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;

        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Doing);
    }

    #[tokio::test]
    async fn test_sequential_revise_resets_later_tasks() {
        let ctx = context_with(
            vec![task("t1", "a1", &[]), task("t2", "a1", &[]), task("t3", "a1", &[])],
            5,
        );
        let strategy = DeterministicStrategy::new();
        for id in ["t1", "t2", "t3"] {
            ctx.store.update_task_status(&TaskId::new(id), TaskStatus::Doing).unwrap();
            ctx.store
                .complete_task(&TaskId::new(id), serde_json::json!(id), TaskStatus::Done)
                .unwrap();
        }

        ctx.store.provide_feedback(&TaskId::new("t1"), "redo").unwrap();
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;

        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Todo);
        assert_eq!(ctx.store.task(&TaskId::new("t3")).unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_hierarchical_dispatches_roots_up_to_capacity() {
        let ctx = context_with(
            vec![
                task("t1", "a1", &[]),
                task("t2", "a2", &[]),
                task("t3", "a1", &["t1", "t2"]),
            ],
            2,
        );
        let strategy = DeterministicStrategy::new();
        assert_eq!(strategy.concurrency(&ctx.store), 2);

        strategy.start_execution(&ctx).await;
        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t3")).unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_hierarchical_waits_for_all_dependencies() {
        let ctx = context_with(
            vec![
                task("t1", "a1", &[]),
                task("t2", "a2", &[]),
                task("t3", "a1", &["t1", "t2"]),
            ],
            2,
        );
        let strategy = DeterministicStrategy::new();
        strategy.start_execution(&ctx).await;

        ctx.store
            .complete_task(&TaskId::new("t1"), serde_json::json!(1), TaskStatus::Done)
            .unwrap();
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;
        assert_eq!(ctx.store.task(&TaskId::new("t3")).unwrap().status, TaskStatus::Todo);

        ctx.store
            .complete_task(&TaskId::new("t2"), serde_json::json!(2), TaskStatus::Done)
            .unwrap();
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t2")])
            .await;
        assert_eq!(ctx.store.task(&TaskId::new("t3")).unwrap().status, TaskStatus::Doing);
    }

    #[tokio::test]
    async fn test_busy_agent_without_parallel_flag_is_skipped() {
        let ctx = context_with(
            vec![
                task("t1", "a1", &[]),
                task("t2", "a1", &[]),
                task("t3", "a2", &["t1"]),
            ],
            5,
        );
        let strategy = DeterministicStrategy::new();
        strategy.start_execution(&ctx).await;

        // t1 and t2 share a1; t2 must wait even though capacity remains.
        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_busy_agent_with_parallel_flag_is_cloned() {
        let t2 = task("t2", "a1", &[]).with_allow_parallel_execution(true);
        let ctx = context_with(vec![task("t1", "a1", &[]), t2, task("t3", "a2", &["t1"])], 5);
        let strategy = DeterministicStrategy::new();
        strategy.start_execution(&ctx).await;

        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Doing);
    }

    #[tokio::test]
    async fn test_hierarchical_revise_blocks_dependents_and_unblocks_on_done() {
        let ctx = context_with(
            vec![
                task("t1", "a1", &[]),
                task("t2", "a2", &["t1"]),
                task("t3", "a1", &["t2"]),
            ],
            2,
        );
        let strategy = DeterministicStrategy::new();
        for id in ["t1", "t2", "t3"] {
            ctx.store.update_task_status(&TaskId::new(id), TaskStatus::Doing).unwrap();
            ctx.store
                .complete_task(&TaskId::new(id), serde_json::json!(id), TaskStatus::Done)
                .unwrap();
        }

        ctx.store.provide_feedback(&TaskId::new("t1"), "redo").unwrap();
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;

        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Blocked);
        assert_eq!(ctx.store.task(&TaskId::new("t3")).unwrap().status, TaskStatus::Blocked);

        // Revision lands: direct and transitive dependents return to TODO,
        // and the runnable one is re-dispatched.
        ctx.store
            .complete_task(&TaskId::new("t1"), serde_json::json!("v2"), TaskStatus::Done)
            .unwrap();
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;

        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t3")).unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_exhaustion_blocked_task_is_not_revived_by_unblock_pass() {
        let ctx = context_with(
            vec![task("t1", "a1", &[]), task("t2", "a2", &["t1"])],
            2,
        );
        let strategy = DeterministicStrategy::new();
        ctx.store.update_task_status(&TaskId::new("t1"), TaskStatus::Doing).unwrap();
        ctx.store
            .complete_task(&TaskId::new("t1"), serde_json::json!(1), TaskStatus::Done)
            .unwrap();
        // t2 blocked by iteration exhaustion, not by a revise ripple.
        ctx.store.block_task(&TaskId::new("t2"), "exhausted").unwrap();

        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Blocked);
    }
}
