//! Execution strategies.
//!
//! A strategy decides which tasks become runnable on each state change and
//! how per-task context is gathered. Strategies are state-threaded: they hold
//! no mutable workflow state and act on the store passed to every call, only
//! through its atomic mutators.

pub mod deterministic;
pub mod manager;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::enums::TaskStatus;
use crate::queue::{ExecutionQueue, WorkItem};
use crate::store::TeamStore;
use crate::task::{Task, TaskId};

pub use deterministic::DeterministicStrategy;
pub use manager::ManagerStrategy;

/// Store plus queue handles threaded through every strategy call.
pub struct StrategyContext {
    pub store: Arc<TeamStore>,
    pub queue: Arc<ExecutionQueue>,
}

/// Scheduler contract. All dispatch happens on a single driver task, so
/// implementations may assume their methods are never called concurrently.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Desired worker count for the execution queue.
    fn concurrency(&self, store: &TeamStore) -> usize;

    /// Choose and enqueue the initial task set.
    async fn start_execution(&self, ctx: &StrategyContext);

    /// React to committed task status transitions.
    async fn execute_from_changed_tasks(&self, ctx: &StrategyContext, changed: &[TaskId]);

    /// Aggregate prior task results relevant to this task.
    fn context_for_task(&self, store: &TeamStore, task: &Task) -> String;

    /// Cease dispatch; in-flight work keeps running until the queue drains.
    async fn stop_execution(&self, ctx: &StrategyContext) {
        ctx.queue.close_intake();
        ctx.queue.clear_parked();
    }

    /// Reopen dispatch and re-enter every paused task from its checkpoint.
    async fn resume_execution(&self, ctx: &StrategyContext) {
        ctx.queue.open_intake();
        let paused: Vec<TaskId> = ctx
            .store
            .tasks()
            .iter()
            .filter(|t| t.status == TaskStatus::Paused)
            .map(|t| t.id.clone())
            .collect();
        for task_id in paused {
            let context = match ctx.store.task(&task_id) {
                Some(task) => self.context_for_task(&ctx.store, &task),
                None => continue,
            };
            let _ = ctx.store.update_task_status(&task_id, TaskStatus::Resumed);
            dispatch(ctx, &task_id, context, true);
        }
    }
}

/// Promote a task to DOING and hand it to the queue.
///
/// If the owning agent is already DOING another task, the work item carries a
/// clone with a fresh history. Callers are responsible for only dispatching
/// tasks whose busy-agent policy allows it.
pub(crate) fn dispatch(ctx: &StrategyContext, task_id: &TaskId, context: String, resume: bool) {
    let Some(task) = ctx.store.task(task_id) else {
        tracing::warn!(task_id = %task_id, "dispatch for unknown task");
        return;
    };
    let Some(agent) = ctx.store.agent(&task.agent_id) else {
        tracing::warn!(task_id = %task_id, agent_id = %task.agent_id, "task owner not found");
        return;
    };

    let working_agent = if agent_busy(&ctx.store, &agent.id, task_id) {
        agent.clone_for_parallel()
    } else {
        agent
    };

    if ctx.store.update_task_status(task_id, TaskStatus::Doing).is_err() {
        return;
    }
    let item = if resume {
        WorkItem::resuming(task_id.clone(), working_agent, context)
    } else {
        WorkItem::new(task_id.clone(), working_agent, context)
    };
    ctx.queue.submit(item);
}

/// Whether the agent is DOING some other task right now.
pub(crate) fn agent_busy(store: &TeamStore, agent_id: &crate::agent::AgentId, except: &TaskId) -> bool {
    store.with_state(|state| {
        state.tasks.iter().any(|t| {
            &t.id != except && &t.agent_id == agent_id && t.status == TaskStatus::Doing
        })
    })
}

/// Concatenate completed task results in declaration order.
///
/// `filter` narrows the fold to a dependency set (hierarchical mode) or to
/// tasks preceding an index (sequential mode); `None` folds everything.
pub(crate) fn assemble_context(
    store: &TeamStore,
    filter: Option<&HashSet<TaskId>>,
    before_index: Option<usize>,
) -> String {
    store.with_state(|state| {
        let mut out = String::new();
        for (index, task) in state.tasks.iter().enumerate() {
            if let Some(limit) = before_index {
                if index >= limit {
                    break;
                }
            }
            if let Some(set) = filter {
                if !set.contains(&task.id) {
                    continue;
                }
            }
            if !task.status.is_completed() {
                continue;
            }
            let Some(result) = &task.result else { continue };
            let rendered = match result {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!(
                "Task: {}\nResult: {}\n",
                task.effective_description(),
                rendered
            ));
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::config::ExecutionConfig;
    use crate::error::TroupeError;
    use crate::llm::{ChatMessage, LlmClient, LlmOutput};
    use async_trait::async_trait;
    use std::collections::HashMap;

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

    #[test]
    fn test_assemble_context_orders_and_filters() {
        let store = TeamStore::new("t", ExecutionConfig::default());
        store
            .add_agents(vec![Agent::new("w", "r", "g", Arc::new(NoopLlm)).with_id("a1")])
            .unwrap();
        store
            .add_tasks(vec![
                Task::new("first", "o", "a1").with_id("t1"),
                Task::new("second", "o", "a1").with_id("t2"),
                Task::new("third", "o", "a1").with_id("t3"),
            ])
            .unwrap();
        store.start(HashMap::new()).unwrap();
        for id in ["t1", "t2"] {
            store.update_task_status(&TaskId::new(id), TaskStatus::Doing).unwrap();
        }
        store
            .complete_task(&TaskId::new("t1"), serde_json::json!("r1"), TaskStatus::Done)
            .unwrap();
        store
            .complete_task(&TaskId::new("t2"), serde_json::json!({"b": 2, "a": 1}), TaskStatus::Done)
            .unwrap();

        let all = assemble_context(&store, None, None);
        assert!(all.contains("Task: first\nResult: r1\n"));
        // Object results render as canonical JSON (sorted keys).
        assert!(all.contains("Result: {\"a\":1,\"b\":2}"));
        assert!(all.find("first").unwrap() < all.find("second").unwrap());

        let only_first: HashSet<TaskId> = [TaskId::new("t1")].into_iter().collect();
        let filtered = assemble_context(&store, Some(&only_first), None);
        assert!(filtered.contains("first"));
        assert!(!filtered.contains("second"));

        let preceding = assemble_context(&store, None, Some(1));
        assert!(preceding.contains("first"));
        assert!(!preceding.contains("second"));
    }
}
