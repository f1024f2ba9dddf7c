//! Manager-LLM scheduling.
//!
//! Next-task selection is delegated to a supervisor agent: at each decision
//! point the strategy prompts it with every task's id, description, status,
//! and result so far, and expects back a single task id (or `DONE` once all
//! tasks are terminal). Invalid picks are retried a bounded number of times
//! before the workflow fails with `MANAGER_LOOP`.

use async_trait::async_trait;

use crate::agent::Agent;
use crate::enums::TaskStatus;
use crate::error::TroupeError;
use crate::llm::ChatMessage;
use crate::store::TeamStore;
use crate::strategy::{assemble_context, dispatch, ExecutionStrategy, StrategyContext};
use crate::task::{Task, TaskId};

/// Invalid supervisor picks tolerated before the workflow is failed.
const MAX_PICK_ATTEMPTS: usize = 3;

/// What the supervisor answered at one decision point.
#[derive(Debug, PartialEq)]
enum ManagerPick {
    Task(TaskId),
    Done,
    Invalid,
}

/// Scheduler that asks a supervisor agent which task to run next.
pub struct ManagerStrategy {
    manager: Agent,
}

impl ManagerStrategy {
    pub fn new(manager: Agent) -> Self {
        Self { manager }
    }

    /// Render the decision prompt: one line per task plus the protocol.
    fn decision_prompt(&self, store: &TeamStore) -> String {
        let mut table = String::new();
        store.with_state(|state| {
            for task in &state.tasks {
                let result = task
                    .result
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "none".to_string());
                table.push_str(&format!(
                    "- id: {} | status: {} | description: {} | result: {}\n",
                    task.id,
                    serde_json::to_value(task.status)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default(),
                    task.effective_description(),
                    result,
                ));
            }
        });

        format!(
            r#"You are supervising a team workflow. These are the tasks:

{table}
Pick the single task that should run next. Only tasks with status TODO or
REVISE are eligible. Reply with exactly that task's id and nothing else.
If every task is finished, reply with exactly DONE."#,
        )
    }

    /// Interpret the supervisor's reply: exact id, DONE, or a scan for any
    /// known id mentioned in the text.
    fn parse_pick(&self, store: &TeamStore, reply: &str) -> ManagerPick {
        let trimmed = reply.trim();
        if trimmed.eq_ignore_ascii_case("done") {
            return ManagerPick::Done;
        }
        let tasks = store.tasks();
        if let Some(task) = tasks.iter().find(|t| t.id.as_str() == trimmed) {
            return ManagerPick::Task(task.id.clone());
        }
        for task in &tasks {
            if trimmed.contains(task.id.as_str()) {
                return ManagerPick::Task(task.id.clone());
            }
        }
        ManagerPick::Invalid
    }

    /// Whether a picked task may actually be dispatched.
    fn pick_is_dispatchable(&self, store: &TeamStore, task_id: &TaskId) -> bool {
        store
            .task(task_id)
            .map_or(false, |t| matches!(t.status, TaskStatus::Todo | TaskStatus::Revise))
    }

    /// One decision point: query the supervisor, validate, dispatch.
    async fn pick_and_dispatch(&self, ctx: &StrategyContext) {
        if ctx.store.with_state(|s| s.doing_count()) > 0 {
            return;
        }
        let all_terminal = ctx
            .store
            .with_state(|s| s.tasks.iter().all(|t| t.status.is_terminal()));
        if all_terminal {
            return;
        }

        let mut attempts = 0;
        while attempts < MAX_PICK_ATTEMPTS {
            attempts += 1;
            let prompt = self.decision_prompt(&ctx.store);
            let messages = vec![
                ChatMessage::system(format!(
                    "You are {}, the workflow supervisor. Role: {}. Goal: {}.",
                    self.manager.name, self.manager.role, self.manager.goal
                )),
                ChatMessage::user(prompt),
            ];

            let reply = match self.manager.llm.invoke(&messages).await {
                Ok(output) => output.content,
                Err(err) => {
                    tracing::warn!(error = %err, attempt = attempts, "supervisor call failed");
                    continue;
                }
            };

            match self.parse_pick(&ctx.store, &reply) {
                ManagerPick::Task(task_id) if self.pick_is_dispatchable(&ctx.store, &task_id) => {
                    tracing::debug!(task_id = %task_id, "supervisor picked next task");
                    let context = match ctx.store.task(&task_id) {
                        Some(task) => self.context_for_task(&ctx.store, &task),
                        None => String::new(),
                    };
                    dispatch(ctx, &task_id, context, false);
                    return;
                }
                ManagerPick::Done => {
                    // DONE is only acceptable once nothing remains to run;
                    // otherwise it counts as an invalid pick.
                    tracing::warn!(attempt = attempts, "supervisor declared DONE with open tasks");
                }
                ManagerPick::Task(task_id) => {
                    tracing::warn!(task_id = %task_id, attempt = attempts, "supervisor picked non-dispatchable task");
                }
                ManagerPick::Invalid => {
                    tracing::warn!(attempt = attempts, "supervisor reply did not name a task");
                }
            }
        }

        ctx.store
            .fail_workflow(&TroupeError::ManagerLoop { attempts });
    }
}

#[async_trait]
impl ExecutionStrategy for ManagerStrategy {
    fn concurrency(&self, _store: &TeamStore) -> usize {
        1
    }

    async fn start_execution(&self, ctx: &StrategyContext) {
        self.pick_and_dispatch(ctx).await;
    }

    async fn execute_from_changed_tasks(&self, ctx: &StrategyContext, changed: &[TaskId]) {
        // A new decision point opens whenever some task leaves DOING.
        let decision_needed = changed.iter().any(|id| {
            ctx.store.task(id).map_or(false, |t| {
                matches!(
                    t.status,
                    TaskStatus::Done
                        | TaskStatus::Validated
                        | TaskStatus::Blocked
                        | TaskStatus::Revise
                        | TaskStatus::AwaitingValidation
                )
            })
        });
        if decision_needed {
            self.pick_and_dispatch(ctx).await;
        }
    }

    fn context_for_task(&self, store: &TeamStore, _task: &Task) -> String {
        assemble_context(store, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use crate::enums::WorkflowStatus;
    use crate::llm::{LlmClient, LlmOutput};
    use crate::queue::{ExecutionQueue, Runner};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedLlm {
        replies: Vec<String>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: replies.into_iter().map(String::from).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn invoke(&self, _messages: &[ChatMessage]) -> Result<LlmOutput, TroupeError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .get(index)
                .or_else(|| self.replies.last())
                .cloned()
                .unwrap_or_default();
            Ok(LlmOutput::new(reply))
        }

        fn model(&self) -> &str {
            "mock-manager"
        }
    }

    fn noop_runner() -> Runner {
        Arc::new(|_item| Box::pin(async {}))
    }

    fn setup(manager_replies: Vec<&str>) -> (StrategyContext, ManagerStrategy) {
        let store = Arc::new(TeamStore::new("t", ExecutionConfig::default()));
        store
            .add_agents(vec![Agent::new("w", "r", "g", Arc::new(ScriptedLlm::new(vec!["{}"])))
                .with_id("a1")])
            .unwrap();
        store
            .add_tasks(vec![
                Task::new("first task", "o", "a1").with_id("t1"),
                Task::new("second task", "o", "a1").with_id("t2"),
            ])
            .unwrap();
        store.start(HashMap::new()).unwrap();

        let manager = Agent::new(
            "overseer",
            "supervisor",
            "sequence the work",
            Arc::new(ScriptedLlm::new(manager_replies)),
        )
        .with_id("mgr");
        let queue = Arc::new(ExecutionQueue::new(1, noop_runner()));
        (StrategyContext { store, queue }, ManagerStrategy::new(manager))
    }

    #[tokio::test]
    async fn test_manager_dispatches_picked_task() {
        let (ctx, strategy) = setup(vec!["t2"]);
        strategy.start_execution(&ctx).await;
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_manager_pick_embedded_in_prose() {
        let (ctx, strategy) = setup(vec!["I think t1 should go next."]);
        strategy.start_execution(&ctx).await;
        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);
    }

    #[tokio::test]
    async fn test_manager_retries_unknown_then_succeeds() {
        let (ctx, strategy) = setup(vec!["task-zz", "t1"]);
        strategy.start_execution(&ctx).await;
        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);
        assert_eq!(ctx.store.workflow_status(), WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn test_manager_loop_fails_workflow() {
        let (ctx, strategy) = setup(vec!["nonsense"]);
        strategy.start_execution(&ctx).await;
        assert_eq!(ctx.store.workflow_status(), WorkflowStatus::Errored);
        let logs = ctx.store.logs();
        assert!(logs
            .iter()
            .any(|l| l.metadata.error_code.as_deref() == Some("MANAGER_LOOP")));
    }

    #[tokio::test]
    async fn test_manager_done_with_open_tasks_is_invalid() {
        let (ctx, strategy) = setup(vec!["DONE"]);
        strategy.start_execution(&ctx).await;
        // DONE while tasks remain open exhausts the attempts and errors out.
        assert_eq!(ctx.store.workflow_status(), WorkflowStatus::Errored);
    }

    #[tokio::test]
    async fn test_manager_skips_decision_while_task_in_flight() {
        let (ctx, strategy) = setup(vec!["t1", "t2"]);
        strategy.start_execution(&ctx).await;
        assert_eq!(ctx.store.task(&TaskId::new("t1")).unwrap().status, TaskStatus::Doing);

        // A second decision point while t1 is DOING must not dispatch more.
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;
        assert_eq!(ctx.store.task(&TaskId::new("t2")).unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_manager_terminal_pick_rejected() {
        let (ctx, strategy) = setup(vec!["t1", "t1", "t1"]);
        ctx.store
            .update_task_status(&TaskId::new("t1"), TaskStatus::Doing)
            .unwrap();
        ctx.store
            .complete_task(&TaskId::new("t1"), serde_json::json!("done"), TaskStatus::Done)
            .unwrap();
        // Supervisor keeps naming the finished t1; attempts exhaust.
        strategy
            .execute_from_changed_tasks(&ctx, &[TaskId::new("t1")])
            .await;
        assert_eq!(ctx.store.workflow_status(), WorkflowStatus::Errored);
    }
}
