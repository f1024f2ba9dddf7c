//! The team store: single source of truth for all workflow state.
//!
//! Every mutation goes through an atomic mutator that commits under the state
//! lock, then notifies selector-scoped subscribers against the committed
//! snapshot. Strategies and the agent loop never hold references into the
//! store; they read cloned views and write through mutators.

pub mod snapshot;
pub mod stats;
pub mod subscription;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tokio::sync::watch;

use crate::agent::{Agent, AgentId};
use crate::config::ExecutionConfig;
use crate::enums::{AgentStatus, FeedbackStatus, TaskStatus, WorkflowStatus};
use crate::error::TroupeError;
use crate::graph::DependencyGraph;
use crate::llm::ChatMessage;
use crate::logs::{LogMetadata, WorkflowLog};
use crate::task::{interpolate_description, Task, TaskFeedback, TaskId};

pub use subscription::SubscriptionId;

/// All mutable workflow state, cloned as a snapshot for subscribers.
#[derive(Debug, Clone)]
pub struct TeamState {
    pub name: String,
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub workflow_logs: Vec<WorkflowLog>,
    pub inputs: HashMap<String, serde_json::Value>,
    pub env: HashMap<String, String>,
    pub workflow_internal_memory: HashMap<String, serde_json::Value>,
    pub workflow_status: WorkflowStatus,
    pub workflow_result: Option<serde_json::Value>,
    pub workflow_context: String,
}

impl TeamState {
    fn new(name: String) -> Self {
        Self {
            name,
            agents: Vec::new(),
            tasks: Vec::new(),
            workflow_logs: Vec::new(),
            inputs: HashMap::new(),
            env: HashMap::new(),
            workflow_internal_memory: HashMap::new(),
            workflow_status: WorkflowStatus::Initial,
            workflow_result: None,
            workflow_context: String::new(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.id == id)
    }

    /// Number of tasks currently being worked.
    pub fn doing_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Doing).count()
    }

    /// Projection of `(task id, status)` pairs, the strategies' selector.
    pub fn task_statuses(&self) -> Vec<(TaskId, TaskStatus)> {
        self.tasks.iter().map(|t| (t.id.clone(), t.status)).collect()
    }

    /// Append a log entry, clamping the timestamp so the stream stays
    /// non-decreasing even if the wall clock steps backwards.
    fn append_log(&mut self, mut log: WorkflowLog) {
        if let Some(last) = self.workflow_logs.last() {
            if log.timestamp < last.timestamp {
                log.timestamp = last.timestamp;
            }
        }
        self.workflow_logs.push(log);
    }
}

/// Reactive state container for one team.
pub struct TeamStore {
    state: RwLock<TeamState>,
    graph: RwLock<Option<DependencyGraph>>,
    subscriptions: subscription::SubscriptionRegistry,
    config: ExecutionConfig,

    // Re-entrancy guards for the notification drain loop: a reaction that
    // mutates the store enqueues another pass instead of recursing.
    notifying: AtomicBool,
    notify_pending: AtomicBool,

    status_tx: watch::Sender<WorkflowStatus>,
}

impl TeamStore {
    pub fn new(name: impl Into<String>, config: ExecutionConfig) -> Self {
        let (status_tx, _) = watch::channel(WorkflowStatus::Initial);
        Self {
            state: RwLock::new(TeamState::new(name.into())),
            graph: RwLock::new(None),
            subscriptions: subscription::SubscriptionRegistry::default(),
            config,
            notifying: AtomicBool::new(false),
            notify_pending: AtomicBool::new(false),
            status_tx,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Watch the workflow status; used to await quiescence.
    pub fn status_watch(&self) -> watch::Receiver<WorkflowStatus> {
        self.status_tx.subscribe()
    }

    // =========================================================================
    // Commit & notification machinery
    // =========================================================================

    /// Run a mutation under the state lock, then notify subscribers against
    /// the committed snapshot.
    fn commit<R>(&self, mutate: impl FnOnce(&mut TeamState) -> R) -> R {
        let (result, status) = {
            let mut state = self.state.write().expect("team state lock poisoned");
            let result = mutate(&mut state);
            (result, state.workflow_status)
        };
        self.status_tx.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
        self.notify();
        result
    }

    fn notify(&self) {
        self.notify_pending.store(true, Ordering::SeqCst);
        if self.notifying.swap(true, Ordering::SeqCst) {
            // A drain loop is already running on another frame; it will pick
            // up the pending flag.
            return;
        }
        loop {
            while self.notify_pending.swap(false, Ordering::SeqCst) {
                let snapshot = self.state.read().expect("team state lock poisoned").clone();
                for entry in self.subscriptions.snapshot() {
                    entry.run(&snapshot);
                }
            }
            self.notifying.store(false, Ordering::SeqCst);
            if !self.notify_pending.load(Ordering::SeqCst) {
                break;
            }
            if self.notifying.swap(true, Ordering::SeqCst) {
                break;
            }
        }
    }

    /// Register a selector/reaction pair. See [`subscription`].
    pub fn subscribe<P, S, R>(&self, selector: S, reaction: R) -> SubscriptionId
    where
        P: PartialEq + Clone + Send + 'static,
        S: Fn(&TeamState) -> P + Send + Sync + 'static,
        R: Fn(Option<&P>, &P, &TeamState) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(selector, reaction)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    // =========================================================================
    // Setup mutators (before start)
    // =========================================================================

    pub fn add_agents(&self, agents: Vec<Agent>) -> Result<(), TroupeError> {
        self.commit(|state| {
            if state.workflow_status != WorkflowStatus::Initial {
                return Err(TroupeError::invalid_state(
                    "agents can only be added before the workflow starts",
                ));
            }
            state.agents.extend(agents);
            Ok(())
        })
    }

    pub fn add_tasks(&self, tasks: Vec<Task>) -> Result<(), TroupeError> {
        self.commit(|state| {
            if state.workflow_status != WorkflowStatus::Initial {
                return Err(TroupeError::invalid_state(
                    "tasks can only be added before the workflow starts",
                ));
            }
            state.tasks.extend(tasks);
            Ok(())
        })
    }

    pub fn set_env(&self, env: HashMap<String, String>) {
        self.commit(|state| state.env = env);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reset derived state, validate the dependency graph, and mark RUNNING.
    ///
    /// A cycle or unresolved dependency is fatal: the workflow transitions to
    /// ERRORED and the error is returned. Calling while RUNNING fails with
    /// `ALREADY_RUNNING` and mutates nothing.
    pub fn start(&self, inputs: HashMap<String, serde_json::Value>) -> Result<(), TroupeError> {
        // Validate before mutating so a failed start leaves no partial reset.
        let graph_result = {
            let state = self.state.read().expect("team state lock poisoned");
            if state.workflow_status == WorkflowStatus::Running {
                return Err(TroupeError::AlreadyRunning);
            }
            DependencyGraph::build(&state.tasks)
        };

        let graph = match graph_result {
            Ok(graph) => graph,
            Err(err) => {
                let code = err.code().to_string();
                let message = err.to_string();
                self.commit(|state| {
                    state.workflow_status = WorkflowStatus::Errored;
                    state.append_log(
                        WorkflowLog::workflow(WorkflowStatus::Errored, format!("workflow errored: {message}"))
                            .with_metadata(
                                LogMetadata {
                                    workflow_status: Some(WorkflowStatus::Errored),
                                    ..Default::default()
                                }
                                .with_error(message.clone())
                                .with_error_code(code.clone()),
                            ),
                    );
                });
                return Err(err);
            }
        };

        *self.graph.write().expect("graph lock poisoned") = Some(graph);

        self.commit(|state| {
            state.inputs = inputs;
            state.workflow_logs.clear();
            state.workflow_result = None;
            state.workflow_context.clear();

            for task in &mut state.tasks {
                task.status = TaskStatus::Todo;
                task.result = None;
                task.feedback_history.clear();
                task.paused_history = None;
                task.paused_iterations = 0;
                task.blocked_reason = None;

                let (interpolated, missing) =
                    interpolate_description(&task.description, &state.inputs);
                for placeholder in &missing {
                    tracing::warn!(
                        task_id = %task.id,
                        placeholder = %placeholder,
                        "input placeholder not provided; left literal"
                    );
                }
                task.interpolated_description = Some(interpolated);
            }
            for agent in &mut state.agents {
                agent.status = AgentStatus::Initial;
                agent.interactions_history.clear();
                agent.current_iterations = 0;
            }

            state.workflow_status = WorkflowStatus::Running;
            state.append_log(WorkflowLog::workflow(WorkflowStatus::Running, "workflow started"));
        });
        Ok(())
    }

    /// Transition RUNNING -> PAUSED. In-flight loops observe this at their
    /// next iteration boundary; nothing is cancelled mid-call.
    pub fn pause(&self) -> Result<(), TroupeError> {
        self.commit(|state| {
            if state.workflow_status != WorkflowStatus::Running {
                return Err(TroupeError::invalid_state(format!(
                    "cannot pause from {:?}",
                    state.workflow_status
                )));
            }
            state.workflow_status = WorkflowStatus::Paused;
            state.append_log(WorkflowLog::workflow(WorkflowStatus::Paused, "workflow paused"));
            Ok(())
        })
    }

    /// Transition PAUSED -> RUNNING. Paused tasks are re-dispatched by the
    /// strategy's `resume_execution`.
    pub fn resume(&self) -> Result<(), TroupeError> {
        self.commit(|state| {
            if state.workflow_status != WorkflowStatus::Paused {
                return Err(TroupeError::invalid_state(format!(
                    "cannot resume from {:?}",
                    state.workflow_status
                )));
            }
            state.workflow_status = WorkflowStatus::Running;
            state.append_log(WorkflowLog::workflow(WorkflowStatus::Running, "workflow resumed"));
            Ok(())
        })
    }

    /// Begin a cooperative stop: strategies cease dispatch, in-flight loops
    /// abort at their next boundary.
    pub fn request_stop(&self) -> Result<(), TroupeError> {
        self.commit(|state| {
            if state.workflow_status.is_terminal() {
                return Err(TroupeError::invalid_state(format!(
                    "cannot stop from {:?}",
                    state.workflow_status
                )));
            }
            state.workflow_status = WorkflowStatus::Stopping;
            state.append_log(WorkflowLog::workflow(WorkflowStatus::Stopping, "workflow stopping"));
            Ok(())
        })
    }

    /// Final step of `stop()` after the queue has drained: abort whatever is
    /// left non-terminal and land on STOPPED.
    pub fn finalize_stop(&self) {
        self.commit(|state| {
            if state.workflow_status != WorkflowStatus::Stopping {
                return;
            }
            for i in 0..state.tasks.len() {
                if !state.tasks[i].status.is_terminal() {
                    let previous = state.tasks[i].status;
                    state.tasks[i].status = TaskStatus::Aborted;
                    let log = WorkflowLog::task_update(
                        &state.tasks[i],
                        previous,
                        format!("task {} aborted by stop", state.tasks[i].id),
                    );
                    state.append_log(log);
                }
            }
            state.workflow_status = WorkflowStatus::Stopped;
            state.append_log(WorkflowLog::workflow(WorkflowStatus::Stopped, "workflow stopped"));
        });
    }

    /// Mark the workflow ERRORED with a fatal error.
    pub fn fail_workflow(&self, error: &TroupeError) {
        let code = error.code().to_string();
        let message = error.to_string();
        self.commit(|state| {
            state.workflow_status = WorkflowStatus::Errored;
            state.append_log(
                WorkflowLog::workflow(WorkflowStatus::Errored, format!("workflow errored: {message}"))
                    .with_metadata(
                        LogMetadata {
                            workflow_status: Some(WorkflowStatus::Errored),
                            ..Default::default()
                        }
                        .with_error(message.clone())
                        .with_error_code(code.clone()),
                    ),
            );
        });
    }

    // =========================================================================
    // Task mutators
    // =========================================================================

    /// Atomic single-task status update; emits one log and re-derives the
    /// aggregate workflow status.
    pub fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), TroupeError> {
        self.commit(|state| {
            let task = state.task_mut(id).ok_or_else(|| TroupeError::UnknownTask(id.clone()))?;
            let previous = task.status;
            task.status = status;
            if status != TaskStatus::Blocked {
                task.blocked_reason = None;
            }
            let log = WorkflowLog::task_update(
                task,
                previous,
                format!("task {id}: {previous:?} -> {status:?}"),
            );
            tracing::debug!(task_id = %id, ?previous, ?status, "task status updated");
            state.append_log(log);
            Self::derive_workflow_status(state);
            Ok(())
        })
    }

    /// One atomic commit covering several tasks; one log per transition.
    pub fn update_status_of_multiple_tasks(
        &self,
        ids: &[TaskId],
        status: TaskStatus,
    ) -> Result<(), TroupeError> {
        self.commit(|state| {
            for id in ids {
                if state.task(id).is_none() {
                    return Err(TroupeError::UnknownTask(id.clone()));
                }
            }
            for id in ids {
                let task = state.task_mut(id).expect("validated above");
                let previous = task.status;
                task.status = status;
                if status != TaskStatus::Blocked {
                    task.blocked_reason = None;
                }
                let log = WorkflowLog::task_update(
                    task,
                    previous,
                    format!("task {id}: {previous:?} -> {status:?}"),
                );
                state.append_log(log);
            }
            Self::derive_workflow_status(state);
            Ok(())
        })
    }

    /// Set a task's result and completion status in one commit, so the DONE
    /// (or AWAITING_VALIDATION) log already carries the result.
    pub fn complete_task(
        &self,
        id: &TaskId,
        result: serde_json::Value,
        status: TaskStatus,
    ) -> Result<(), TroupeError> {
        self.commit(|state| {
            let task = state.task_mut(id).ok_or_else(|| TroupeError::UnknownTask(id.clone()))?;
            // A revise ripple or stop may have reset this task while its loop
            // was still in flight; a stale completion must not override that.
            if !matches!(
                task.status,
                TaskStatus::Doing | TaskStatus::Revise | TaskStatus::Resumed | TaskStatus::Paused
            ) {
                tracing::debug!(task_id = %id, status = ?task.status, "ignoring stale completion");
                return Ok(());
            }
            let previous = task.status;
            task.result = Some(result);
            task.status = status;
            task.paused_history = None;
            task.paused_iterations = 0;
            let log = WorkflowLog::task_update(
                task,
                previous,
                format!("task {id}: {previous:?} -> {status:?}"),
            );
            state.append_log(log);
            Self::derive_workflow_status(state);
            Ok(())
        })
    }

    /// Block a task with a reason (iteration exhaustion, failed work item).
    pub fn block_task(&self, id: &TaskId, reason: impl Into<String>) -> Result<(), TroupeError> {
        let reason = reason.into();
        self.commit(|state| {
            let task = state.task_mut(id).ok_or_else(|| TroupeError::UnknownTask(id.clone()))?;
            let previous = task.status;
            task.status = TaskStatus::Blocked;
            task.blocked_reason = Some(reason.clone());
            let log = WorkflowLog::task_update(
                task,
                previous,
                format!("task {id} blocked: {reason}"),
            );
            state.append_log(log);
            Self::derive_workflow_status(state);
            Ok(())
        })
    }

    /// Append PENDING feedback and force the task into REVISE.
    ///
    /// Valid while the workflow can still dispatch work: RUNNING, PAUSED,
    /// BLOCKED, or FINISHED (feedback on a finished workflow revives it).
    /// Rejected once the workflow is stopping, stopped, or errored.
    pub fn provide_feedback(
        &self,
        id: &TaskId,
        content: impl Into<String>,
    ) -> Result<(), TroupeError> {
        let content = content.into();
        self.commit(|state| {
            if matches!(
                state.workflow_status,
                WorkflowStatus::Stopping | WorkflowStatus::Stopped | WorkflowStatus::Errored
            ) {
                return Err(TroupeError::invalid_state(format!(
                    "cannot provide feedback while {:?}",
                    state.workflow_status
                )));
            }
            let task = state.task_mut(id).ok_or_else(|| TroupeError::UnknownTask(id.clone()))?;
            task.feedback_history.push(TaskFeedback::pending(content));
            let previous = task.status;
            task.status = TaskStatus::Revise;
            let log = WorkflowLog::task_update(
                task,
                previous,
                format!("task {id}: feedback received, {previous:?} -> Revise"),
            );
            state.append_log(log);
            Self::derive_workflow_status(state);
            Ok(())
        })
    }

    /// Human approval of an AWAITING_VALIDATION task. Triggers the same
    /// completion ripple as DONE.
    pub fn validate_task(&self, id: &TaskId) -> Result<(), TroupeError> {
        self.commit(|state| {
            let task = state.task_mut(id).ok_or_else(|| TroupeError::UnknownTask(id.clone()))?;
            if task.status != TaskStatus::AwaitingValidation {
                return Err(TroupeError::NotAwaitingValidation(id.clone()));
            }
            task.status = TaskStatus::Validated;
            let log = WorkflowLog::task_update(
                task,
                TaskStatus::AwaitingValidation,
                format!("task {id} validated"),
            );
            state.append_log(log);
            Self::derive_workflow_status(state);
            Ok(())
        })
    }

    /// Flip a task's pending feedback entries to PROCESSED.
    pub fn mark_feedback_processed(&self, id: &TaskId) -> Result<(), TroupeError> {
        self.commit(|state| {
            let task = state.task_mut(id).ok_or_else(|| TroupeError::UnknownTask(id.clone()))?;
            for feedback in &mut task.feedback_history {
                if feedback.status == FeedbackStatus::Pending {
                    feedback.status = FeedbackStatus::Processed;
                }
            }
            Ok(())
        })
    }

    /// Checkpoint a pausing loop's interaction history on its task.
    pub fn checkpoint_task(
        &self,
        id: &TaskId,
        history: Vec<ChatMessage>,
        iterations: usize,
    ) -> Result<(), TroupeError> {
        self.commit(|state| {
            let task = state.task_mut(id).ok_or_else(|| TroupeError::UnknownTask(id.clone()))?;
            task.paused_history = Some(history);
            task.paused_iterations = iterations;
            Ok(())
        })
    }

    // =========================================================================
    // Agent status & logs
    // =========================================================================

    /// Record an agent status transition: updates the stored agent record and
    /// appends an AgentStatusUpdate log.
    pub fn record_agent_status(
        &self,
        agent: &Agent,
        task: Option<&Task>,
        status: AgentStatus,
        metadata: LogMetadata,
        description: impl Into<String>,
    ) {
        let description = description.into();
        self.commit(|state| {
            if let Some(stored) = state.agents.iter_mut().find(|a| a.id == agent.id) {
                stored.status = status;
            }
            let mut snapshot_agent = agent.clone();
            snapshot_agent.status = status;
            let log = WorkflowLog::agent_update(&snapshot_agent, task, metadata, description);
            state.append_log(log);
        });
    }

    // =========================================================================
    // Memory scratchpad
    // =========================================================================

    pub fn memory_set(&self, key: impl Into<String>, value: serde_json::Value) {
        let key = key.into();
        self.commit(|state| {
            state.workflow_internal_memory.insert(key, value);
        });
    }

    pub fn memory_get(&self, key: &str) -> Option<serde_json::Value> {
        self.state
            .read()
            .expect("team state lock poisoned")
            .workflow_internal_memory
            .get(key)
            .cloned()
    }

    // =========================================================================
    // Read accessors (cloned views)
    // =========================================================================

    pub fn workflow_status(&self) -> WorkflowStatus {
        self.state.read().expect("team state lock poisoned").workflow_status
    }

    pub fn workflow_result(&self) -> Option<serde_json::Value> {
        self.state.read().expect("team state lock poisoned").workflow_result.clone()
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.state.read().expect("team state lock poisoned").task(id).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().expect("team state lock poisoned").tasks.clone()
    }

    pub fn agent(&self, id: &AgentId) -> Option<Agent> {
        self.state.read().expect("team state lock poisoned").agent(id).cloned()
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.state.read().expect("team state lock poisoned").agents.clone()
    }

    pub fn logs(&self) -> Vec<WorkflowLog> {
        self.state.read().expect("team state lock poisoned").workflow_logs.clone()
    }

    pub fn inputs(&self) -> HashMap<String, serde_json::Value> {
        self.state.read().expect("team state lock poisoned").inputs.clone()
    }

    pub fn env(&self) -> HashMap<String, String> {
        self.state.read().expect("team state lock poisoned").env.clone()
    }

    /// The validated dependency graph; present after a successful `start`.
    pub fn graph(&self) -> Option<DependencyGraph> {
        self.graph.read().expect("graph lock poisoned").clone()
    }

    /// Read-only access to the full state under the lock.
    pub fn with_state<R>(&self, read: impl FnOnce(&TeamState) -> R) -> R {
        read(&self.state.read().expect("team state lock poisoned"))
    }

    /// Redacted, time-independent snapshot. See [`snapshot`].
    pub fn cleaned_state(&self) -> serde_json::Value {
        self.with_state(|state| snapshot::cleaned_state(state, &self.config.log_level))
    }

    /// Fold the log stream into aggregate statistics. See [`stats`].
    pub fn workflow_stats(&self) -> stats::WorkflowStats {
        self.with_state(|state| stats::compute_stats(&state.workflow_logs, &self.config.model_prices))
    }

    // =========================================================================
    // Aggregate derivation
    // =========================================================================

    /// Re-derive the aggregate workflow status after a task transition.
    ///
    /// Only moves between RUNNING, BLOCKED, and FINISHED; explicit lifecycle
    /// states (PAUSED, STOPPING, STOPPED, ERRORED) are never overridden.
    fn derive_workflow_status(state: &mut TeamState) {
        if !matches!(
            state.workflow_status,
            WorkflowStatus::Running | WorkflowStatus::Blocked | WorkflowStatus::Finished
        ) {
            return;
        }

        let all_terminal = state.tasks.iter().all(|t| t.status.is_terminal());
        if all_terminal && !state.tasks.is_empty() {
            if state.workflow_status == WorkflowStatus::Finished {
                return;
            }
            state.workflow_result = state
                .tasks
                .iter()
                .filter(|t| t.is_deliverable && t.status.is_completed())
                .last()
                .or_else(|| state.tasks.iter().filter(|t| t.status.is_completed()).last())
                .and_then(|t| t.result.clone());
            state.workflow_status = WorkflowStatus::Finished;
            state.append_log(WorkflowLog::workflow(WorkflowStatus::Finished, "workflow finished"));
            return;
        }

        let in_flight = state.tasks.iter().any(|t| {
            matches!(t.status, TaskStatus::Doing | TaskStatus::Revise | TaskStatus::Resumed)
        });
        if in_flight {
            // Feedback on a blocked or finished workflow revives dispatch.
            if state.workflow_status != WorkflowStatus::Running {
                state.workflow_status = WorkflowStatus::Running;
                state.append_log(WorkflowLog::workflow(WorkflowStatus::Running, "workflow resumed dispatch"));
            }
            return;
        }

        let runnable = Self::has_runnable_task(state);
        let stuck = state.tasks.iter().any(|t| {
            matches!(t.status, TaskStatus::Blocked | TaskStatus::AwaitingValidation)
        });
        if !runnable && stuck && state.workflow_status == WorkflowStatus::Running {
            state.workflow_status = WorkflowStatus::Blocked;
            state.append_log(WorkflowLog::workflow(
                WorkflowStatus::Blocked,
                "workflow blocked: no runnable task",
            ));
        } else if runnable && state.workflow_status == WorkflowStatus::Blocked {
            state.workflow_status = WorkflowStatus::Running;
            state.append_log(WorkflowLog::workflow(WorkflowStatus::Running, "workflow resumed dispatch"));
        }
    }

    /// Whether any TODO task could still be dispatched.
    ///
    /// Hierarchical: a TODO whose dependencies are all completed. Sequential:
    /// the first task in declaration order that is not completed must itself
    /// be TODO.
    fn has_runnable_task(state: &TeamState) -> bool {
        let hierarchical = state.tasks.iter().any(|t| !t.depends_on.is_empty());
        if hierarchical {
            state.tasks.iter().any(|t| {
                t.status == TaskStatus::Todo
                    && t.depends_on.iter().all(|dep| {
                        state.task(dep).map_or(false, |d| d.status.is_completed())
                    })
            })
        } else {
            state
                .tasks
                .iter()
                .find(|t| !t.status.is_completed())
                .map_or(false, |t| t.status == TaskStatus::Todo)
        }
    }
}
