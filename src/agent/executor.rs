//! The bounded ReAct iteration loop.
//!
//! Turns one (agent, task, context) triple into a sequence of think → act →
//! observe ticks. Each tick calls the model once (with transient-failure
//! retries), classifies the output, and either finishes the task, invokes a
//! tool, or appends to the running history. The loop yields cooperatively on
//! pause and stop at iteration boundaries; an in-flight model call is never
//! cancelled.

use std::sync::Arc;

use crate::agent::parser::{parse_llm_output, AgentOutput};
use crate::agent::prompts::LoopPrompts;
use crate::agent::Agent;
use crate::enums::{AgentStatus, TaskStatus, WorkflowStatus};
use crate::error::TroupeError;
use crate::llm::{ChatMessage, LlmOutput};
use crate::logs::LogMetadata;
use crate::store::TeamStore;
use crate::task::{Task, TaskId};
use crate::tools::stringify_tool_result;

/// How a work item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Final answer produced; task is Done.
    Completed,
    /// Final answer produced; task awaits human validation.
    AwaitingValidation,
    /// Workflow paused; history checkpointed, task is Paused.
    Paused,
    /// Workflow stopping or task gone; task is Aborted.
    Aborted,
    /// Iteration budget exhausted; task is Blocked.
    MaxIterations,
}

/// Drives agent iteration loops against a team store.
pub struct AgentExecutor {
    store: Arc<TeamStore>,
}

impl AgentExecutor {
    pub fn new(store: Arc<TeamStore>) -> Self {
        Self { store }
    }

    /// Run a task from the beginning.
    pub async fn work_on_task(&self, agent: Agent, task_id: &TaskId, context: &str) -> TaskOutcome {
        self.run(agent, task_id, context, false).await
    }

    /// Re-enter a paused task from its checkpointed history.
    pub async fn work_on_task_resume(
        &self,
        agent: Agent,
        task_id: &TaskId,
        context: &str,
    ) -> TaskOutcome {
        self.run(agent, task_id, context, true).await
    }

    async fn run(
        &self,
        mut agent: Agent,
        task_id: &TaskId,
        context: &str,
        resume: bool,
    ) -> TaskOutcome {
        let Some(task) = self.store.task(task_id) else {
            tracing::warn!(task_id = %task_id, "work item for unknown task; dropping");
            return TaskOutcome::Aborted;
        };

        let default_budget = self.store.config().default_max_iterations;
        let max_iterations = agent.effective_max_iterations(default_budget);
        let force_final_after = agent.effective_force_final_answer_after(default_budget);

        if resume && task.paused_history.is_some() {
            agent.interactions_history = task.paused_history.clone().unwrap_or_default();
            agent.current_iterations = task.paused_iterations;
            self.emit(&agent, Some(&task), AgentStatus::Resumed, LogMetadata::default(),
                format!("agent {} resumed task {task_id}", agent.name));
        } else {
            agent.interactions_history = self.initial_history(&agent, &task, context);
            agent.current_iterations = 0;
            if task.has_pending_feedback() {
                let _ = self.store.mark_feedback_processed(task_id);
            }
        }

        loop {
            // Cooperative pause/stop check at the iteration boundary.
            match self.store.workflow_status() {
                WorkflowStatus::Paused => return self.yield_paused(&agent, task_id, &task),
                WorkflowStatus::Stopping | WorkflowStatus::Stopped => {
                    return self.abort(&agent, task_id, &task)
                }
                _ => {}
            }

            if agent.current_iterations >= max_iterations {
                break;
            }

            let iteration = agent.current_iterations;
            self.emit(&agent, Some(&task), AgentStatus::IterationStart,
                LogMetadata::default().with_iteration(iteration),
                format!("iteration {} of {} for task {task_id}", iteration + 1, max_iterations));

            if iteration == force_final_after {
                agent
                    .interactions_history
                    .push(ChatMessage::user(LoopPrompts::force_final_answer()));
            }

            let output = match self.think(&mut agent, &task).await {
                Some(output) => output,
                None => {
                    // THINKING_ERROR already emitted; the failed call still
                    // consumes the iteration budget.
                    agent.current_iterations += 1;
                    self.emit(&agent, Some(&task), AgentStatus::IterationEnd,
                        LogMetadata::default().with_iteration(iteration),
                        format!("iteration {} ended (thinking error)", iteration + 1));
                    continue;
                }
            };

            agent.interactions_history.push(ChatMessage::assistant(&output.content));

            match parse_llm_output(&output.content) {
                AgentOutput::FinalAnswer(answer) => {
                    self.emit(&agent, Some(&task), AgentStatus::FinalAnswer,
                        LogMetadata::default().with_iteration(iteration),
                        format!("final answer for task {task_id}"));
                    return self.finish(task_id, &task, answer);
                }
                AgentOutput::ToolAction { tool, input } => {
                    self.use_tool(&mut agent, &task, &tool, input).await;
                }
                AgentOutput::SelfQuestion(question) => {
                    self.emit(&agent, Some(&task), AgentStatus::SelfQuestion,
                        LogMetadata::default().with_iteration(iteration),
                        format!("self-question on task {task_id}"));
                    agent.interactions_history.push(ChatMessage::user(question));
                }
                AgentOutput::Observation(observation) => {
                    self.emit(&agent, Some(&task), AgentStatus::Observation,
                        LogMetadata::default().with_iteration(iteration),
                        observation.chars().take(120).collect::<String>());
                }
                AgentOutput::Unparseable => {
                    self.emit(&agent, Some(&task), AgentStatus::IssuesParsingLlmOutput,
                        LogMetadata::default().with_iteration(iteration).with_parse_failure(),
                        format!("unparseable output on task {task_id}"));
                    agent
                        .interactions_history
                        .push(ChatMessage::user(LoopPrompts::corrective()));
                }
            }

            agent.current_iterations += 1;
            self.emit(&agent, Some(&task), AgentStatus::IterationEnd,
                LogMetadata::default().with_iteration(iteration),
                format!("iteration {} ended", iteration + 1));
        }

        // Budget exhausted without a final answer.
        let error = TroupeError::MaxIterations {
            task_id: task_id.clone(),
            max_iterations,
        };
        self.emit(&agent, Some(&task), AgentStatus::MaxIterationsError,
            LogMetadata::default()
                .with_error(error.to_string())
                .with_error_code(error.code()),
            format!("task {task_id} exhausted its iteration budget"));
        let _ = self.store.block_task(task_id, error.to_string());
        TaskOutcome::MaxIterations
    }

    /// Build the first history for a fresh run: system prompt, then either the
    /// plain task framing or the feedback preamble for a revision.
    fn initial_history(&self, agent: &Agent, task: &Task, context: &str) -> Vec<ChatMessage> {
        let mut history = vec![ChatMessage::system(LoopPrompts::system(agent))];
        let task_prompt =
            LoopPrompts::task(task.effective_description(), &task.expected_output, context);

        if task.has_pending_feedback() {
            let pending: Vec<_> = task
                .feedback_history
                .iter()
                .filter(|f| f.status == crate::enums::FeedbackStatus::Pending)
                .collect();
            let preamble = LoopPrompts::feedback(&pending, task.result.as_ref());
            history.push(ChatMessage::user(format!("{preamble}\n{task_prompt}")));
        } else {
            history.push(ChatMessage::user(task_prompt));
        }
        history
    }

    /// One model call with transient-failure retries. Returns `None` after the
    /// retry budget is spent (THINKING_ERROR has been emitted).
    async fn think(&self, agent: &mut Agent, task: &Task) -> Option<LlmOutput> {
        self.emit(agent, Some(task), AgentStatus::Thinking, LogMetadata::default(),
            format!("agent {} thinking", agent.name));

        let policy = self.store.config().retry_policy.clone();
        let mut attempts = 0;
        loop {
            match agent.llm.invoke(&agent.interactions_history).await {
                Ok(output) => {
                    let mut metadata = LogMetadata::default();
                    if let Some(usage) = output.usage {
                        metadata = metadata.with_usage(usage, agent.llm.model());
                    } else {
                        metadata.model = Some(agent.llm.model().to_string());
                    }
                    self.emit(agent, Some(task), AgentStatus::ThinkingEnd, metadata,
                        format!("agent {} finished thinking", agent.name));
                    return Some(output);
                }
                Err(err) if err.is_recoverable() && policy.should_retry(attempts) => {
                    let delay = policy.delay_for_attempt(attempts);
                    tracing::debug!(error = %err, attempt = attempts, ?delay, "transient llm failure; retrying");
                    tokio::time::sleep(delay).await;
                    attempts += 1;
                }
                Err(err) => {
                    self.emit(agent, Some(task), AgentStatus::ThinkingError,
                        LogMetadata::default()
                            .with_error(err.to_string())
                            .with_error_code(err.code()),
                        format!("llm call failed for agent {}", agent.name));
                    return None;
                }
            }
        }
    }

    /// Dispatch a tool action: locate by exact name, invoke, and append the
    /// stringified result (or error text) as an observation turn.
    async fn use_tool(&self, agent: &mut Agent, task: &Task, tool_name: &str, input: serde_json::Value) {
        self.emit(agent, Some(task), AgentStatus::ExecutingAction, LogMetadata::default(),
            format!("agent {} invoking tool {tool_name}", agent.name));

        let Some(tool) = agent.find_tool(tool_name).cloned() else {
            let error = TroupeError::tool(tool_name, "unknown tool");
            self.emit(agent, Some(task), AgentStatus::UsingToolError,
                LogMetadata::default()
                    .with_error(error.to_string())
                    .with_error_code(error.code()),
                format!("unknown tool {tool_name}"));
            agent.interactions_history.push(ChatMessage::user(format!(
                "Observation: tool '{tool_name}' does not exist. Available tools: {}.",
                agent
                    .tools
                    .iter()
                    .map(|t| t.definition().name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
            return;
        };

        self.emit(agent, Some(task), AgentStatus::UsingTool, LogMetadata::default(),
            format!("tool {tool_name} running"));

        match tool.invoke(input).await {
            Ok(result) => {
                let rendered = stringify_tool_result(&result);
                self.emit(agent, Some(task), AgentStatus::UsingToolEnd, LogMetadata::default(),
                    format!("tool {tool_name} finished"));
                agent
                    .interactions_history
                    .push(ChatMessage::user(format!("Observation: {rendered}")));
            }
            Err(err) => {
                self.emit(agent, Some(task), AgentStatus::UsingToolError,
                    LogMetadata::default()
                        .with_error(err.to_string())
                        .with_error_code(err.code()),
                    format!("tool {tool_name} failed"));
                agent
                    .interactions_history
                    .push(ChatMessage::user(format!("Observation: tool '{tool_name}' failed: {err}")));
            }
        }
    }

    /// Final-answer handling: record the result and land on Done or
    /// AwaitingValidation per the task's validation flag.
    fn finish(&self, task_id: &TaskId, task: &Task, answer: serde_json::Value) -> TaskOutcome {
        let status = if task.external_validation_required {
            TaskStatus::AwaitingValidation
        } else {
            TaskStatus::Done
        };
        if let Err(err) = self.store.complete_task(task_id, answer, status) {
            tracing::warn!(task_id = %task_id, error = %err, "failed to record task completion");
            return TaskOutcome::Aborted;
        }
        match status {
            TaskStatus::AwaitingValidation => TaskOutcome::AwaitingValidation,
            _ => TaskOutcome::Completed,
        }
    }

    /// Pause handling: checkpoint the history, mark the task Paused.
    fn yield_paused(&self, agent: &Agent, task_id: &TaskId, task: &Task) -> TaskOutcome {
        let _ = self.store.checkpoint_task(
            task_id,
            agent.interactions_history.clone(),
            agent.current_iterations,
        );
        let _ = self.store.update_task_status(task_id, TaskStatus::Paused);
        self.emit(agent, Some(task), AgentStatus::Paused, LogMetadata::default(),
            format!("task {task_id} paused at iteration {}", agent.current_iterations));
        TaskOutcome::Paused
    }

    /// Stop handling: the task is aborted at the boundary.
    fn abort(&self, agent: &Agent, task_id: &TaskId, task: &Task) -> TaskOutcome {
        let _ = self.store.update_task_status(task_id, TaskStatus::Aborted);
        self.emit(agent, Some(task), AgentStatus::TaskAborted, LogMetadata::default(),
            format!("task {task_id} aborted"));
        TaskOutcome::Aborted
    }

    fn emit(
        &self,
        agent: &Agent,
        task: Option<&Task>,
        status: AgentStatus,
        metadata: LogMetadata,
        description: impl Into<String>,
    ) {
        self.store.record_agent_status(agent, task, status, metadata, description);
    }
}
