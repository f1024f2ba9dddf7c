//! Error types for the orchestration core.
//!
//! One crate-wide error enum with stable string codes. Codes are surfaced in
//! logs and snapshots, so they must not change once published.

use thiserror::Error;

use crate::task::TaskId;

/// Errors produced by the team store, strategies, and the agent loop.
#[derive(Debug, Error)]
pub enum TroupeError {
    /// A mutation was attempted in a workflow state that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// `start` was called while the workflow is already running.
    #[error("workflow already running")]
    AlreadyRunning,

    /// The task dependency graph contains a cycle.
    #[error("cycle in task dependencies: {0:?}")]
    CycleInDependencies(Vec<TaskId>),

    /// A `depends_on` entry references a task id that does not exist.
    #[error("unknown dependency {dependency:?} on task {task_id:?}")]
    UnknownDependency { task_id: TaskId, dependency: TaskId },

    /// A store accessor was given a task id that does not exist.
    #[error("unknown task: {0:?}")]
    UnknownTask(TaskId),

    /// The manager agent kept returning invalid task picks.
    #[error("manager failed to pick a valid task after {attempts} attempts")]
    ManagerLoop { attempts: usize },

    /// Transport-level LLM failure (after retries, when surfaced).
    #[error("llm error: {message}")]
    Llm {
        message: String,
        /// Retryable per the provider's classification (rate limit, transient
        /// network), as opposed to fatal (auth, invalid request).
        retryable: bool,
    },

    /// The LLM output could not be parsed into any known shape.
    #[error("unparseable llm output")]
    LlmParse,

    /// A tool invocation failed. Non-fatal to the iteration loop.
    #[error("tool '{tool}' failed: {message}")]
    ToolInvocation { tool: String, message: String },

    /// The iteration budget ran out before a final answer.
    #[error("task {task_id:?} exhausted {max_iterations} iterations")]
    MaxIterations { task_id: TaskId, max_iterations: usize },

    /// A precondition on `validate_task` was not met.
    #[error("task {0:?} is not awaiting validation")]
    NotAwaitingValidation(TaskId),
}

impl TroupeError {
    /// Stable string code for this error, as surfaced in logs.
    pub fn code(&self) -> &'static str {
        match self {
            TroupeError::InvalidState(_) => "INVALID_STATE",
            TroupeError::AlreadyRunning => "ALREADY_RUNNING",
            TroupeError::CycleInDependencies(_) => "CYCLE_IN_DEPENDENCIES",
            TroupeError::UnknownDependency { .. } => "UNKNOWN_DEPENDENCY",
            TroupeError::UnknownTask(_) => "UNKNOWN_TASK",
            TroupeError::ManagerLoop { .. } => "MANAGER_LOOP",
            TroupeError::Llm { .. } => "ERROR_LLM",
            TroupeError::LlmParse => "ERROR_LLM_PARSE",
            TroupeError::ToolInvocation { .. } => "ERROR_TOOL_INVOCATION",
            TroupeError::MaxIterations { .. } => "ERROR_MAX_ITERATIONS",
            TroupeError::NotAwaitingValidation(_) => "NOT_AWAITING_VALIDATION",
        }
    }

    /// Create a retryable (transient) LLM error.
    pub fn llm_transient(message: impl Into<String>) -> Self {
        Self::Llm { message: message.into(), retryable: true }
    }

    /// Create a fatal LLM error (auth, invalid request).
    pub fn llm_fatal(message: impl Into<String>) -> Self {
        Self::Llm { message: message.into(), retryable: false }
    }

    /// Create a tool invocation error.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolInvocation { tool: tool.into(), message: message.into() }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Check whether a retry inside the current iteration may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TroupeError::Llm { retryable: true, .. }
                | TroupeError::LlmParse
                | TroupeError::ToolInvocation { .. }
        )
    }
}
