//! Status lexicons for tasks, agents, workflows, and feedback.
//!
//! The serialized forms are stable external strings; downstream consumers
//! (snapshots, logs, persisted state) match on them, so variants serialize
//! as SCREAMING_SNAKE_CASE and must not be renamed.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not yet started.
    #[default]
    Todo,
    /// Currently being worked by an agent.
    Doing,
    /// Cannot proceed (unmet revision upstream, or iteration budget exhausted).
    Blocked,
    /// Human feedback arrived; the task must be re-executed.
    Revise,
    /// Completed with a result.
    Done,
    /// Completed but waiting for external human validation.
    AwaitingValidation,
    /// Validated by a human after completion.
    Validated,
    /// Abandoned due to a workflow stop or fatal error.
    Aborted,
    /// Suspended at an iteration boundary; resumable.
    Paused,
    /// Re-entered after a pause (transient, immediately becomes Doing).
    Resumed,
}

impl TaskStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Validated | TaskStatus::Aborted)
    }

    /// A task counts as successfully completed once Done or Validated.
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Validated)
    }
}

/// Fine-grained status of an agent inside its iteration loop.
///
/// These drive the per-iteration log stream; most are transient and exist so
/// observers can reconstruct what an agent was doing at any log offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    #[default]
    Initial,
    Thinking,
    ThinkingEnd,
    ThinkingError,
    Thought,
    ExecutingAction,
    UsingTool,
    UsingToolEnd,
    UsingToolError,
    Observation,
    FinalAnswer,
    SelfQuestion,
    IterationStart,
    IterationEnd,
    MaxIterationsError,
    TaskAborted,
    Paused,
    Resumed,
    IssuesParsingLlmOutput,
}

/// Aggregate status of the whole workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    #[default]
    Initial,
    Running,
    Paused,
    Stopping,
    Stopped,
    Errored,
    /// No runnable task exists and at least one task is Blocked or
    /// AwaitingValidation. Not terminal: feedback or validation can revive it.
    Blocked,
    Finished,
}

impl WorkflowStatus {
    /// Terminal statuses: the workflow will never dispatch again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Stopped | WorkflowStatus::Errored | WorkflowStatus::Finished
        )
    }

    /// Quiescent statuses: nothing is in flight and nothing will be dispatched
    /// without an external call (validate, feedback, resume).
    pub fn is_quiescent(&self) -> bool {
        self.is_terminal() || matches!(self, WorkflowStatus::Blocked)
    }
}

/// Processing status of a feedback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    #[default]
    Pending,
    Processed,
}

/// Kind discriminator for workflow log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    WorkflowStatusUpdate,
    TaskStatusUpdate,
    AgentStatusUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_format() {
        let json = serde_json::to_string(&TaskStatus::AwaitingValidation).unwrap();
        assert_eq!(json, "\"AWAITING_VALIDATION\"");
        let back: TaskStatus = serde_json::from_str("\"REVISE\"").unwrap();
        assert_eq!(back, TaskStatus::Revise);
    }

    #[test]
    fn test_agent_status_wire_format() {
        let json = serde_json::to_string(&AgentStatus::IssuesParsingLlmOutput).unwrap();
        assert_eq!(json, "\"ISSUES_PARSING_LLM_OUTPUT\"");
        let json = serde_json::to_string(&AgentStatus::UsingToolEnd).unwrap();
        assert_eq!(json, "\"USING_TOOL_END\"");
    }

    #[test]
    fn test_workflow_status_wire_format() {
        let json = serde_json::to_string(&WorkflowStatus::Stopping).unwrap();
        assert_eq!(json, "\"STOPPING\"");
    }

    #[test]
    fn test_terminality() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Validated.is_terminal());
        assert!(TaskStatus::Aborted.is_terminal());
        assert!(!TaskStatus::AwaitingValidation.is_terminal());
        assert!(!TaskStatus::Blocked.is_terminal());

        assert!(WorkflowStatus::Finished.is_terminal());
        assert!(!WorkflowStatus::Blocked.is_terminal());
        assert!(WorkflowStatus::Blocked.is_quiescent());
        assert!(!WorkflowStatus::Running.is_quiescent());
    }
}
