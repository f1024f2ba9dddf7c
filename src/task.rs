//! Task model.
//!
//! A task is a unit of work owned by one agent, with a natural-language
//! description (supporting `{placeholder}` slots), optional dependencies on
//! other tasks, and an append-only feedback history.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::agent::AgentId;
use crate::enums::{FeedbackStatus, TaskStatus};
use crate::llm::ChatMessage;

/// Unique identifier for a task within a team.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A human feedback entry attached to a task.
///
/// Entries are immutable once appended; only `status` transitions, and only
/// from Pending to Processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFeedback {
    pub content: String,
    pub status: FeedbackStatus,
    pub timestamp: DateTime<Utc>,
}

impl TaskFeedback {
    pub fn pending(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: FeedbackStatus::Pending,
            timestamp: Utc::now(),
        }
    }
}

/// A unit of work owned by a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: Option<String>,
    pub reference_id: Option<String>,

    /// Natural-language description with `{placeholder}` slots interpolated
    /// from workflow inputs at start time.
    pub description: String,

    /// Narrative of what a good result looks like.
    pub expected_output: String,

    /// The owning agent.
    pub agent_id: AgentId,

    /// Ids of tasks that must be Done before this one may run.
    pub depends_on: Vec<TaskId>,

    /// When true, a busy owning agent is cloned rather than waited for.
    pub allow_parallel_execution: bool,

    /// Deliverable tasks contribute the workflow result.
    pub is_deliverable: bool,

    /// When true, a final answer lands in AwaitingValidation instead of Done.
    pub external_validation_required: bool,

    pub status: TaskStatus,

    /// Append-only feedback history.
    pub feedback_history: Vec<TaskFeedback>,

    /// Cache of the description after input interpolation.
    pub interpolated_description: Option<String>,

    /// Result set on completion; any JSON value.
    pub result: Option<serde_json::Value>,

    /// Interaction history checkpointed when the loop yields on pause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_history: Option<Vec<ChatMessage>>,

    /// Iteration counter checkpointed alongside `paused_history`.
    #[serde(default)]
    pub paused_iterations: usize,

    /// Why the task is Blocked, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

impl Task {
    /// Create a task with a generated id.
    pub fn new(
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent_id: impl Into<AgentId>,
    ) -> Self {
        Self {
            id: TaskId::new(uuid::Uuid::new_v4().to_string()),
            name: None,
            reference_id: None,
            description: description.into(),
            expected_output: expected_output.into(),
            agent_id: agent_id.into(),
            depends_on: Vec::new(),
            allow_parallel_execution: false,
            is_deliverable: false,
            external_validation_required: false,
            status: TaskStatus::Todo,
            feedback_history: Vec::new(),
            interpolated_description: None,
            result: None,
            paused_history: None,
            paused_iterations: 0,
            blocked_reason: None,
        }
    }

    /// Override the generated id with a stable one.
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Declare dependencies on other tasks by id.
    pub fn with_depends_on(mut self, deps: Vec<TaskId>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn with_allow_parallel_execution(mut self, allow: bool) -> Self {
        self.allow_parallel_execution = allow;
        self
    }

    pub fn with_deliverable(mut self, deliverable: bool) -> Self {
        self.is_deliverable = deliverable;
        self
    }

    pub fn with_external_validation(mut self, required: bool) -> Self {
        self.external_validation_required = required;
        self
    }

    /// The description to prompt with: interpolated if available, raw otherwise.
    pub fn effective_description(&self) -> &str {
        self.interpolated_description.as_deref().unwrap_or(&self.description)
    }

    /// Whether any feedback entry is still pending.
    pub fn has_pending_feedback(&self) -> bool {
        self.feedback_history
            .iter()
            .any(|f| f.status == FeedbackStatus::Pending)
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// Interpolate `{placeholder}` slots from the inputs map.
///
/// Unknown placeholders are left literal and returned so the caller can warn
/// once per task. Non-string input values are rendered as JSON.
pub fn interpolate_description(
    description: &str,
    inputs: &HashMap<String, serde_json::Value>,
) -> (String, Vec<String>) {
    let mut missing = Vec::new();
    let result = placeholder_re().replace_all(description, |caps: &regex::Captures| {
        let key = &caps[1];
        match inputs.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                missing.push(key.to_string());
                caps[0].to_string()
            }
        }
    });
    (result.into_owned(), missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_basic() {
        let mut inputs = HashMap::new();
        inputs.insert("topic".to_string(), serde_json::json!("rust async"));
        let (out, missing) = interpolate_description("Research {topic} deeply.", &inputs);
        assert_eq!(out, "Research rust async deeply.");
        assert!(missing.is_empty());
    }

    #[test]
    fn test_interpolation_missing_left_literal() {
        let inputs = HashMap::new();
        let (out, missing) = interpolate_description("Summarize {doc} for {audience}.", &inputs);
        assert_eq!(out, "Summarize {doc} for {audience}.");
        assert_eq!(missing, vec!["doc".to_string(), "audience".to_string()]);
    }

    #[test]
    fn test_interpolation_non_string_values() {
        let mut inputs = HashMap::new();
        inputs.insert("count".to_string(), serde_json::json!(7));
        let (out, _) = interpolate_description("Produce {count} items.", &inputs);
        assert_eq!(out, "Produce 7 items.");
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("desc", "out", "agent-1")
            .with_id("t1")
            .with_name("extract")
            .with_depends_on(vec![TaskId::new("t0")])
            .with_deliverable(true);

        assert_eq!(task.id.as_str(), "t1");
        assert_eq!(task.name.as_deref(), Some("extract"));
        assert_eq!(task.depends_on, vec![TaskId::new("t0")]);
        assert!(task.is_deliverable);
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn test_pending_feedback_detection() {
        let mut task = Task::new("d", "o", "a");
        assert!(!task.has_pending_feedback());
        task.feedback_history.push(TaskFeedback::pending("redo"));
        assert!(task.has_pending_feedback());
        task.feedback_history[0].status = FeedbackStatus::Processed;
        assert!(!task.has_pending_feedback());
    }
}
