//! Workflow log records.
//!
//! Every state transition and observation appends one immutable record to the
//! team store. Statistics and execution context are reconstructed by folding
//! over these records, so they carry snapshots rather than references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId};
use crate::enums::{AgentStatus, LogKind, TaskStatus, WorkflowStatus};
use crate::llm::TokenUsage;
use crate::task::{Task, TaskId};

/// Snapshot of a task at log-emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: Option<String>,
    pub description: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            description: task.effective_description().to_string(),
            status: task.status,
            result: task.result.clone(),
        }
    }
}

/// Snapshot of an agent at log-emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub role: String,
    pub status: AgentStatus,
}

impl From<&Agent> for AgentSnapshot {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            role: agent.role.clone(),
            status: agent.status,
        }
    }
}

/// Free-form metadata attached to a log entry, consumed by the stats fold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parse_failure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_status: Option<WorkflowStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_task_status: Option<TaskStatus>,
}

impl LogMetadata {
    pub fn with_usage(mut self, usage: TokenUsage, model: impl Into<String>) -> Self {
        self.usage = Some(usage);
        self.model = Some(model.into());
        self
    }

    pub fn with_iteration(mut self, iteration: usize) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_parse_failure(mut self) -> Self {
        self.parse_failure = true;
        self
    }
}

/// One immutable event in the workflow log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLog {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentSnapshot>,
    #[serde(default)]
    pub metadata: LogMetadata,
    pub description: String,
}

impl WorkflowLog {
    /// A workflow-level status transition.
    pub fn workflow(status: WorkflowStatus, description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: LogKind::WorkflowStatusUpdate,
            task: None,
            agent: None,
            metadata: LogMetadata { workflow_status: Some(status), ..Default::default() },
            description: description.into(),
        }
    }

    /// A task status transition.
    pub fn task_update(task: &Task, previous: TaskStatus, description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: LogKind::TaskStatusUpdate,
            task: Some(TaskSnapshot::from(task)),
            agent: None,
            metadata: LogMetadata {
                previous_task_status: Some(previous),
                ..Default::default()
            },
            description: description.into(),
        }
    }

    /// An agent status transition or observation.
    pub fn agent_update(
        agent: &Agent,
        task: Option<&Task>,
        metadata: LogMetadata,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: LogKind::AgentStatusUpdate,
            task: task.map(TaskSnapshot::from),
            agent: Some(AgentSnapshot::from(agent)),
            metadata,
            description: description.into(),
        }
    }

    pub fn with_metadata(mut self, metadata: LogMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The agent status recorded in this entry, if it is an agent update.
    pub fn agent_status(&self) -> Option<AgentStatus> {
        self.agent.as_ref().map(|a| a.status)
    }

    /// The task status recorded in this entry, if it is a task update.
    pub fn task_status(&self) -> Option<TaskStatus> {
        match self.kind {
            LogKind::TaskStatusUpdate => self.task.as_ref().map(|t| t.status),
            _ => None,
        }
    }
}
