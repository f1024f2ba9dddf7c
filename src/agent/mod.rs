//! Agent model.
//!
//! An agent is an LLM-backed worker: identity, persona strings used to build
//! its system prompt, an ordered tool set, a mutable loop status, and an
//! interaction history private to the loop executing it.

pub mod executor;
pub mod parser;
pub mod prompts;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::enums::AgentStatus;
use crate::llm::{ChatMessage, LlmClient};
use crate::tools::Tool;

/// Unique identifier for an agent within a team.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An LLM-backed worker owned by a team.
#[derive(Clone)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,

    /// Persona strings composed into the system prompt.
    pub role: String,
    pub goal: String,
    pub background: String,

    /// Opaque model handle, shared between clones.
    pub llm: Arc<dyn LlmClient>,

    /// Ordered tool set; names are unique within it.
    pub tools: Vec<Arc<dyn Tool>>,

    pub status: AgentStatus,

    /// Chat turns accumulated while working a task. Private to the loop
    /// executing this agent instance; clones start fresh.
    pub interactions_history: Vec<ChatMessage>,

    pub current_iterations: usize,

    /// Iteration budget for the ReAct loop. `None` inherits the team config's
    /// default (10 unless configured otherwise).
    pub max_iterations: Option<usize>,

    /// Iteration index at which the loop prepends the final-answer nudge.
    /// `None` means one before the effective budget.
    pub force_final_answer_after: Option<usize>,
}

impl Agent {
    /// Create an agent with a generated id and default iteration budget.
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            id: AgentId::new(uuid::Uuid::new_v4().to_string()),
            name: name.into(),
            role: role.into(),
            goal: goal.into(),
            background: String::new(),
            llm,
            tools: Vec::new(),
            status: AgentStatus::Initial,
            interactions_history: Vec::new(),
            current_iterations: 0,
            max_iterations: None,
            force_final_answer_after: None,
        }
    }

    /// Override the generated id with a stable one.
    pub fn with_id(mut self, id: impl Into<AgentId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the iteration budget; the force-final-answer threshold follows.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max.max(1));
        self
    }

    /// Budget resolved against the team default.
    pub fn effective_max_iterations(&self, default: usize) -> usize {
        self.max_iterations.unwrap_or(default).max(1)
    }

    /// Iteration index at which the final-answer nudge fires.
    pub fn effective_force_final_answer_after(&self, default_max: usize) -> usize {
        self.force_final_answer_after
            .unwrap_or_else(|| self.effective_max_iterations(default_max) - 1)
    }

    /// Look up a tool by exact (case-sensitive) name.
    pub fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }

    /// Value-copy with a fresh history and iteration counter.
    ///
    /// The model handle and tool list are shared (stateless); the history is
    /// not, so two tasks served by the same logical agent never contaminate
    /// each other.
    pub fn clone_for_parallel(&self) -> Self {
        Self {
            interactions_history: Vec::new(),
            current_iterations: 0,
            status: AgentStatus::Initial,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("status", &self.status)
            .field("tools", &self.tools.len())
            .field("current_iterations", &self.current_iterations)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}
