//! troupe: a multi-agent workflow orchestration core.
//!
//! A team bundles LLM-backed agents and their tasks around a single reactive
//! store. Pluggable strategies (sequential, hierarchical DAG, manager-LLM)
//! decide which tasks run when under a bounded concurrency ceiling, and each
//! task is driven by a bounded ReAct loop: think, act, observe, with tolerant
//! output parsing, tool dispatch, human-in-the-loop feedback, and cooperative
//! pause/resume/stop.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use troupe::{Agent, Task, Team};
//!
//! let writer = Agent::new("Wren", "writer", "produce crisp summaries", llm)
//!     .with_id("writer");
//! let extract = Task::new("Extract the key facts about {topic}.", "a fact list", "writer")
//!     .with_id("extract");
//! let summarize = Task::new("Summarize the extracted facts.", "one paragraph", "writer")
//!     .with_id("summarize")
//!     .with_deliverable(true);
//!
//! let team = Team::builder("newsroom")
//!     .agents(vec![writer])
//!     .tasks(vec![extract, summarize])
//!     .build()?;
//!
//! team.start([("topic".into(), "rust".into())].into_iter().collect())?;
//! let result = team.join().await;
//! ```

pub mod agent;
pub mod config;
pub mod enums;
pub mod error;
pub mod graph;
pub mod llm;
pub mod logs;
pub mod queue;
pub mod store;
pub mod strategy;
pub mod task;
pub mod team;
pub mod tools;

// Re-exports for convenience
pub use agent::executor::{AgentExecutor, TaskOutcome};
pub use agent::parser::{parse_llm_output, AgentOutput};
pub use agent::{Agent, AgentId};
pub use config::{ExecutionConfig, ModelPrice, RetryPolicy};
pub use enums::{AgentStatus, FeedbackStatus, LogKind, TaskStatus, WorkflowStatus};
pub use error::TroupeError;
pub use graph::DependencyGraph;
pub use llm::{ChatMessage, ChatRole, LlmClient, LlmOutput, TokenUsage};
pub use logs::{AgentSnapshot, LogMetadata, TaskSnapshot, WorkflowLog};
pub use queue::{ExecutionQueue, WorkItem};
pub use store::stats::{CostDetails, ModelUsage, WorkflowStats};
pub use store::{SubscriptionId, TeamState, TeamStore};
pub use strategy::{DeterministicStrategy, ExecutionStrategy, ManagerStrategy, StrategyContext};
pub use task::{Task, TaskFeedback, TaskId};
pub use team::{Team, TeamBuilder};
pub use tools::{Tool, ToolDefinition};
