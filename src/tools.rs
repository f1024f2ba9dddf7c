//! Tool contract.
//!
//! A tool is a named capability an agent can invoke mid-iteration. Tool
//! failures are reported back into the agent's history as observations and
//! never abort the loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TroupeError;

/// Declarative description of a tool, exposed to the model in prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique within an agent's tool set; matched case-sensitively.
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self { name: name.into(), description: description.into(), input_schema }
    }
}

/// An invokable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Invoke with the parsed input. Returns a serializable result which the
    /// loop stringifies into an observation.
    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, TroupeError>;
}

/// Render a tool result for the agent's observation history.
///
/// Strings pass through unquoted; everything else is serialized as JSON.
pub fn stringify_tool_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
