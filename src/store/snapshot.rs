//! Cleaned state snapshots.
//!
//! A cleaned snapshot is the JSON tree of the whole store with every secret
//! and time-dependent field replaced by a sentinel, so two runs with identical
//! mock LLM responses serialize byte-for-byte identically. Used for
//! deterministic snapshot testing and persistence.

use serde_json::{json, Value};

use super::TeamState;

/// Sentinel substituted for redacted fields.
pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values are replaced wherever they appear in the tree.
const REDACTED_KEYS: &[&str] = &[
    "id",
    "agent_id",
    "agentId",
    "task_id",
    "taskId",
    "reference_id",
    "referenceId",
    "env",
    "api_key",
    "apiKey",
    "timestamp",
    "duration",
    "start_time",
    "startTime",
    "end_time",
    "endTime",
];

/// Build the redacted, time-independent snapshot of a team state.
pub fn cleaned_state(state: &TeamState, log_level: &str) -> Value {
    let agents: Vec<Value> = state
        .agents
        .iter()
        .map(|agent| {
            json!({
                "id": agent.id.as_str(),
                "name": agent.name,
                "role": agent.role,
                "goal": agent.goal,
                "background": agent.background,
                "status": agent.status,
                "maxIterations": agent.max_iterations,
                "tools": agent
                    .tools
                    .iter()
                    .map(|t| t.definition().name)
                    .collect::<Vec<_>>(),
                "llmConfig": {
                    "model": agent.llm.model(),
                    "apiKey": REDACTED,
                },
            })
        })
        .collect();

    let mut tree = json!({
        "teamWorkflowStatus": state.workflow_status,
        "workflowResult": state.workflow_result,
        "name": state.name,
        "agents": agents,
        "tasks": state.tasks,
        "workflowLogs": state.workflow_logs,
        "inputs": state.inputs,
        "workflowContext": state.workflow_context,
        "logLevel": log_level,
    });

    redact_in_place(&mut tree);
    tree
}

/// Walk the tree replacing redacted keys' values with the sentinel.
fn redact_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if REDACTED_KEYS.contains(&key.as_str()) {
                    *child = Value::String(REDACTED.to_string());
                } else {
                    redact_in_place(child);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_in_place(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_nested_keys() {
        let mut tree = json!({
            "id": "abc",
            "nested": {
                "timestamp": "2024-01-01T00:00:00Z",
                "content": "keep me",
                "llmConfig": {"apiKey": "sk-secret", "model": "m"},
            },
            "list": [{"agent_id": "a1", "value": 3}],
        });
        redact_in_place(&mut tree);
        assert_eq!(tree["id"], REDACTED);
        assert_eq!(tree["nested"]["timestamp"], REDACTED);
        assert_eq!(tree["nested"]["content"], "keep me");
        assert_eq!(tree["nested"]["llmConfig"]["apiKey"], REDACTED);
        assert_eq!(tree["nested"]["llmConfig"]["model"], "m");
        assert_eq!(tree["list"][0]["agent_id"], REDACTED);
        assert_eq!(tree["list"][0]["value"], 3);
    }
}
