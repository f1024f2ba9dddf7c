//! Workflow statistics.
//!
//! Stats are a pure fold over the log stream, from the latest RUNNING entry
//! to the end. Nothing is cached: recomputing on demand keeps the numbers
//! consistent under revision ripples.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ModelPrice;
use crate::enums::{AgentStatus, LogKind, WorkflowStatus};
use crate::logs::WorkflowLog;

/// Accumulated usage for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub call_count: u64,
}

/// Cost breakdown derived from the configured price table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostDetails {
    pub total_cost: f64,
    pub per_model: HashMap<String, f64>,
}

/// Aggregate statistics for the current (or latest) run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStats {
    /// Wall time between the latest RUNNING log and the last log.
    pub duration: Duration,
    pub per_model_usage: HashMap<String, ModelUsage>,
    pub total_tokens: u64,
    /// Completed LLM calls (THINKING_END entries).
    pub call_count: u64,
    /// THINKING_ERROR plus USING_TOOL_ERROR entries.
    pub error_count: u64,
    /// ISSUES_PARSING_LLM_OUTPUT entries.
    pub parsing_errors: u64,
    /// ITERATION_END entries.
    pub iteration_count: u64,
    pub cost_details: CostDetails,
}

/// Fold the log stream into [`WorkflowStats`].
pub fn compute_stats(logs: &[WorkflowLog], prices: &HashMap<String, ModelPrice>) -> WorkflowStats {
    // Start of the current run: the latest RUNNING workflow entry.
    let start_index = logs
        .iter()
        .rposition(|log| {
            log.kind == LogKind::WorkflowStatusUpdate
                && log.metadata.workflow_status == Some(WorkflowStatus::Running)
        })
        .unwrap_or(0);
    let window = &logs[start_index..];

    let mut stats = WorkflowStats::default();
    if let (Some(first), Some(last)) = (window.first(), window.last()) {
        stats.duration = (last.timestamp - first.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
    }

    for log in window {
        if let Some(usage) = log.metadata.usage {
            let model = log.metadata.model.as_deref().unwrap_or("unknown");
            let entry = stats.per_model_usage.entry(model.to_string()).or_default();
            entry.input_tokens += usage.input_tokens;
            entry.output_tokens += usage.output_tokens;
            entry.call_count += 1;
            stats.total_tokens += usage.total();
        }

        match log.agent_status() {
            Some(AgentStatus::ThinkingEnd) => stats.call_count += 1,
            Some(AgentStatus::ThinkingError) | Some(AgentStatus::UsingToolError) => {
                stats.error_count += 1
            }
            Some(AgentStatus::IssuesParsingLlmOutput) => stats.parsing_errors += 1,
            Some(AgentStatus::IterationEnd) => stats.iteration_count += 1,
            _ => {}
        }
    }

    for (model, usage) in &stats.per_model_usage {
        match prices.get(model) {
            Some(price) => {
                let cost = usage.input_tokens as f64 / 1_000_000.0 * price.input_per_mtok
                    + usage.output_tokens as f64 / 1_000_000.0 * price.output_per_mtok;
                stats.cost_details.per_model.insert(model.clone(), cost);
                stats.cost_details.total_cost += cost;
            }
            None => {
                tracing::debug!(model, "no price configured; counting zero cost");
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TokenUsage;
    use crate::logs::LogMetadata;

    fn agent_log(status: AgentStatus, metadata: LogMetadata) -> WorkflowLog {
        use crate::enums::LogKind;
        use crate::logs::AgentSnapshot;
        WorkflowLog {
            timestamp: chrono::Utc::now(),
            kind: LogKind::AgentStatusUpdate,
            task: None,
            agent: Some(AgentSnapshot {
                id: crate::agent::AgentId::new("a1"),
                name: "w".to_string(),
                role: "r".to_string(),
                status,
            }),
            metadata,
            description: String::new(),
        }
    }

    #[test]
    fn test_fold_counts_and_usage() {
        let logs = vec![
            WorkflowLog::workflow(WorkflowStatus::Running, "started"),
            agent_log(AgentStatus::IterationStart, LogMetadata::default()),
            agent_log(
                AgentStatus::ThinkingEnd,
                LogMetadata::default().with_usage(TokenUsage::new(100, 20), "mock-model"),
            ),
            agent_log(AgentStatus::IssuesParsingLlmOutput, LogMetadata::default()),
            agent_log(AgentStatus::UsingToolError, LogMetadata::default()),
            agent_log(AgentStatus::IterationEnd, LogMetadata::default()),
        ];

        let stats = compute_stats(&logs, &HashMap::new());
        assert_eq!(stats.call_count, 1);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.parsing_errors, 1);
        assert_eq!(stats.iteration_count, 1);
        assert_eq!(stats.total_tokens, 120);
        assert_eq!(stats.per_model_usage["mock-model"].call_count, 1);
    }

    #[test]
    fn test_fold_window_starts_at_latest_running() {
        let logs = vec![
            WorkflowLog::workflow(WorkflowStatus::Running, "first run"),
            agent_log(
                AgentStatus::ThinkingEnd,
                LogMetadata::default().with_usage(TokenUsage::new(50, 50), "mock-model"),
            ),
            WorkflowLog::workflow(WorkflowStatus::Running, "second run"),
            agent_log(
                AgentStatus::ThinkingEnd,
                LogMetadata::default().with_usage(TokenUsage::new(10, 5), "mock-model"),
            ),
        ];

        let stats = compute_stats(&logs, &HashMap::new());
        // Only the second run is counted.
        assert_eq!(stats.call_count, 1);
        assert_eq!(stats.total_tokens, 15);
    }

    #[test]
    fn test_cost_details() {
        let logs = vec![
            WorkflowLog::workflow(WorkflowStatus::Running, "started"),
            agent_log(
                AgentStatus::ThinkingEnd,
                LogMetadata::default().with_usage(TokenUsage::new(1_000_000, 1_000_000), "mock-model"),
            ),
        ];
        let mut prices = HashMap::new();
        prices.insert("mock-model".to_string(), ModelPrice::new(3.0, 15.0));

        let stats = compute_stats(&logs, &prices);
        assert!((stats.cost_details.total_cost - 18.0).abs() < 1e-9);
        assert!((stats.cost_details.per_model["mock-model"] - 18.0).abs() < 1e-9);
    }
}
