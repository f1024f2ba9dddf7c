//! Tolerant parsing of LLM output into the loop's action shapes.
//!
//! Models are instructed to answer with a single JSON object, but real output
//! arrives wrapped in markdown fences, preceded by prose, or malformed. The
//! parser strips fences, then falls back to the first balanced `{...}` block
//! before classifying the result. Anything else is `Unparseable`, which the
//! loop answers with a corrective nudge rather than an error.

use regex::Regex;
use std::sync::OnceLock;

/// One parsed model response.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    /// The task is complete; the payload becomes the task result.
    FinalAnswer(serde_json::Value),
    /// Invoke a tool by name with the given input.
    ToolAction { tool: String, input: serde_json::Value },
    /// The model asked itself a question; appended as a new user turn.
    SelfQuestion(String),
    /// A thought or observation with no action; appended and continued.
    Observation(String),
    /// Nothing recognizable.
    Unparseable,
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Non-greedy body so multiple fences pick the first block.
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap())
}

/// Parse raw assistant text into an [`AgentOutput`].
pub fn parse_llm_output(raw: &str) -> AgentOutput {
    let candidate = fence_re()
        .captures(raw)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| raw.to_string());

    if let Some(value) = parse_json_lenient(&candidate) {
        return classify(value);
    }

    // Fenced block failed or was absent; try the raw text's first object.
    if let Some(value) = parse_json_lenient(raw) {
        return classify(value);
    }

    AgentOutput::Unparseable
}

/// Try strict parse first, then the first balanced top-level `{...}` block.
fn parse_json_lenient(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }
    first_balanced_object(trimmed)
        .and_then(|block| serde_json::from_str(block).ok())
}

/// Locate the first balanced `{...}` block, respecting string literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Look up a field under both camelCase and snake_case spellings.
fn field<'a>(obj: &'a serde_json::Map<String, serde_json::Value>, camel: &str, snake: &str) -> Option<&'a serde_json::Value> {
    obj.get(camel).or_else(|| obj.get(snake))
}

fn classify(value: serde_json::Value) -> AgentOutput {
    let Some(obj) = value.as_object() else {
        return AgentOutput::Unparseable;
    };

    if let Some(answer) = field(obj, "finalAnswer", "final_answer") {
        return AgentOutput::FinalAnswer(answer.clone());
    }

    if let Some(action) = obj.get("action").and_then(|a| a.as_str()) {
        let input = field(obj, "actionInput", "action_input")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        return AgentOutput::ToolAction { tool: action.to_string(), input };
    }

    if let Some(question) = field(obj, "selfQuestion", "self_question").and_then(|q| q.as_str()) {
        return AgentOutput::SelfQuestion(question.to_string());
    }

    if let Some(observation) = obj.get("observation").and_then(|o| o.as_str()) {
        return AgentOutput::Observation(observation.to_string());
    }

    // A bare thought with no action still moves the loop forward.
    if let Some(thought) = obj.get("thought").and_then(|t| t.as_str()) {
        return AgentOutput::Observation(thought.to_string());
    }

    AgentOutput::Unparseable
}
