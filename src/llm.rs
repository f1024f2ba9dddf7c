//! LLM client contract.
//!
//! The core treats language models as opaque capabilities: one `invoke`
//! operation over an ordered message list, returning text plus token usage.
//! Provider bridges live outside this crate; tests inject scripted mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TroupeError;

/// Role of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn in an agent's interaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Token counts for one LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self { input_tokens, output_tokens }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another call's usage into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Result of one LLM invocation.
#[derive(Debug, Clone)]
pub struct LlmOutput {
    /// Raw assistant text, prior to any parsing.
    pub content: String,
    /// Token usage, when the provider reports it.
    pub usage: Option<TokenUsage>,
}

impl LlmOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), usage: None }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Opaque handle to a language model.
///
/// Errors must be classified by the implementation: transient failures
/// (rate limits, network) as [`TroupeError::llm_transient`], fatal ones
/// (auth, invalid request) as [`TroupeError::llm_fatal`]. The iteration loop
/// retries transient errors with exponential backoff and gives up on fatal
/// ones immediately.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion over the given messages.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<LlmOutput, TroupeError>;

    /// Model name used for per-model usage accounting.
    fn model(&self) -> &str;
}
