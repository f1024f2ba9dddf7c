//! Execution configuration.
//!
//! Concurrency ceiling, iteration budget, LLM retry policy, and the optional
//! per-model price table used by workflow statistics.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a team's execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of tasks in `DOING` at any instant.
    pub max_concurrency: usize,

    /// Default iteration budget for agents that do not set their own.
    pub default_max_iterations: usize,

    /// Retry policy for transient LLM transport failures inside one iteration.
    pub retry_policy: RetryPolicy,

    /// Optional per-work-item timeout. `None` delegates timeouts entirely to
    /// the underlying LLM/tool client configuration.
    #[serde(with = "humantime_serde::option")]
    pub task_timeout: Option<Duration>,

    /// USD price per million tokens, keyed by model name. Models absent from
    /// the table cost zero in the stats fold.
    pub model_prices: HashMap<String, ModelPrice>,

    /// Log level recorded in cleaned snapshots.
    pub log_level: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            default_max_iterations: 10,
            retry_policy: RetryPolicy::default(),
            task_timeout: None,
            model_prices: HashMap::new(),
            log_level: "info".to_string(),
        }
    }
}

impl ExecutionConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency ceiling (clamped to at least 1).
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the default iteration budget.
    pub fn with_default_max_iterations(mut self, max: usize) -> Self {
        self.default_max_iterations = max.max(1);
        self
    }

    /// Set the LLM retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set a per-work-item timeout.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Register a model's token pricing.
    pub fn with_model_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.model_prices.insert(model.into(), price);
        self
    }

    /// Set the log level recorded in snapshots.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

/// USD cost per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl ModelPrice {
    pub fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self { input_per_mtok, output_per_mtok }
    }
}

/// Retry policy for transient LLM failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts within a single iteration.
    pub max_retries: usize,

    /// Base delay for exponential backoff.
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    /// Cap on the backoff delay.
    #[serde(with = "humantime_serde")]
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given retry count and default backoff.
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries, ..Default::default() }
    }

    /// Set the backoff base.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the backoff cap.
    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Default::default() }
    }

    /// Whether another retry is allowed after `attempts` failures.
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_retries
    }

    /// Exponential backoff delay for a given attempt, capped.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt as u32);
        self.backoff_base.saturating_mul(multiplier).min(self.backoff_max)
    }
}
