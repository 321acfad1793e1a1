//! Batch engine configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How items are assigned to concurrent workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Workers pull from one shared queue; whoever is free takes the next item.
    #[default]
    SharedQueue,
    /// Worker `k` handles positions `k, k + w, k + 2w, ...`.
    StaticPartition,
    /// One task per item, gated by `max_in_flight`.
    PerItem,
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedQueue => write!(f, "shared_queue"),
            Self::StaticPartition => write!(f, "static_partition"),
            Self::PerItem => write!(f, "per_item"),
        }
    }
}

impl FromStr for DispatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "shared_queue" | "pool" | "queue" => Ok(Self::SharedQueue),
            "static_partition" | "partition" => Ok(Self::StaticPartition),
            "per_item" => Ok(Self::PerItem),
            other => Err(format!("unknown dispatch strategy `{other}`")),
        }
    }
}

/// What a failing item does to the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Partial,
    /// The first failure cancels every item that has not started yet.
    FailFast,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial => write!(f, "partial"),
            Self::FailFast => write!(f, "fail_fast"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "partial" => Ok(Self::Partial),
            "fail_fast" => Ok(Self::FailFast),
            other => Err(format!("unknown failure policy `{other}`")),
        }
    }
}

const MIN_STACK_SIZE: usize = 64 * 1024;

/// Configuration for a [`BatchEngine`](crate::core::BatchEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrent workers for the pool and partition strategies; runtime
    /// threads for the per-item strategy.
    pub worker_count: usize,
    /// Work distribution policy.
    pub strategy: DispatchStrategy,
    /// Failure handling policy.
    pub failure_policy: FailurePolicy,
    /// Optional batch deadline in milliseconds, measured from batch start.
    pub deadline_ms: Option<u64>,
    /// Capacity of each result channel. `0` makes every send a rendezvous.
    pub result_buffer: usize,
    /// Maximum tasks in flight under the per-item strategy.
    pub max_in_flight: usize,
    /// Stack size for worker threads, in bytes.
    pub thread_stack_size: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            strategy: DispatchStrategy::default(),
            failure_policy: FailurePolicy::default(),
            deadline_ms: None,
            result_buffer: 0,
            max_in_flight: 1024,
            thread_stack_size: 2 * 1024 * 1024,
            thread_name_prefix: "fanout-worker".into(),
        }
    }
}

impl EngineConfig {
    /// Defaults: one worker per CPU, shared queue, partial failures, no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the dispatch strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the batch deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Remove the batch deadline.
    #[must_use]
    pub const fn without_deadline(mut self) -> Self {
        self.deadline_ms = None;
        self
    }

    /// Set the result channel capacity.
    #[must_use]
    pub const fn with_result_buffer(mut self, capacity: usize) -> Self {
        self.result_buffer = capacity;
        self
    }

    /// Set the per-item in-flight limit.
    #[must_use]
    pub const fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// The batch deadline as a duration.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_in_flight == 0 {
            return Err("max_in_flight must be greater than 0".into());
        }
        if self.deadline_ms == Some(0) {
            return Err("deadline_ms must be greater than 0 when set".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!("thread_stack_size must be at least {MIN_STACK_SIZE} bytes"));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `FANOUT_*` environment variables, reading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation error.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup using the same keys as
    /// [`EngineConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns a message naming the key that failed to parse, or the
    /// validation error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("FANOUT_WORKER_COUNT") {
            cfg.worker_count = parse_var("FANOUT_WORKER_COUNT", &v)?;
        }
        if let Some(v) = lookup("FANOUT_STRATEGY") {
            cfg.strategy = parse_var("FANOUT_STRATEGY", &v)?;
        }
        if let Some(v) = lookup("FANOUT_FAILURE_POLICY") {
            cfg.failure_policy = parse_var("FANOUT_FAILURE_POLICY", &v)?;
        }
        if let Some(v) = lookup("FANOUT_DEADLINE_MS") {
            cfg.deadline_ms = Some(parse_var("FANOUT_DEADLINE_MS", &v)?);
        }
        if let Some(v) = lookup("FANOUT_RESULT_BUFFER") {
            cfg.result_buffer = parse_var("FANOUT_RESULT_BUFFER", &v)?;
        }
        if let Some(v) = lookup("FANOUT_MAX_IN_FLIGHT") {
            cfg.max_in_flight = parse_var("FANOUT_MAX_IN_FLIGHT", &v)?;
        }
        if let Some(v) = lookup("FANOUT_THREAD_NAME_PREFIX") {
            cfg.thread_name_prefix = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}: cannot parse `{raw}`: {e}"))
}
