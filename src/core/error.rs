//! Error types for batch execution.

use thiserror::Error;

/// Outcome of a single item that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// The transformation rejected this item.
    #[error("transform failed: {0}")]
    Transform(String),
    /// The item never started, or stopped early, because the batch was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// The transformation panicked while processing this item.
    #[error("transform panicked: {0}")]
    Panicked(String),
}

impl ItemError {
    /// Build a [`ItemError::Transform`] from any displayable message.
    pub fn transform(msg: impl std::fmt::Display) -> Self {
        Self::Transform(msg.to_string())
    }

    /// Whether this outcome is a cooperative cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this outcome counts as a failure that trips a fail-fast batch.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Transform(_) | Self::Panicked(_))
    }
}

impl From<anyhow::Error> for ItemError {
    fn from(err: anyhow::Error) -> Self {
        Self::Transform(format!("{err:#}"))
    }
}

/// Errors produced while setting up or tearing down a batch.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker, producer or merger thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// A tokio runtime for worker execution could not be built.
    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// A thread panicked outside of per-item isolation.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
    /// Internal invariant violated (lost result, closed channel, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Batch-level failure used by the fail-fast view of a finished batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// An item failed; carries the index that failed.
    #[error("item {index} failed: {source}")]
    Item {
        /// Position of the failing input.
        index: usize,
        /// What went wrong with it.
        source: ItemError,
    },
    /// The batch deadline elapsed before every item finished.
    #[error("batch timed out ({completed}/{total} items completed)")]
    TimedOut {
        /// Items that produced a value.
        completed: usize,
        /// Items in the batch.
        total: usize,
    },
    /// The batch was cancelled before every item finished.
    #[error("batch cancelled ({completed}/{total} items completed)")]
    Cancelled {
        /// Items that produced a value.
        completed: usize,
        /// Items in the batch.
        total: usize,
    },
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Render a panic payload the way `std` prints it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
