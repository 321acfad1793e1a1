//! Cooperative cancellation shared by every unit of work in a batch.
//!
//! A [`CancellationToken`] is tripped at most once, by whichever path gets
//! there first: the batch deadline, the first failure of a fail-fast batch, or
//! an explicit [`CancellationToken::cancel`]. Workers check it before starting
//! an item; transforms may recheck it mid-work. Nothing is ever preempted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use crate::core::ItemError;

/// Why a token was tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The batch deadline elapsed.
    Deadline,
    /// The item at `index` failed under the fail-fast policy.
    FailFast {
        /// Index of the item whose failure tripped the batch.
        index: usize,
    },
    /// Someone holding the token called [`CancellationToken::cancel`].
    Requested,
}

/// Terminal state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every item ran without the token being tripped.
    Completed,
    /// The deadline tripped the token.
    TimedOut,
    /// A fail-fast failure or an explicit request tripped the token.
    Cancelled,
}

impl BatchStatus {
    /// Derive the terminal status from the reason recorded on the token.
    #[must_use]
    pub const fn from_reason(reason: Option<CancelReason>) -> Self {
        match reason {
            None => Self::Completed,
            Some(CancelReason::Deadline) => Self::TimedOut,
            Some(CancelReason::FailFast { .. } | CancelReason::Requested) => Self::Cancelled,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

struct TokenInner {
    /// Fast-path flag read by every worker before each item.
    cancelled: AtomicBool,
    /// First reason wins; guarded so the write happens once.
    reason: Mutex<Option<CancelReason>>,
    deadline: Option<Instant>,
    notify: Notify,
}

/// Shared, trip-once cancellation signal.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// A token with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A token that trips itself once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    /// A token that trips itself `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    fn build(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                deadline,
                notify: Notify::new(),
            }),
        }
    }

    /// The wall-clock deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline; `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the token has been tripped.
    ///
    /// Observing an elapsed deadline trips the token with
    /// [`CancelReason::Deadline`], so the deadline takes effect even if no
    /// timer has fired yet.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                self.trip(CancelReason::Deadline);
                return true;
            }
        }
        false
    }

    /// Request cancellation. Returns `true` if this call tripped the token.
    pub fn cancel(&self) -> bool {
        self.trip(CancelReason::Requested)
    }

    /// The reason the token was tripped, if it has been.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        *self.inner.reason.lock()
    }

    /// `Err(ItemError::Cancelled)` once tripped, for mid-work rechecks with `?`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::Cancelled`] if the token has been tripped.
    pub fn check(&self) -> Result<(), ItemError> {
        if self.is_cancelled() {
            Err(ItemError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once the token is tripped or its deadline passes.
    ///
    /// Must be polled inside a tokio runtime with the time driver enabled when
    /// the token carries a deadline.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }

            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = &mut notified => {}
                        () = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Trip the token with `reason`. Only the first call has any effect.
    pub(crate) fn trip(&self, reason: CancelReason) -> bool {
        {
            let mut slot = self.inner.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
            self.inner.cancelled.store(true, Ordering::Release);
        }
        debug!(?reason, "Cancellation token tripped");
        self.inner.notify.notify_waiters();
        true
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.inner.cancelled.load(Ordering::Acquire))
            .field("reason", &self.reason())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}
