//! Batch controller: tag, dispatch, merge and aggregate one batch.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::dispatch::{thread_name, WorkerContext};
use crate::core::{
    dispatch, merge_named, tag, Aggregator, BatchError, BatchExecutor, BatchResult, BatchStatus,
    CancelReason, CancellationToken, Dispatch, EngineError, ItemError, Merged,
};
use crate::runtime::current_thread_runtime;

/// Everything known about a finished batch.
#[derive(Debug, Clone)]
pub struct BatchReport<O> {
    /// Identifier used in this batch's log records.
    pub batch_id: Uuid,
    /// Terminal state of the batch.
    pub status: BatchStatus,
    /// Per-index outputs and errors.
    pub result: BatchResult<O>,
    /// Under fail-fast, the failure that tripped the batch.
    pub first_error: Option<(usize, ItemError)>,
    /// Number of inputs in the batch.
    pub total: usize,
    /// Wall-clock duration of the batch.
    pub elapsed: Duration,
}

impl<O> BatchReport<O> {
    /// Whether every item produced a value and nothing was cancelled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Completed && self.result.is_complete_success(self.total)
    }

    /// Collapse the batch into ordered outputs or a single error.
    ///
    /// Precedence: the fail-fast error, then a timed-out or cancelled status,
    /// then the lowest failing index.
    ///
    /// # Errors
    ///
    /// Returns a [`BatchError`] unless every item produced a value and the
    /// batch completed.
    pub fn into_ordered(self) -> Result<Vec<O>, BatchError> {
        if let Some((index, source)) = self.first_error {
            return Err(BatchError::Item { index, source });
        }
        let completed = self.result.success_count;
        let total = self.total;
        match self.status {
            BatchStatus::TimedOut => return Err(BatchError::TimedOut { completed, total }),
            BatchStatus::Cancelled => return Err(BatchError::Cancelled { completed, total }),
            BatchStatus::Completed => {}
        }
        if let Some((&index, source)) = self.result.errors.iter().next() {
            return Err(BatchError::Item { index, source: source.clone() });
        }
        if completed < total {
            return Err(BatchError::Cancelled { completed, total });
        }
        Ok(self.result.into_ordered_outputs())
    }
}

/// Applies one executor to whole batches of inputs.
///
/// # Example
///
/// ```rust,ignore
/// use prometheus_fanout::config::EngineConfig;
/// use prometheus_fanout::core::{BatchEngine, FnExecutor, ItemError};
///
/// let engine = BatchEngine::new(
///     EngineConfig::new().with_worker_count(2),
///     FnExecutor::new(|x: i64| Ok::<_, ItemError>(x * x)),
/// )?;
/// let report = engine.run(vec![1, 2, 3, 4, 5])?;
/// assert_eq!(report.into_ordered()?, vec![1, 4, 9, 16, 25]);
/// ```
pub struct BatchEngine<I, O, E> {
    config: EngineConfig,
    executor: E,
    _io: PhantomData<fn(I) -> O>,
}

impl<I, O, E: Clone> Clone for BatchEngine<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            executor: self.executor.clone(),
            _io: PhantomData,
        }
    }
}

impl<I, O, E> BatchEngine<I, O, E>
where
    I: Send + 'static,
    O: Send + 'static,
    E: BatchExecutor<I, O>,
{
    /// Create an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: EngineConfig, executor: E) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(Self {
            config,
            executor,
            _io: PhantomData,
        })
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a batch, blocking the calling thread until every item has reported.
    ///
    /// The configured deadline, if any, starts now.
    ///
    /// # Errors
    ///
    /// Returns an `EngineError` only for infrastructure failures (threads,
    /// runtimes). Item failures are reported inside the [`BatchReport`].
    pub fn run(&self, inputs: Vec<I>) -> Result<BatchReport<O>, EngineError> {
        self.run_with_token(inputs, &self.batch_token())
    }

    /// Run a batch one item at a time, in input order, on the calling thread.
    ///
    /// Failure policy, deadline and the returned report behave as in
    /// [`BatchEngine::run`]: under fail-fast the first failure leaves every
    /// later item `Cancelled`, and under partial every item runs. Useful as a
    /// baseline for the concurrent strategies.
    ///
    /// Must not be called from inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Runtime` if the item runtime cannot be built.
    pub fn run_sequential(&self, inputs: Vec<I>) -> Result<BatchReport<O>, EngineError> {
        self.run_sequential_with_token(inputs, &self.batch_token())
    }

    /// [`BatchEngine::run_sequential`] observing a caller-owned token.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::run_sequential`].
    pub fn run_sequential_with_token(
        &self,
        inputs: Vec<I>,
        token: &CancellationToken,
    ) -> Result<BatchReport<O>, EngineError> {
        let batch_id = Uuid::new_v4();
        let total = inputs.len();
        let started = Instant::now();
        let span = info_span!(
            "batch",
            %batch_id,
            strategy = "sequential",
            policy = %self.config.failure_policy
        );
        let _entered = span.enter();

        info!(total, "Batch started");
        let mut aggregator = Aggregator::new(total);
        if total > 0 {
            let rt = current_thread_runtime()?;
            let ctx = WorkerContext {
                executor: self.executor.clone(),
                token: token.clone(),
                policy: self.config.failure_policy,
            };
            for item in tag(inputs) {
                aggregator.record(ctx.run_blocking(&rt, item));
            }
        }

        Ok(self.finish(batch_id, token, aggregator.finish(), total, started))
    }

    /// Run a batch observing a caller-owned token.
    ///
    /// The configured deadline is not applied; the token's own deadline
    /// governs. Cancelling the token from another thread stops items that have
    /// not started yet.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::run`].
    pub fn run_with_token(
        &self,
        inputs: Vec<I>,
        token: &CancellationToken,
    ) -> Result<BatchReport<O>, EngineError> {
        let batch_id = Uuid::new_v4();
        let total = inputs.len();
        let started = Instant::now();
        let span = info_span!(
            "batch",
            %batch_id,
            strategy = %self.config.strategy,
            policy = %self.config.failure_policy
        );
        let _entered = span.enter();

        info!(total, worker_count = self.config.worker_count, "Batch started");
        if total == 0 {
            return Ok(self.finish(batch_id, token, BatchResult::default(), total, started));
        }

        let mut dispatched = dispatch(
            self.config.strategy,
            tag(inputs),
            self.executor.clone(),
            token,
            &self.config,
        )?;
        let merged = match merge_named(
            dispatched.take_streams(),
            self.config.result_buffer,
            thread_name(&self.config, "merge"),
            self.config.thread_stack_size,
        ) {
            Ok(merged) => merged,
            Err(err) => {
                // Workers see their streams closed and exit; collect them before bailing.
                let _ = dispatched.join();
                return Err(err);
            }
        };

        let mut aggregator = Aggregator::new(total);
        let stream = merged.receiver();
        if let Some(deadline) = token.deadline() {
            loop {
                match stream.recv_deadline(deadline) {
                    Ok(item) => aggregator.record(item),
                    Err(RecvTimeoutError::Timeout) => {
                        if token.trip(CancelReason::Deadline) {
                            warn!(
                                received = aggregator.received(),
                                total,
                                "Batch deadline elapsed, cancelling items not yet started"
                            );
                        }
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        for item in stream {
            aggregator.record(item);
        }
        let result = aggregator.finish();

        if let Err(err) = join_workers(merged, dispatched) {
            warn!(
                error = %err,
                succeeded = result.success_count,
                failed = result.failure_count(),
                "Batch threads failed, discarding result"
            );
            return Err(err);
        }

        Ok(self.finish(batch_id, token, result, total, started))
    }

    /// Run a batch on tokio's blocking pool so async callers are not stalled.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::run`]; additionally `EngineError::Internal` if the
    /// blocking task itself fails.
    pub async fn run_async(&self, inputs: Vec<I>) -> Result<BatchReport<O>, EngineError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.run(inputs))
            .await
            .map_err(|e| EngineError::Internal(format!("batch task failed: {e}")))?
    }

    fn batch_token(&self) -> CancellationToken {
        self.config
            .deadline()
            .map_or_else(CancellationToken::new, CancellationToken::with_timeout)
    }

    fn finish(
        &self,
        batch_id: Uuid,
        token: &CancellationToken,
        result: BatchResult<O>,
        total: usize,
        started: Instant,
    ) -> BatchReport<O> {
        let reason = token.reason();
        let status = BatchStatus::from_reason(reason);
        let first_error = match reason {
            Some(CancelReason::FailFast { index }) => {
                result.error(index).cloned().map(|err| (index, err))
            }
            _ => None,
        };
        let elapsed = started.elapsed();

        info!(
            %status,
            succeeded = result.success_count,
            failed = result.failure_count(),
            cancelled = result.cancelled_indices().len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Batch finished"
        );

        BatchReport {
            batch_id,
            status,
            result,
            first_error,
            total,
            elapsed,
        }
    }
}

/// Join the merger and every dispatch thread, then report the first failure.
fn join_workers<T, O>(merged: Merged<T>, dispatched: Dispatch<O>) -> Result<usize, EngineError> {
    let merge_outcome = merged.join();
    let dispatch_outcome = dispatched.join();
    merge_outcome?;
    dispatch_outcome
}
