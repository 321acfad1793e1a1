//! Work distribution: turn tagged items into per-worker result streams.
//!
//! The pool and partition strategies yield one [`Receiver`] per worker; the
//! per-item strategy yields a single stream shared by all of its tasks.
//! Streams are unordered but lossless: each input index shows up exactly once
//! across them, either with its value, its error, or as
//! [`ItemError::Cancelled`] when the batch token was tripped before the item
//! started.
//!
//! # Strategies
//!
//! - **Shared queue**: a producer feeds one rendezvous queue; `w` workers pull
//!   from it, so faster workers naturally take more items.
//! - **Static partition**: worker `k` owns positions `k, k + w, ...` and walks
//!   them in increasing order. Assignment is deterministic.
//! - **Per item**: one tokio task per item on a per-batch runtime, spawned
//!   behind a semaphore of `max_in_flight` permits. Synchronous transforms run
//!   on the runtime's blocking pool, so up to `max_in_flight` of them proceed
//!   at once whatever the worker count.

mod partition;
mod per_item;
mod pool;

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use tokio::runtime::Runtime;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::{DispatchStrategy, EngineConfig, FailurePolicy};
use crate::core::error::panic_message;
use crate::core::{
    BatchExecutor, CancelReason, CancellationToken, EngineError, IndexedItem, IndexedResult, ItemError,
};

/// What a dispatch thread was doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerRole {
    /// Feeds the shared queue.
    Producer,
    /// Processes items.
    Worker,
    /// Spawns per-item tasks.
    Spawner,
}

/// Diagnostics returned by a dispatch thread when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerHandle {
    pub(crate) id: usize,
    pub(crate) role: WorkerRole,
    pub(crate) items_processed: usize,
}

impl WorkerHandle {
    pub(crate) const fn worker(id: usize, items_processed: usize) -> Self {
        Self { id, role: WorkerRole::Worker, items_processed }
    }

    pub(crate) const fn producer(items_fed: usize) -> Self {
        Self { id: 0, role: WorkerRole::Producer, items_processed: items_fed }
    }

    pub(crate) const fn spawner(items_spawned: usize) -> Self {
        Self { id: 0, role: WorkerRole::Spawner, items_processed: items_spawned }
    }
}

/// State shared by every unit of work in one batch.
pub(crate) struct WorkerContext<E> {
    pub(crate) executor: E,
    pub(crate) token: CancellationToken,
    pub(crate) policy: FailurePolicy,
}

impl<E> WorkerContext<E> {
    /// Check-before-start: `false` means the item must not run.
    fn admit(&self, index: usize) -> bool {
        if self.token.is_cancelled() {
            debug!(index, "Skipping item, batch cancelled");
            return false;
        }
        true
    }

    /// Run one item on a worker thread's private runtime.
    ///
    /// The transform runs as a spawned task so that a panic is contained to
    /// this item.
    pub(crate) fn run_blocking<I, O>(&self, rt: &Runtime, item: IndexedItem<I>) -> IndexedResult<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        E: BatchExecutor<I, O>,
    {
        let IndexedItem { index, value } = item;
        if !self.admit(index) {
            return IndexedResult::cancelled(index);
        }
        debug!(index, "Item started");
        let executor = self.executor.clone();
        let token = self.token.clone();
        let joined = rt.block_on(rt.spawn(async move { executor.execute(value, token).await }));
        self.settle(index, flatten(joined))
    }

    /// Run one item as a task on the ambient multi-threaded runtime.
    pub(crate) async fn run_async<I, O>(&self, item: IndexedItem<I>) -> IndexedResult<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        E: BatchExecutor<I, O>,
    {
        let IndexedItem { index, value } = item;
        if !self.admit(index) {
            return IndexedResult::cancelled(index);
        }
        debug!(index, "Item started");
        let executor = self.executor.clone();
        let token = self.token.clone();
        let joined = tokio::spawn(async move { executor.execute(value, token).await }).await;
        self.settle(index, flatten(joined))
    }

    /// Log the outcome and trip the token on the first fail-fast failure.
    fn settle<O>(&self, index: usize, outcome: Result<O, ItemError>) -> IndexedResult<O> {
        match &outcome {
            Ok(_) => debug!(index, "Item done"),
            Err(err) if err.is_failure() => {
                debug!(index, error = %err, "Item failed");
                if self.policy == FailurePolicy::FailFast
                    && self.token.trip(CancelReason::FailFast { index })
                {
                    info!(index, error = %err, "Fail-fast: cancelling items not yet started");
                }
            }
            Err(_) => debug!(index, "Item cancelled mid-work"),
        }
        IndexedResult { index, outcome }
    }
}

fn flatten<O>(joined: Result<Result<O, ItemError>, JoinError>) -> Result<O, ItemError> {
    joined.unwrap_or_else(|err| {
        if err.is_panic() {
            Err(ItemError::Panicked(panic_message(err.into_panic().as_ref())))
        } else {
            Err(ItemError::Cancelled)
        }
    })
}

pub(crate) fn thread_name(config: &EngineConfig, suffix: impl std::fmt::Display) -> String {
    format!("{}-{suffix}", config.thread_name_prefix)
}

/// Per-worker result streams of a running dispatch plus its threads.
pub struct Dispatch<O> {
    streams: Vec<Receiver<IndexedResult<O>>>,
    threads: Vec<JoinHandle<WorkerHandle>>,
}

impl<O> Dispatch<O> {
    fn with_capacity(streams: usize) -> Self {
        Self {
            streams: Vec::with_capacity(streams),
            threads: Vec::with_capacity(streams + 1),
        }
    }

    fn push_stream(&mut self, stream: Receiver<IndexedResult<O>>) {
        self.streams.push(stream);
    }

    fn push_thread(&mut self, thread: JoinHandle<WorkerHandle>) {
        self.threads.push(thread);
    }

    /// Number of result streams (one per worker, or one for per-item dispatch).
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Hand the result streams to a consumer, typically [`merge`](crate::core::merge).
    pub fn take_streams(&mut self) -> Vec<Receiver<IndexedResult<O>>> {
        std::mem::take(&mut self.streams)
    }

    /// Wait for every dispatch thread to exit.
    ///
    /// Any streams not yet taken are dropped first so blocked workers can
    /// finish. Returns the number of items the workers processed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::WorkerPanicked` if a thread panicked outside of
    /// per-item isolation. Every thread is joined regardless.
    pub fn join(mut self) -> Result<usize, EngineError> {
        self.streams.clear();
        let mut processed = 0;
        let mut first_err = None;
        for thread in self.threads {
            match thread.join() {
                Ok(handle) => {
                    debug!(
                        worker_id = handle.id,
                        role = ?handle.role,
                        items = handle.items_processed,
                        "Dispatch thread finished"
                    );
                    if handle.role != WorkerRole::Producer {
                        processed += handle.items_processed;
                    }
                }
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    warn!(error = %msg, "Dispatch thread panicked");
                    first_err.get_or_insert(EngineError::WorkerPanicked(msg));
                }
            }
        }
        first_err.map_or(Ok(processed), Err)
    }
}

/// Start distributing `items` according to `strategy`.
///
/// `config` supplies the worker count, failure policy, result buffer and
/// thread settings; its own `strategy` field is ignored in favour of the
/// argument.
///
/// # Errors
///
/// Returns an `EngineError` if a thread or runtime cannot be created. Threads
/// already started exit on their own once the returned error drops their
/// channels.
pub fn dispatch<I, O, E>(
    strategy: DispatchStrategy,
    items: Vec<IndexedItem<I>>,
    executor: E,
    token: &CancellationToken,
    config: &EngineConfig,
) -> Result<Dispatch<O>, EngineError>
where
    I: Send + 'static,
    O: Send + 'static,
    E: BatchExecutor<I, O>,
{
    config.validate().map_err(EngineError::InvalidConfig)?;
    let ctx = Arc::new(WorkerContext {
        executor,
        token: token.clone(),
        policy: config.failure_policy,
    });
    match strategy {
        DispatchStrategy::SharedQueue => pool::dispatch(items, ctx, config),
        DispatchStrategy::StaticPartition => partition::dispatch(items, ctx, config),
        DispatchStrategy::PerItem => per_item::dispatch(items, ctx, config),
    }
}
