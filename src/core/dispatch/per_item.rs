//! One task per item, spawned behind a semaphore on a per-batch runtime.
//!
//! Every task reports on the same result stream, so the fan-in sees a single
//! source no matter how large the batch is.

use std::sync::Arc;

use crossbeam_channel::bounded;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{thread_name, Dispatch, WorkerContext, WorkerHandle};
use crate::config::EngineConfig;
use crate::core::{BatchExecutor, EngineError, IndexedItem, IndexedResult};
use crate::runtime::spawn_plain;

pub(super) fn dispatch<I, O, E>(
    items: Vec<IndexedItem<I>>,
    ctx: Arc<WorkerContext<E>>,
    config: &EngineConfig,
) -> Result<Dispatch<O>, EngineError>
where
    I: Send + 'static,
    O: Send + 'static,
    E: BatchExecutor<I, O>,
{
    let total = items.len();
    let max_in_flight = config.max_in_flight;
    let runtime_threads = config.worker_count.min(total).max(1);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(runtime_threads)
        .max_blocking_threads(max_in_flight.min(total).max(1))
        .thread_name(thread_name(config, "task"))
        .thread_stack_size(config.thread_stack_size)
        .enable_all()
        .build()
        .map_err(EngineError::Runtime)?;

    // One stream shared by every task. Room for every in-flight result keeps
    // sends from stalling runtime threads while the consumer keeps up.
    let (tx, rx) = bounded(config.result_buffer.max(max_in_flight.min(total)));
    let mut out = Dispatch::with_capacity(1);
    out.push_stream(rx);

    let spawner = spawn_plain(thread_name(config, "spawner"), config.thread_stack_size, move || {
        let spawned = rt.block_on(async move {
            let permits = Arc::new(Semaphore::new(max_in_flight));
            let mut tasks = JoinSet::new();
            let mut spawned = 0;

            for item in items {
                let index = item.index;
                if ctx.token.is_cancelled() {
                    debug!(index, "Not spawning item, batch cancelled");
                    if tx.send(IndexedResult::cancelled(index)).is_err() {
                        warn!(index, "Result stream closed, spawner stopping");
                        break;
                    }
                    continue;
                }
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    if tx.send(IndexedResult::cancelled(index)).is_err() {
                        break;
                    }
                    continue;
                };
                let ctx = Arc::clone(&ctx);
                let tx = tx.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let result = ctx.run_async(item).await;
                    if tx.send(result).is_err() {
                        debug!(index, "Result stream closed before item reported");
                    }
                });
                spawned += 1;
            }
            drop(tx);

            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    warn!(error = %err, "Per-item task did not complete");
                }
            }
            spawned
        });
        debug!(spawned, "Per-item spawner finished");
        WorkerHandle::spawner(spawned)
    })?;
    out.push_thread(spawner);

    Ok(out)
}
