//! Static partition: item `i` always goes to worker `i mod w`.

use std::sync::Arc;

use crossbeam_channel::bounded;
use tracing::{debug, warn};

use super::{thread_name, Dispatch, WorkerContext, WorkerHandle};
use crate::config::EngineConfig;
use crate::core::{BatchExecutor, EngineError, IndexedItem};
use crate::runtime::spawn_worker;

/// Split `items` into `worker_count` stride buckets, each in increasing index order.
fn partition<T>(items: Vec<IndexedItem<T>>, worker_count: usize) -> Vec<Vec<IndexedItem<T>>> {
    let mut buckets: Vec<Vec<IndexedItem<T>>> = (0..worker_count)
        .map(|_| Vec::with_capacity(items.len() / worker_count + 1))
        .collect();
    for item in items {
        buckets[item.index % worker_count].push(item);
    }
    buckets
}

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
    let worker_count = config.worker_count.min(items.len()).max(1);
    let mut out = Dispatch::with_capacity(worker_count);

    for (worker_id, bucket) in partition(items, worker_count).into_iter().enumerate() {
        let (result_tx, result_rx) = bounded(config.result_buffer);
        let ctx = Arc::clone(&ctx);

        let handle = spawn_worker(thread_name(config, worker_id), config.thread_stack_size, move |rt| {
            let mut processed = 0;
            for item in bucket {
                let result = ctx.run_blocking(rt, item);
                processed += 1;
                if result_tx.send(result).is_err() {
                    warn!(worker_id, "Result stream closed, worker stopping");
                    break;
                }
            }
            debug!(worker_id, processed, "Worker finished its partition");
            WorkerHandle::worker(worker_id, processed)
        })?;

        out.push_stream(result_rx);
        out.push_thread(handle);
    }

    Ok(out)
}
