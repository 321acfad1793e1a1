//! Shared-queue pool: `w` workers pull from one queue fed by a producer.

use std::sync::Arc;

use crossbeam_channel::bounded;
use tracing::{debug, warn};

use super::{thread_name, Dispatch, WorkerContext, WorkerHandle};
use crate::config::EngineConfig;
use crate::core::{BatchExecutor, EngineError, IndexedItem};
use crate::runtime::{spawn_plain, spawn_worker};

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
    // Rendezvous queue: an item leaves the producer only when a worker is free.
    let (queue_tx, queue_rx) = bounded::<IndexedItem<I>>(0);
    let mut out = Dispatch::with_capacity(worker_count);

    for worker_id in 0..worker_count {
        let (result_tx, result_rx) = bounded(config.result_buffer);
        let queue = queue_rx.clone();
        let ctx = Arc::clone(&ctx);

        let handle = spawn_worker(thread_name(config, worker_id), config.thread_stack_size, move |rt| {
            let mut processed = 0;
            // Blocks on the queue; ends once the producer drops its sender.
            for item in &queue {
                let result = ctx.run_blocking(rt, item);
                processed += 1;
                if result_tx.send(result).is_err() {
                    warn!(worker_id, "Result stream closed, worker stopping");
                    break;
                }
            }
            debug!(worker_id, processed, "Worker drained queue");
            WorkerHandle::worker(worker_id, processed)
        })?;

        out.push_stream(result_rx);
        out.push_thread(handle);
    }
    drop(queue_rx);

    let producer = spawn_plain(thread_name(config, "feed"), config.thread_stack_size, move || {
        let mut fed = 0;
        for item in items {
            if queue_tx.send(item).is_err() {
                warn!(fed, "Every worker has exited, producer stopping");
                break;
            }
            fed += 1;
        }
        WorkerHandle::producer(fed)
    })?;
    out.push_thread(producer);

    Ok(out)
}
