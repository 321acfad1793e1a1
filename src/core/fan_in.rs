//! Fan-in: merge many worker streams into one, closing it exactly once.

use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Select};
use tracing::{debug, warn};

use crate::core::error::panic_message;
use crate::core::EngineError;
use crate::runtime::spawn_plain;

const MERGER_NAME: &str = "fanout-merge";
const MERGER_STACK_SIZE: usize = 2 * 1024 * 1024;

/// A merged stream plus the thread draining its sources.
pub struct Merged<T> {
    rx: Receiver<T>,
    merger: JoinHandle<usize>,
}

impl<T> Merged<T> {
    /// The merged stream. It closes after every source has closed and drained.
    pub const fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    #[cfg(test)]
    pub(crate) const fn from_parts(rx: Receiver<T>, merger: JoinHandle<usize>) -> Self {
        Self { rx, merger }
    }

    /// Name of the merger thread.
    #[must_use]
    pub fn thread_name(&self) -> Option<&str> {
        self.merger.thread().name()
    }

    /// Drop the merged stream and wait for the merger thread.
    ///
    /// Returns the number of messages forwarded.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::WorkerPanicked` if the merger thread panicked.
    pub fn join(self) -> Result<usize, EngineError> {
        drop(self.rx);
        self.merger
            .join()
            .map_err(|payload| EngineError::WorkerPanicked(panic_message(payload.as_ref())))
    }
}

/// Merge `sources` into one stream with the given buffer capacity.
///
/// A single merger thread waits on whichever source is ready. A countdown
/// starts at the number of sources and is decremented each time a source
/// disconnects; the merged sender is dropped when it reaches zero, so the
/// destination closes only after every source has been fully drained.
///
/// # Errors
///
/// Returns `EngineError::Spawn` if the merger thread cannot be started.
pub fn merge<T>(sources: Vec<Receiver<T>>, capacity: usize) -> Result<Merged<T>, EngineError>
where
    T: Send + 'static,
{
    merge_named(sources, capacity, MERGER_NAME.to_string(), MERGER_STACK_SIZE)
}

/// Like [`merge`], with an explicit name and stack size for the merger thread.
///
/// # Errors
///
/// Returns `EngineError::Spawn` if the merger thread cannot be started.
pub fn merge_named<T>(
    sources: Vec<Receiver<T>>,
    capacity: usize,
    thread_name: String,
    stack_size: usize,
) -> Result<Merged<T>, EngineError>
where
    T: Send + 'static,
{
    let (tx, rx) = bounded(capacity);

    let merger = spawn_plain(thread_name, stack_size, move || {
        let mut remaining = sources.len();
        let mut forwarded = 0_usize;
        let mut select = Select::new();
        for source in &sources {
            select.recv(source);
        }

        while remaining > 0 {
            let oper = select.select();
            let slot = oper.index();
            match oper.recv(&sources[slot]) {
                Ok(msg) => {
                    if tx.send(msg).is_err() {
                        warn!(remaining, "Merged stream consumer went away, stopping fan-in");
                        break;
                    }
                    forwarded += 1;
                }
                Err(_) => {
                    select.remove(slot);
                    remaining -= 1;
                    debug!(source = slot, remaining, "Fan-in source drained");
                }
            }
        }

        drop(tx);
        debug!(forwarded, "Fan-in closed merged stream");
        forwarded
    })?;

    Ok(Merged { rx, merger })
}
