//! Dedicated worker threads, each driving its own single-threaded tokio runtime.

use std::thread::{self, JoinHandle};

use tokio::runtime::Runtime;
use tracing::debug;

use crate::core::EngineError;

/// Build the current-thread runtime a worker will own.
///
/// # Errors
///
/// Returns `EngineError::Runtime` if tokio cannot build the runtime.
pub fn current_thread_runtime() -> Result<Runtime, EngineError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(EngineError::Runtime)
}

/// Spawn a named OS thread that runs `body` with a private tokio runtime.
///
/// The runtime is built on the calling thread so a failure surfaces here
/// instead of silently inside the worker.
///
/// # Errors
///
/// Returns `EngineError::Runtime` or `EngineError::Spawn` if either resource
/// cannot be created.
pub fn spawn_worker<F, T>(name: String, stack_size: usize, body: F) -> Result<JoinHandle<T>, EngineError>
where
    F: FnOnce(&Runtime) -> T + Send + 'static,
    T: Send + 'static,
{
    let rt = current_thread_runtime()?;
    thread::Builder::new()
        .name(name)
        .stack_size(stack_size)
        .spawn(move || {
            debug!("Worker thread started");
            let out = body(&rt);
            debug!("Worker thread exiting");
            out
        })
        .map_err(EngineError::Spawn)
}

/// Spawn a named OS thread without a runtime (producers, spawners, stages).
///
/// # Errors
///
/// Returns `EngineError::Spawn` if the thread cannot be created.
pub fn spawn_plain<F, T>(name: String, stack_size: usize, body: F) -> Result<JoinHandle<T>, EngineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name)
        .stack_size(stack_size)
        .spawn(body)
        .map_err(EngineError::Spawn)
}
