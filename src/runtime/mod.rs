//! Thread and runtime plumbing for batch workers.

pub mod worker_thread;

pub use worker_thread::{current_thread_runtime, spawn_plain, spawn_worker};
