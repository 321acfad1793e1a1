//! # Prometheus Fanout
//!
//! A bounded fan-out/fan-in batch engine for the Prometheus AI Platform.
//!
//! Given a batch of inputs and a (possibly failing) transformation, the engine
//! applies the transformation to every input with a fixed concurrency budget,
//! puts the outputs back in input order, keeps one failing item from taking
//! down its siblings, and supports cooperative cancellation with an optional
//! deadline.
//!
//! ## Pieces
//!
//! - **Positional tagging** ([`core::tag`]): every input travels with its index.
//! - **Dispatch** ([`core::dispatch`]): shared-queue pool, static partition, or
//!   one task per item. Each worker owns one result stream.
//! - **Fan-in** ([`core::merge`]): one stream out, closed exactly when every
//!   worker stream has drained.
//! - **Aggregation** ([`core::aggregate`]): the single writer of the
//!   [`core::BatchResult`].
//! - **Cancellation** ([`core::CancellationToken`]): tripped once, by the
//!   deadline, the first fail-fast failure, or the caller. Checked before every
//!   item; never preemptive.
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_fanout::config::{DispatchStrategy, EngineConfig, FailurePolicy};
//! use prometheus_fanout::core::{BatchEngine, FnExecutor, ItemError};
//! use std::time::Duration;
//!
//! let engine = BatchEngine::new(
//!     EngineConfig::new()
//!         .with_worker_count(4)
//!         .with_strategy(DispatchStrategy::SharedQueue)
//!         .with_failure_policy(FailurePolicy::Partial)
//!         .with_deadline(Duration::from_secs(30)),
//!     FnExecutor::new(|x: i64| {
//!         if x == 4 {
//!             return Err(ItemError::transform("cannot square 4"));
//!         }
//!         Ok(x * x)
//!     }),
//! )?;
//!
//! let report = engine.run(vec![1, 2, 3, 4, 5])?;
//! assert_eq!(report.result.success_count, 4);
//! println!("{}", report.result.display_with(&[1, 2, 3, 4, 5]));
//! ```
//!
//! From async code, use [`core::BatchEngine::run_async`], which moves the
//! blocking batch onto tokio's blocking pool.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Batch engine: tagging, dispatch, fan-in, aggregation and cancellation.
pub mod core;
/// Configuration models for the engine.
pub mod config;
/// Worker thread and runtime plumbing.
pub mod runtime;
/// Shared utilities.
pub mod util;
