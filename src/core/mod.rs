//! Batch engine building blocks: tagging, dispatch, fan-in, aggregation and
//! cancellation.

pub mod aggregate;
pub mod cancel;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fan_in;
pub mod pipeline;
pub mod tagging;

pub use aggregate::{aggregate, Aggregator, BatchDisplay, BatchResult};
pub use cancel::{BatchStatus, CancelReason, CancellationToken};
pub use dispatch::{dispatch, Dispatch};
pub use engine::{BatchEngine, BatchReport};
pub use error::{AppResult, BatchError, EngineError, ItemError};
pub use executor::{AsyncFnExecutor, BatchExecutor, CtxFnExecutor, FnExecutor};
pub use fan_in::{merge, merge_named, Merged};
pub use pipeline::Pipeline;
pub use tagging::{tag, IndexedItem, IndexedResult};

pub use crate::config::{DispatchStrategy, FailurePolicy};
