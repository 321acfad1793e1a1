//! Configuration models for the batch engine.

pub mod engine;

pub use engine::{DispatchStrategy, EngineConfig, FailurePolicy};
