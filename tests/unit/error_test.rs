//! Tests for error types

use prometheus_fanout::core::{BatchError, EngineError, ItemError};

#[test]
fn test_transform_error() {
    let err = ItemError::transform("cannot square 4");
    assert_eq!(format!("{}", err), "transform failed: cannot square 4");
    assert!(err.is_failure());
    assert!(!err.is_cancelled());
}

#[test]
fn test_cancelled_error() {
    let err = ItemError::Cancelled;
    assert_eq!(format!("{}", err), "cancelled");
    assert!(err.is_cancelled());
    assert!(!err.is_failure());
}

#[test]
fn test_panicked_error() {
    let err = ItemError::Panicked("boom".to_string());
    assert_eq!(format!("{}", err), "transform panicked: boom");
    assert!(err.is_failure());
}

#[test]
fn test_item_error_from_anyhow() {
    let err: ItemError = anyhow::anyhow!("disk full").context("writing shard").into();
    assert_eq!(err, ItemError::Transform("writing shard: disk full".to_string()));
}

#[test]
fn test_engine_errors() {
    let err = EngineError::InvalidConfig("worker_count must be greater than 0".to_string());
    assert_eq!(format!("{}", err), "invalid configuration: worker_count must be greater than 0");

    let err = EngineError::WorkerPanicked("stage `parse`: oops".to_string());
    assert_eq!(format!("{}", err), "worker panicked: stage `parse`: oops");
}

#[test]
fn test_batch_errors() {
    let err = BatchError::Item { index: 3, source: ItemError::transform("bad input") };
    assert_eq!(format!("{}", err), "item 3 failed: transform failed: bad input");

    let err = BatchError::TimedOut { completed: 2, total: 5 };
    assert_eq!(format!("{}", err), "batch timed out (2/5 items completed)");

    let err = BatchError::Cancelled { completed: 0, total: 3 };
    assert_eq!(format!("{}", err), "batch cancelled (0/3 items completed)");
}
