//! Tests for result aggregation

use prometheus_fanout::core::{aggregate, Aggregator, BatchResult, IndexedResult, ItemError};

#[test]
fn test_aggregator_records_in_any_order() {
    let mut aggregator = Aggregator::new(4);
    aggregator.record(IndexedResult::ok(3, 9));
    aggregator.record(IndexedResult::err(1, ItemError::transform("nope")));
    aggregator.record(IndexedResult::ok(0, 0));
    aggregator.record(IndexedResult::cancelled(2));
    assert_eq!(aggregator.received(), 4);
    assert_eq!(aggregator.success_count(), 2);

    let result = aggregator.finish();
    assert_eq!(result.output(3), Some(&9));
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.cancelled_indices(), vec![2]);
    assert!(result.missing(4).is_empty());
    assert!(!result.is_complete_success(4));
}

#[test]
fn test_aggregator_drops_duplicates_and_out_of_range() {
    let mut aggregator = Aggregator::new(2);
    aggregator.record(IndexedResult::ok(0, "first"));
    aggregator.record(IndexedResult::ok(0, "second"));
    aggregator.record(IndexedResult::ok(7, "stray"));
    assert_eq!(aggregator.received(), 1);

    let result = aggregator.finish();
    assert_eq!(result.output(0), Some(&"first"));
    assert_eq!(result.missing(2), vec![1]);
}

#[test]
fn test_aggregate_drains_channel() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let producer = std::thread::spawn(move || {
        for index in (0..5).rev() {
            tx.send(IndexedResult::ok(index, index * 10)).unwrap();
        }
    });
    let result = aggregate(&rx, 5);
    producer.join().unwrap();

    assert!(result.is_complete_success(5));
    assert_eq!(result.into_ordered_outputs(), vec![0, 10, 20, 30, 40]);
}

#[test]
fn test_display_lists_outputs_then_errors() {
    let mut aggregator = Aggregator::new(3);
    aggregator.record(IndexedResult::ok(2, 9));
    aggregator.record(IndexedResult::err(1, ItemError::transform("cannot square 2")));
    aggregator.record(IndexedResult::ok(0, 1));
    let result: BatchResult<i32> = aggregator.finish();

    assert_eq!(
        result.to_string(),
        "Success: 2\n[0] Out: 1\n[2] Out: 9\nFail: 1\n[1] Err: transform failed: cannot square 2\n"
    );
    assert_eq!(
        result.display_with(&[1, 2, 3]).to_string(),
        "Success: 2\nIn: 1 Out: 1\nIn: 3 Out: 9\nFail: 1\nIn: 2 Err: transform failed: cannot square 2\n"
    );
}
