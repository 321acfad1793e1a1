//! Tests for positional tagging

use prometheus_fanout::core::{tag, IndexedItem, IndexedResult, ItemError};

#[test]
fn test_tag_preserves_order() {
    let tagged = tag(vec![10, 20, 30]);
    assert_eq!(
        tagged,
        vec![
            IndexedItem { index: 0, value: 10 },
            IndexedItem { index: 1, value: 20 },
            IndexedItem { index: 2, value: 30 },
        ]
    );
}

#[test]
fn test_tag_empty() {
    assert!(tag(Vec::<u8>::new()).is_empty());
}

#[test]
fn test_tag_duplicates_get_distinct_indices() {
    let tagged = tag(vec!["x", "x", "x"]);
    let indices: Vec<usize> = tagged.iter().map(|t| t.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_indexed_result_constructors() {
    assert!(IndexedResult::ok(0, 5).is_ok());
    assert!(!IndexedResult::<u8>::err(1, ItemError::transform("x")).is_ok());
    assert_eq!(IndexedResult::<u8>::cancelled(2).outcome, Err(ItemError::Cancelled));
}
