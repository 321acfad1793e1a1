//! Tests for telemetry helpers

use prometheus_fanout::util::{init_test_tracing, init_tracing, DEFAULT_FILTER};

#[test]
fn test_default_filter_targets_crate() {
    assert!(DEFAULT_FILTER.starts_with("prometheus_fanout="));
}

#[test]
fn test_init_is_idempotent() {
    init_test_tracing();
    init_test_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
