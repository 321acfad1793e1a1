//! Tests for configuration validation

use prometheus_fanout::config::{DispatchStrategy, EngineConfig, FailurePolicy};
use std::time::Duration;

#[test]
fn test_engine_config_validation() {
    let valid = EngineConfig::new().with_worker_count(4);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_engine_config_invalid_worker_count() {
    let invalid = EngineConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_invalid_max_in_flight() {
    let invalid = EngineConfig::new().with_max_in_flight(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_invalid_deadline() {
    let invalid = EngineConfig::new().with_deadline(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_invalid_stack_size() {
    let invalid = EngineConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_invalid_thread_prefix() {
    let invalid = EngineConfig::new().with_thread_name_prefix("  ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_from_json() {
    let json = r#"{
        "worker_count": 3,
        "strategy": "per_item",
        "failure_policy": "fail_fast",
        "deadline_ms": 1500,
        "max_in_flight": 16
    }"#;

    let config = EngineConfig::from_json_str(json).expect("parse config");
    assert_eq!(config.worker_count, 3);
    assert_eq!(config.strategy, DispatchStrategy::PerItem);
    assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    assert_eq!(config.deadline(), Some(Duration::from_millis(1500)));
    assert_eq!(config.max_in_flight, 16);
    assert_eq!(config.result_buffer, 0);
    assert_eq!(config.thread_name_prefix, "fanout-worker");
}

#[test]
fn test_engine_config_from_json_rejects_invalid() {
    assert!(EngineConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
    assert!(EngineConfig::from_json_str(r#"{"strategy": "round_robin"}"#).is_err());
    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_engine_config_json_roundtrip() {
    let config = EngineConfig::new()
        .with_worker_count(2)
        .with_strategy(DispatchStrategy::StaticPartition);
    let json = serde_json::to_string(&config).expect("serialize");
    assert_eq!(EngineConfig::from_json_str(&json).expect("parse"), config);
}

#[test]
fn test_engine_config_from_lookup_defaults() {
    let config = EngineConfig::from_lookup(|_| None).expect("defaults are valid");
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_engine_config_from_lookup_policy() {
    let config = EngineConfig::from_lookup(|key| match key {
        "FANOUT_FAILURE_POLICY" => Some("fail-fast".to_string()),
        "FANOUT_RESULT_BUFFER" => Some("32".to_string()),
        _ => None,
    })
    .expect("parse env");
    assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    assert_eq!(config.result_buffer, 32);
}
