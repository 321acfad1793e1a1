//! Unit tests for individual components

mod error_test;
mod config_test;
mod tagging_test;
mod aggregate_test;
mod util_test;
mod runtime_test;
