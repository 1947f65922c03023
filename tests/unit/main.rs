//! Unit tests for individual components

mod util_test;
mod config_test;
mod error_test;
