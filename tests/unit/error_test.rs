//! Tests for error types

use dnssec_scheduler::core::{PoolError, SchedulerError};
use std::error::Error;
use std::io;

#[test]
fn test_assertion_error() {
    let err = SchedulerError::Assertion("task owner must not be empty");
    assert_eq!(format!("{err}"), "assertion failed: task owner must not be empty");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("capacity must be greater than 0".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: capacity must be greater than 0"
    );
}

#[test]
fn test_spawn_error_keeps_source() {
    let err = PoolError::Spawn {
        name: "worker-3".to_string(),
        source: io::Error::new(io::ErrorKind::OutOfMemory, "no stack"),
    };
    assert_eq!(format!("{err}"), "failed to spawn thread `worker-3`: no stack");
    assert!(err.source().is_some());
}

#[test]
fn test_worker_panicked_error() {
    assert_eq!(format!("{}", PoolError::WorkerPanicked(2)), "2 pool thread(s) panicked");
    assert!(PoolError::WorkerPanicked(2).source().is_none());
}

#[test]
fn test_join_timeout_error() {
    assert_eq!(
        format!("{}", PoolError::JoinTimeout(3)),
        "3 pool thread(s) still running after join timeout"
    );
    assert!(PoolError::JoinTimeout(3).source().is_none());
}

#[test]
fn test_scheduler_error_converts_to_pool_error() {
    let err: PoolError = SchedulerError::InvalidConfig("worker_count must be greater than 0".into()).into();
    assert!(matches!(err, PoolError::InvalidConfig(_)));
    assert_eq!(
        format!("{err}"),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_errors_flow_into_anyhow() {
    fn submit() -> dnssec_scheduler::core::AppResult<()> {
        Err(SchedulerError::Assertion("task class must not be empty"))?;
        Ok(())
    }
    let err = submit().unwrap_err();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
