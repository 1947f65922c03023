//! Tests for utility helpers

use dnssec_scheduler::util::{clock, init_tracing};
use std::time::{Duration, UNIX_EPOCH};

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing("dnssec_scheduler=debug");
    init_tracing("info");
    tracing::info!("tracing initialised twice without panicking");
}

#[test]
fn test_unix_secs_around_epoch() {
    assert_eq!(clock::unix_secs(UNIX_EPOCH + Duration::from_secs(90)), 90);
    assert_eq!(clock::unix_secs(UNIX_EPOCH - Duration::from_secs(5)), -5);
}

#[test]
fn test_after_is_in_future() {
    let left = clock::until(clock::after(Duration::from_secs(60)));
    assert!(left > Duration::from_secs(50));
    assert!(left <= Duration::from_secs(60));
}
