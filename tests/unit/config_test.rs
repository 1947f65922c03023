//! Tests for configuration validation

use dnssec_scheduler::config::{
    FifoQueueConfig, MergePolicy, ScheduleConfig, SchedulerConfig, WorkerPoolConfig,
};
use std::time::Duration;

#[test]
fn test_worker_pool_config_validation() {
    let valid = WorkerPoolConfig::new().with_worker_count(4);
    assert!(valid.validate().is_ok());
    assert_eq!(valid.thread_name_prefix, "worker");

    assert!(WorkerPoolConfig::new().with_worker_count(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_thread_stack_size(0).validate().is_err());
}

#[test]
fn test_fifo_queue_config_validation() {
    let valid = FifoQueueConfig::default().with_capacity(10);
    assert!(valid.validate().is_ok());
    assert_eq!(valid.push_wait(), Duration::from_secs(5));

    assert!(FifoQueueConfig::default().with_capacity(0).validate().is_err());

    let too_high = FifoQueueConfig {
        low_watermark_percent: 101,
        ..FifoQueueConfig::default()
    };
    assert!(too_high.validate().is_err());

    let zero = FifoQueueConfig {
        low_watermark_percent: 0,
        ..FifoQueueConfig::default()
    };
    assert!(zero.validate().is_err());
}

#[test]
fn test_low_watermark_rounds_down_without_overflow() {
    assert_eq!(FifoQueueConfig::default().with_capacity(5).low_watermark(), 0);
    assert_eq!(FifoQueueConfig::default().with_capacity(10).low_watermark(), 1);
    assert_eq!(FifoQueueConfig::default().with_capacity(1_234).low_watermark(), 123);

    let full = FifoQueueConfig {
        capacity: usize::MAX,
        low_watermark_percent: 100,
        ..FifoQueueConfig::default()
    };
    assert_eq!(full.low_watermark(), usize::MAX);

    let half = FifoQueueConfig {
        capacity: usize::MAX,
        low_watermark_percent: 50,
        ..FifoQueueConfig::default()
    };
    assert_eq!(half.low_watermark(), usize::MAX / 2);
}

#[test]
fn test_oversized_durations_saturate() {
    let pool = WorkerPoolConfig::new().with_join_timeout(Duration::MAX);
    assert_eq!(pool.join_timeout_ms, u64::MAX);
    assert_eq!(pool.join_timeout(), Duration::from_millis(u64::MAX));

    let queue = FifoQueueConfig::default().with_push_wait(Duration::MAX);
    assert_eq!(queue.push_wait_ms, u64::MAX);

    let exact = WorkerPoolConfig::new().with_join_timeout(Duration::from_millis(250));
    assert_eq!(exact.join_timeout_ms, 250);
}

#[test]
fn test_schedule_config_backoff_bounds() {
    let cfg = ScheduleConfig::default();
    assert_eq!(cfg.min_backoff(), Duration::from_secs(60));
    assert_eq!(cfg.max_backoff(), Duration::from_secs(3600));
    assert!(cfg.validate().is_ok());

    let inverted = ScheduleConfig {
        min_backoff_secs: 600,
        max_backoff_secs: 60,
        ..ScheduleConfig::default()
    };
    assert!(inverted.validate().is_err());
}

#[test]
fn test_from_json_partial_uses_defaults() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "schedule": { "merge": "earliest_wins" },
            "queue": { "capacity": 64 }
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.schedule.merge, MergePolicy::EarliestWins);
    assert_eq!(cfg.schedule.min_backoff_secs, 60);
    assert_eq!(cfg.queue.capacity, 64);
    assert_eq!(cfg.queue.retry_threshold, 3);
    assert_eq!(cfg.drudgers.thread_name_prefix, "drudger");
}

#[test]
fn test_from_json_empty_object() {
    let cfg = SchedulerConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
}

#[test]
fn test_from_json_rejects_invalid_values() {
    let err = SchedulerConfig::from_json_str(r#"{ "queue": { "capacity": 0 } }"#).unwrap_err();
    assert!(err.to_string().contains("queue: capacity must be greater than 0"));

    let err = SchedulerConfig::from_json_str(r#"{ "schedule": { "merge": "oldest" } }"#)
        .unwrap_err();
    assert!(err.to_string().starts_with("invalid configuration: parse error"));
}

#[test]
fn test_config_json_roundtrip() {
    let mut cfg = SchedulerConfig::default();
    cfg.workers = cfg.workers.with_worker_count(3);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_from_env_overrides() {
    // Only test in this binary that touches the process environment.
    std::env::set_var("DNSSEC_SCHED_WORKERS", "7");
    std::env::set_var("DNSSEC_SCHED_QUEUE_CAPACITY", "250");
    std::env::set_var("DNSSEC_SCHED_MERGE", "earliest_wins");

    let cfg = SchedulerConfig::from_env().unwrap();
    assert_eq!(cfg.workers.worker_count, 7);
    assert_eq!(cfg.queue.capacity, 250);
    assert_eq!(cfg.schedule.merge, MergePolicy::EarliestWins);

    std::env::set_var("DNSSEC_SCHED_WORKERS", "many");
    let err = SchedulerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("DNSSEC_SCHED_WORKERS"));

    std::env::set_var("DNSSEC_SCHED_WORKERS", "0");
    assert!(SchedulerConfig::from_env().is_err());

    for key in ["DNSSEC_SCHED_WORKERS", "DNSSEC_SCHED_QUEUE_CAPACITY", "DNSSEC_SCHED_MERGE"] {
        std::env::remove_var(key);
    }
}
