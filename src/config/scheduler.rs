//! Schedule, pool and queue configuration structures.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// How a submission is merged with a task of the same identity that is
/// already scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Last write wins: the new task replaces the old one entirely.
    #[default]
    Replace,
    /// The new payload is kept but the earlier of both due times applies,
    /// and the task stays flushed if either was.
    EarliestWins,
}

impl FromStr for MergePolicy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "earliest_wins" => Ok(Self::EarliestWins),
            other => Err(SchedulerError::InvalidConfig(format!("unknown merge policy `{other}`"))),
        }
    }
}

/// Schedule behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Merge policy for duplicate identities.
    pub merge: MergePolicy,
    /// First retry delay for a failed task, in seconds.
    pub min_backoff_secs: u64,
    /// Upper bound for the retry delay, in seconds.
    pub max_backoff_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            merge: MergePolicy::Replace,
            min_backoff_secs: 60,
            max_backoff_secs: 3600,
        }
    }
}

impl ScheduleConfig {
    /// First retry delay.
    #[must_use]
    pub const fn min_backoff(&self) -> Duration {
        Duration::from_secs(self.min_backoff_secs)
    }

    /// Retry delay cap.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    /// Validate backoff bounds.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` when the bounds are zero or inverted.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.min_backoff_secs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "min_backoff_secs must be greater than 0".into(),
            ));
        }
        if self.min_backoff_secs > self.max_backoff_secs {
            return Err(SchedulerError::InvalidConfig(
                "min_backoff_secs must not exceed max_backoff_secs".into(),
            ));
        }
        Ok(())
    }
}

/// Thread pool configuration, shared by the schedule workers and the drudgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of threads in the pool.
    pub worker_count: usize,
    /// Thread names are `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Stack size of each thread in bytes.
    pub thread_stack_size: usize,
    /// How long `join` waits for the pool's threads to exit, in milliseconds.
    pub join_timeout_ms: u64,
}

/// Drudger pools use the same knobs as worker pools.
pub type DrudgerPoolConfig = WorkerPoolConfig;

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPoolConfig {
    /// Defaults for a schedule worker pool: one thread per CPU.
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_count: num_cpus::get(),
            thread_name_prefix: "worker".into(),
            thread_stack_size: 2 * 1024 * 1024,
            join_timeout_ms: 2000,
        }
    }

    /// Defaults for a drudger pool.
    #[must_use]
    pub fn drudgers() -> Self {
        Self::new().with_thread_name_prefix("drudger")
    }

    /// Set the number of threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the per-thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set how long `join` waits for the pool's threads, saturating at `u64::MAX` ms.
    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = millis(timeout);
        self
    }

    /// How long `join` waits for the pool's threads.
    #[must_use]
    pub const fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` for an empty pool or a zero stack.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.worker_count == 0 {
            return Err(SchedulerError::InvalidConfig(
                "worker_count must be greater than 0".into(),
            ));
        }
        if self.thread_stack_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "thread_stack_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Bounded handoff queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FifoQueueConfig {
    /// Maximum number of queued items.
    pub capacity: usize,
    /// Failed pushes tolerated before a producer re-broadcasts `non_empty`.
    pub retry_threshold: u32,
    /// Occupancy, in percent of capacity, at or below which producers are woken.
    pub low_watermark_percent: u8,
    /// Longest a backpressured producer sleeps before retrying, in milliseconds.
    pub push_wait_ms: u64,
}

impl Default for FifoQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            retry_threshold: 3,
            low_watermark_percent: 10,
            push_wait_ms: 5000,
        }
    }
}

impl FifoQueueConfig {
    /// Set the capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the producer wait between retries.
    #[must_use]
    pub fn with_push_wait(mut self, wait: Duration) -> Self {
        self.push_wait_ms = millis(wait);
        self
    }

    /// Producer wait between retries.
    #[must_use]
    pub const fn push_wait(&self) -> Duration {
        Duration::from_millis(self.push_wait_ms)
    }

    /// Occupancy at or below which waiting producers are woken, rounded down.
    #[must_use]
    pub fn low_watermark(&self) -> usize {
        let pct = usize::from(self.low_watermark_percent);
        self.capacity / 100 * pct + self.capacity % 100 * pct / 100
    }

    /// Validate queue configuration values.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` for a zero capacity or a
    /// watermark outside `1..=100`.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.capacity == 0 {
            return Err(SchedulerError::InvalidConfig("capacity must be greater than 0".into()));
        }
        if !(1..=100).contains(&self.low_watermark_percent) {
            return Err(SchedulerError::InvalidConfig(
                "low_watermark_percent must be within 1..=100".into(),
            ));
        }
        Ok(())
    }
}

/// Root configuration for one enforcer or signer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Schedule behaviour.
    pub schedule: ScheduleConfig,
    /// Schedule-driven worker pool.
    pub workers: WorkerPoolConfig,
    /// FifoQueue consumer pool.
    pub drudgers: DrudgerPoolConfig,
    /// Handoff queue between workers and drudgers.
    pub queue: FifoQueueConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            workers: WorkerPoolConfig::new(),
            drudgers: WorkerPoolConfig::drudgers(),
            queue: FifoQueueConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first section error, prefixed with the section name.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let prefixed = |section: &str, e: SchedulerError| match e {
            SchedulerError::InvalidConfig(msg) => {
                SchedulerError::InvalidConfig(format!("{section}: {msg}"))
            }
            other => other,
        };
        self.schedule.validate().map_err(|e| prefixed("schedule", e))?;
        self.workers.validate().map_err(|e| prefixed("workers", e))?;
        self.drudgers.validate().map_err(|e| prefixed("drudgers", e))?;
        self.queue.validate().map_err(|e| prefixed("queue", e))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing sections
    /// and fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by `DNSSEC_SCHED_*`
    /// environment variables. A `.env` file in the working directory is
    /// loaded first if present.
    ///
    /// Recognised variables: `DNSSEC_SCHED_WORKERS`, `DNSSEC_SCHED_DRUDGERS`,
    /// `DNSSEC_SCHED_QUEUE_CAPACITY`, `DNSSEC_SCHED_MERGE`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` when a variable does not parse
    /// or the result fails validation.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(n) = env_parse("DNSSEC_SCHED_WORKERS")? {
            cfg.workers.worker_count = n;
        }
        if let Some(n) = env_parse("DNSSEC_SCHED_DRUDGERS")? {
            cfg.drudgers.worker_count = n;
        }
        if let Some(n) = env_parse("DNSSEC_SCHED_QUEUE_CAPACITY")? {
            cfg.queue.capacity = n;
        }
        if let Some(policy) = env_parse("DNSSEC_SCHED_MERGE")? {
            cfg.schedule.merge = policy;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn env_parse<T>(key: &str) -> Result<Option<T>, SchedulerError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| SchedulerError::InvalidConfig(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}
