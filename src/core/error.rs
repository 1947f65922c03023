//! Error types for schedule, queue and pool operations.

use std::fmt;
use std::io;

use thiserror::Error;

/// Errors produced by the schedule and the handoff queue.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A caller violated an argument contract.
    #[error("assertion failed: {0}")]
    Assertion(&'static str),
    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur when starting, stopping or joining a thread pool.
#[derive(Debug)]
pub enum PoolError {
    /// Configuration validation failed.
    InvalidConfig(String),

    /// The OS refused to spawn a pool thread.
    Spawn {
        /// Name of the thread that could not be created.
        name: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// `join` was called on a pool whose threads were already joined.
    AlreadyJoined,

    /// One or more pool threads panicked outside of task execution.
    WorkerPanicked(usize),

    /// Pool threads still running when the join timeout expired.
    JoinTimeout(usize),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Spawn { name, source } => write!(f, "failed to spawn thread `{name}`: {source}"),
            Self::AlreadyJoined => write!(f, "pool threads already joined"),
            Self::WorkerPanicked(count) => write!(f, "{count} pool thread(s) panicked"),
            Self::JoinTimeout(count) => {
                write!(f, "{count} pool thread(s) still running after join timeout")
            }
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SchedulerError> for PoolError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidConfig(msg) => Self::InvalidConfig(msg),
            SchedulerError::Assertion(msg) => Self::InvalidConfig(msg.to_string()),
        }
    }
}

/// Application-facing result used by task executors and drudges.
pub type AppResult<T> = Result<T, anyhow::Error>;
