//! Schedulable tasks and their identities.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::clock;

/// Identity of a logical unit of work: a task class (e.g. `enforce`,
/// `sign`) and the owner it acts on (usually a zone name).
///
/// Two tasks with equal identities are the same work; the schedule keeps at
/// most one of them. Identities order by class, then owner, which breaks ties
/// between tasks due at the same instant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId {
    class: String,
    owner: String,
}

impl TaskId {
    /// Create an identity from a class and an owner name.
    pub fn new(class: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            owner: owner.into(),
        }
    }

    /// Task class.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Owner name.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.class, self.owner)
    }
}

/// A unit of work with an identity, a due time and an opaque payload.
///
/// Ownership moves into the [`Schedule`](crate::core::Schedule) on submit and
/// out to exactly one worker when it becomes due.
#[derive(Debug, Clone)]
pub struct Task<P> {
    id: TaskId,
    due: SystemTime,
    flush: bool,
    backoff: Duration,
    payload: P,
}

impl<P> Task<P> {
    /// Create a task due at `due`.
    pub const fn new(id: TaskId, due: SystemTime, payload: P) -> Self {
        Self {
            id,
            due,
            flush: false,
            backoff: Duration::ZERO,
            payload,
        }
    }

    /// Create a task due now.
    pub fn immediate(id: TaskId, payload: P) -> Self {
        Self::new(id, clock::now(), payload)
    }

    /// Create a task due `delay` from now.
    pub fn after(id: TaskId, delay: Duration, payload: P) -> Self {
        Self::new(id, clock::after(delay), payload)
    }

    /// Set the flush flag: a flushed task is due regardless of its due time.
    #[must_use]
    pub const fn with_flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    /// Identity.
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Scheduled due time.
    pub const fn due(&self) -> SystemTime {
        self.due
    }

    /// Whether the task is flushed.
    pub const fn is_flushed(&self) -> bool {
        self.flush
    }

    /// Current retry backoff, zero if the task has not failed.
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Payload.
    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// Mutable payload.
    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Consume the task, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Whether the task may run at `now`.
    pub fn is_due(&self, now: SystemTime) -> bool {
        self.flush || self.due <= now
    }

    /// Move the task to a new due time, clearing the flush flag. Used by
    /// executors that re-submit periodic work.
    #[must_use]
    pub const fn reschedule(mut self, due: SystemTime) -> Self {
        self.due = due;
        self.flush = false;
        self
    }

    /// Prepare a failed task for another attempt: the backoff starts at
    /// `min`, doubles on each call and is capped at `max`; the task becomes
    /// due `backoff` from now.
    #[must_use]
    pub fn retry_later(mut self, min: Duration, max: Duration) -> Self {
        self.backoff = if self.backoff.is_zero() {
            min
        } else {
            self.backoff.saturating_mul(2)
        }
        .min(max);
        self.due = clock::after(self.backoff);
        self.flush = false;
        self
    }

    /// Forget accumulated backoff after a successful run.
    pub fn reset_backoff(&mut self) {
        self.backoff = Duration::ZERO;
    }

    pub(crate) fn validate(&self) -> Result<(), SchedulerError> {
        if self.id.owner.is_empty() {
            return Err(SchedulerError::Assertion("task owner must not be empty"));
        }
        if self.id.class.is_empty() {
            return Err(SchedulerError::Assertion("task class must not be empty"));
        }
        Ok(())
    }

    pub(crate) const fn set_flush(&mut self) {
        self.flush = true;
    }

    pub(crate) const fn set_due(&mut self, due: SystemTime) {
        self.due = due;
    }
}

/// Due time of the earliest scheduled task, as reported by
/// [`Schedule::peek_earliest_due`](crate::core::Schedule::peek_earliest_due).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueTime {
    /// The earliest task is flushed and runs as soon as a worker is free.
    Now,
    /// The earliest task is due at this instant.
    At(SystemTime),
}

impl DueTime {
    /// Unix seconds, with `0` standing for a flushed task.
    #[must_use]
    pub fn as_unix_secs(self) -> i64 {
        match self {
            Self::Now => 0,
            Self::At(at) => clock::unix_secs(at),
        }
    }
}
