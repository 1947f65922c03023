//! Time-ordered task schedule shared by a pool of workers.
//!
//! The schedule keeps at most one task per [`TaskId`] and hands tasks out in
//! `(due time, identity)` order once they are due. Flushed tasks sort ahead
//! of everything else, in the order they were flushed.
//!
//! # Design
//!
//! - One `parking_lot::Mutex` guards the ordered map and the identity index
//! - One `parking_lot::Condvar` wakes all blocked workers when a new earliest
//!   task arrives, on flush or purge, and on shutdown
//! - Workers recompute their wait target on every wake; wakes may be spurious

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{info, trace};

use crate::config::MergePolicy;
use crate::core::task::{DueTime, Task, TaskId};
use crate::core::SchedulerError;
use crate::util::clock;

/// Position of a task in the ordering. Flushed tasks come first, ordered by
/// the sequence in which they were flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Flushed(u64),
    At(SystemTime),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    slot: Slot,
    id: TaskId,
}

/// What a worker should do about the earliest entry.
enum Wait {
    Ready,
    Empty,
    For(Duration),
}

/// State guarded by the schedule mutex.
struct Entries<P> {
    by_key: BTreeMap<Key, Task<P>>,
    by_id: HashMap<TaskId, Slot>,
    flush_seq: u64,
}

impl<P> Entries<P> {
    fn new() -> Self {
        Self {
            by_key: BTreeMap::new(),
            by_id: HashMap::new(),
            flush_seq: 0,
        }
    }

    fn len(&self) -> usize {
        self.by_key.len()
    }

    fn next_flush_slot(&mut self) -> Slot {
        self.flush_seq += 1;
        Slot::Flushed(self.flush_seq)
    }

    /// Insert a task whose identity is not present. Returns whether it became
    /// the earliest entry.
    fn insert(&mut self, task: Task<P>) -> bool {
        let slot = if task.is_flushed() {
            self.next_flush_slot()
        } else {
            Slot::At(task.due())
        };
        let key = Key {
            slot,
            id: task.id().clone(),
        };
        let earliest = self.by_key.first_key_value().is_none_or(|(first, _)| key < *first);
        self.by_id.insert(key.id.clone(), slot);
        self.by_key.insert(key, task);
        earliest
    }

    fn remove(&mut self, id: &TaskId) -> Option<Task<P>> {
        let slot = self.by_id.remove(id)?;
        self.by_key.remove(&Key {
            slot,
            id: id.clone(),
        })
    }

    fn pop_first(&mut self) -> Option<Task<P>> {
        let (key, task) = self.by_key.pop_first()?;
        self.by_id.remove(&key.id);
        Some(task)
    }

    fn wait_for_first(&self, now: SystemTime) -> Wait {
        match self.by_key.first_key_value() {
            None => Wait::Empty,
            Some((key, _)) => match key.slot {
                Slot::Flushed(_) => Wait::Ready,
                Slot::At(due) => match due.duration_since(now) {
                    Ok(left) if !left.is_zero() => Wait::For(left),
                    _ => Wait::Ready,
                },
            },
        }
    }

    fn earliest_due(&self) -> Option<DueTime> {
        self.by_key.first_key_value().map(|(key, _)| match key.slot {
            Slot::Flushed(_) => DueTime::Now,
            Slot::At(due) => DueTime::At(due),
        })
    }

    /// Re-key every entry as flushed, keeping the current relative order.
    fn flush_all(&mut self) {
        let drained = std::mem::take(&mut self.by_key);
        self.by_id.clear();
        for (_, mut task) in drained {
            task.set_flush();
            self.insert(task);
        }
    }

    fn clear(&mut self) -> usize {
        let purged = self.by_key.len();
        self.by_key.clear();
        self.by_id.clear();
        purged
    }
}

/// Time-ordered, identity-deduplicated task schedule.
///
/// Share it between producers and a [`WorkerPool`](crate::core::WorkerPool)
/// through an `Arc`.
pub struct Schedule<P> {
    policy: MergePolicy,
    entries: Mutex<Entries<P>>,
    cond: Condvar,
}

impl<P> Default for Schedule<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Schedule<P> {
    /// Create an empty schedule with [`MergePolicy::Replace`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(MergePolicy::Replace)
    }

    /// Create an empty schedule with the given merge policy.
    #[must_use]
    pub fn with_policy(policy: MergePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(Entries::new()),
            cond: Condvar::new(),
        }
    }

    /// Merge policy applied to duplicate identities.
    pub const fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Acquire the schedule lock, for callers that need several operations
    /// to happen atomically.
    pub fn lock(&self) -> ScheduleGuard<'_, P> {
        ScheduleGuard {
            entries: self.entries.lock(),
            schedule: self,
        }
    }

    /// Lock the schedule and submit `task`.
    ///
    /// A task with the same identity already in the schedule is merged
    /// according to the schedule's [`MergePolicy`]. If the task becomes the
    /// earliest entry, all blocked workers are woken so they can recompute
    /// their wait.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Assertion` if the task identity has an empty
    /// class or owner.
    pub fn lock_and_submit(&self, task: Task<P>, log_event: bool) -> Result<(), SchedulerError> {
        self.lock().submit(task, log_event)
    }

    /// Remove and return the earliest task once it is due, blocking until
    /// then.
    ///
    /// Waits indefinitely while the schedule is empty and until the earliest
    /// due time otherwise, re-evaluating after every wake. Returns `None`
    /// only once `must_exit` is observed; the flag is checked before each
    /// wait and after each wake, so raise it and then call
    /// [`wake_all`](Self::wake_all).
    pub fn pop_due(&self, must_exit: &AtomicBool) -> Option<Task<P>> {
        let mut entries = self.entries.lock();
        loop {
            if must_exit.load(Ordering::Acquire) {
                return None;
            }
            match entries.wait_for_first(clock::now()) {
                Wait::Ready => return entries.pop_first(),
                Wait::Empty => self.cond.wait(&mut entries),
                Wait::For(left) => {
                    let _ = self.cond.wait_for(&mut entries, left);
                }
            }
        }
    }

    /// Remove and return the earliest task if it is due now, without blocking.
    pub fn try_pop_due(&self) -> Option<Task<P>> {
        let mut entries = self.entries.lock();
        match entries.wait_for_first(clock::now()) {
            Wait::Ready => entries.pop_first(),
            Wait::Empty | Wait::For(_) => None,
        }
    }

    /// Due time of the earliest task, `None` if the schedule is empty.
    pub fn peek_earliest_due(&self) -> Option<DueTime> {
        self.entries.lock().earliest_due()
    }

    /// Mark every scheduled task as due now and wake all workers. No task is
    /// dropped and identities stay addressable.
    pub fn flush(&self) {
        let mut entries = self.entries.lock();
        entries.flush_all();
        info!(tasks = entries.len(), "flushed schedule");
        self.cond.notify_all();
    }

    /// Flush the single task with identity `id`. Returns whether it was found.
    pub fn flush_id(&self, id: &TaskId) -> bool {
        let mut entries = self.entries.lock();
        let Some(mut task) = entries.remove(id) else {
            return false;
        };
        task.set_flush();
        if entries.insert(task) {
            self.cond.notify_all();
        }
        true
    }

    /// Drop every task without running it. Returns how many were removed.
    ///
    /// Meant for orderly shutdown or reset; a worker that wakes to an empty
    /// schedule simply waits again.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.lock();
        let purged = entries.clear();
        info!(tasks = purged, "purged schedule");
        self.cond.notify_all();
        purged
    }

    /// Whether a task with identity `id` is scheduled.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.entries.lock().by_id.contains_key(id)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake every blocked [`pop_due`](Self::pop_due) caller so it re-checks
    /// its exit flag.
    pub fn wake_all(&self) {
        let _entries = self.entries.lock();
        self.cond.notify_all();
    }
}

/// Exclusive access to a [`Schedule`] for callers that already hold its lock.
pub struct ScheduleGuard<'a, P> {
    entries: MutexGuard<'a, Entries<P>>,
    schedule: &'a Schedule<P>,
}

impl<P> ScheduleGuard<'_, P> {
    /// Submit `task` under the held lock. See
    /// [`Schedule::lock_and_submit`].
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Assertion` if the task identity has an empty
    /// class or owner.
    pub fn submit(&mut self, mut task: Task<P>, log_event: bool) -> Result<(), SchedulerError> {
        task.validate()?;

        let merged = if let Some(existing) = self.entries.remove(task.id()) {
            if self.schedule.policy == MergePolicy::EarliestWins {
                if existing.is_flushed() {
                    task.set_flush();
                }
                if existing.due() < task.due() {
                    task.set_due(existing.due());
                }
            }
            true
        } else {
            false
        };

        let due = clock::unix_secs(task.due());
        if log_event {
            info!(task = %task.id(), due, flush = task.is_flushed(), merged, "scheduled task");
        } else {
            trace!(task = %task.id(), due, flush = task.is_flushed(), merged, "scheduled task");
        }

        if self.entries.insert(task) {
            self.schedule.cond.notify_all();
        }
        Ok(())
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Due time of the earliest task.
    pub fn peek_earliest_due(&self) -> Option<DueTime> {
        self.entries.earliest_due()
    }
}
