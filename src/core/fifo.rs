//! Bounded FIFO handoff queue with two-sided backpressure.
//!
//! Producers (workers decomposing a zone into signing sub-jobs) push
//! `(item, owner)` pairs; a fixed pool of drudgers pops them. Pushing never
//! blocks: a full queue hands the item back with [`Status::Unchanged`] and the
//! producer decides whether to retry or wait.
//!
//! Two condition variables share the queue mutex:
//!
//! - `non_empty` is broadcast when the queue goes from empty to one item, and
//!   again by a producer that has failed more than `retry_threshold` times in
//!   a row, in case a wakeup was missed while the queue was saturated
//! - `below_low_watermark` is broadcast once per full-to-low transition, when
//!   occupancy drops to the low watermark (10% of capacity by default), rather
//!   than on every pop

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::config::FifoQueueConfig;
use crate::core::{SchedulerError, Status};

/// Result of a push.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub enum Push<T, O> {
    /// The item was appended at the tail.
    Queued,
    /// The queue was full; the item and owner are handed back.
    Full {
        /// Rejected item.
        item: T,
        /// Its owner.
        owner: O,
    },
}

impl<T, O> Push<T, O> {
    /// `Status::Ok` if queued, `Status::Unchanged` if the queue was full.
    pub const fn status(&self) -> Status {
        match self {
            Self::Queued => Status::Ok,
            Self::Full { .. } => Status::Unchanged,
        }
    }

    /// Whether the item was queued.
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }

    /// The rejected item and owner, if any.
    pub fn into_rejected(self) -> Option<(T, O)> {
        match self {
            Self::Queued => None,
            Self::Full { item, owner } => Some((item, owner)),
        }
    }
}

/// Broadcast and throughput counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items accepted.
    pub pushed: u64,
    /// Items handed to consumers.
    pub popped: u64,
    /// `non_empty` broadcasts on the empty-to-one transition.
    pub non_empty_signals: u64,
    /// `non_empty` re-broadcasts triggered by the retry threshold.
    pub escalations: u64,
    /// `below_low_watermark` broadcasts.
    pub low_watermark_signals: u64,
}

#[derive(Debug, Default)]
struct QueueCounters {
    pushed: AtomicU64,
    popped: AtomicU64,
    non_empty_signals: AtomicU64,
    escalations: AtomicU64,
    low_watermark_signals: AtomicU64,
}

impl QueueCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueueStats {
        QueueStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            non_empty_signals: self.non_empty_signals.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            low_watermark_signals: self.low_watermark_signals.load(Ordering::Relaxed),
        }
    }
}

struct Slots<T, O> {
    items: VecDeque<(T, O)>,
    /// Set once the queue reaches capacity, cleared by the low-watermark broadcast.
    was_full: bool,
}

/// Slots reserved up front; larger queues grow on demand.
const PREALLOC_LIMIT: usize = 4096;

/// Bounded FIFO of `(item, owner)` pairs.
pub struct FifoQueue<T, O> {
    capacity: usize,
    retry_threshold: u32,
    low_watermark: usize,
    push_wait: Duration,
    slots: Mutex<Slots<T, O>>,
    non_empty: Condvar,
    below_low_watermark: Condvar,
    counters: QueueCounters,
}

impl<T, O> FifoQueue<T, O> {
    /// Create a queue holding at most `capacity` items, with default
    /// threshold, watermark and producer wait.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Assertion` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, SchedulerError> {
        if capacity == 0 {
            return Err(SchedulerError::Assertion("queue capacity must be greater than 0"));
        }
        Self::with_config(&FifoQueueConfig::default().with_capacity(capacity))
    }

    /// Create a queue from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: &FifoQueueConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            retry_threshold: config.retry_threshold,
            low_watermark: config.low_watermark(),
            push_wait: config.push_wait(),
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(config.capacity.min(PREALLOC_LIMIT)),
                was_full: false,
            }),
            non_empty: Condvar::new(),
            below_low_watermark: Condvar::new(),
            counters: QueueCounters::default(),
        })
    }

    /// Maximum number of items.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy at or below which waiting producers are woken.
    pub const fn low_watermark(&self) -> usize {
        self.low_watermark
    }

    /// Acquire the queue lock, to combine a check with a condition wait.
    pub fn lock(&self) -> FifoGuard<'_, T, O> {
        FifoGuard {
            slots: self.slots.lock(),
            queue: self,
        }
    }

    /// Lock and push. See [`FifoGuard::push`].
    pub fn push(&self, item: T, owner: O, tries: &mut u32) -> Push<T, O> {
        self.lock().push(item, owner, tries)
    }

    /// Lock and pop. See [`FifoGuard::pop`].
    pub fn pop(&self) -> Option<(T, O)> {
        self.lock().pop()
    }

    /// Drop every queued item without notifying anyone. Only for
    /// (re)initialization.
    pub fn wipe(&self) {
        self.lock().wipe();
    }

    /// Push, and while the queue is full wait for the low-watermark
    /// broadcast (at most the configured producer wait) before retrying.
    ///
    /// Gives up only when `must_exit` is raised, returning the item. Whoever
    /// raises it should call [`wake_producers`](Self::wake_producers).
    pub fn push_with_backpressure(&self, item: T, owner: O, must_exit: &AtomicBool) -> Push<T, O> {
        let mut tries = 0;
        let mut pending = (item, owner);
        let mut guard = self.lock();
        loop {
            match guard.push(pending.0, pending.1, &mut tries) {
                Push::Queued => return Push::Queued,
                Push::Full { item, owner } => {
                    if must_exit.load(Ordering::Acquire) {
                        return Push::Full { item, owner };
                    }
                    guard.wait_below_low_watermark(Some(self.push_wait));
                    pending = (item, owner);
                }
            }
        }
    }

    /// Wake every consumer waiting for items, e.g. on shutdown.
    pub fn wake_consumers(&self) {
        let _slots = self.slots.lock();
        self.non_empty.notify_all();
    }

    /// Wake every producer waiting for room, e.g. on shutdown.
    pub fn wake_producers(&self) {
        let _slots = self.slots.lock();
        self.below_low_watermark.notify_all();
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.slots.lock().items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot.
    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }
}

/// Exclusive access to a [`FifoQueue`].
pub struct FifoGuard<'a, T, O> {
    slots: MutexGuard<'a, Slots<T, O>>,
    queue: &'a FifoQueue<T, O>,
}

impl<T, O> FifoGuard<'_, T, O> {
    /// Append `(item, owner)` at the tail, or hand them back if the queue is
    /// full.
    ///
    /// `tries` belongs to the producer and counts consecutive full pushes.
    /// Once it exceeds the retry threshold the push re-broadcasts `non_empty`
    /// and resets it; a successful push also resets it.
    pub fn push(&mut self, item: T, owner: O, tries: &mut u32) -> Push<T, O> {
        let queue = self.queue;
        if self.slots.items.len() >= queue.capacity {
            self.slots.was_full = true;
            *tries += 1;
            if *tries > queue.retry_threshold {
                queue.non_empty.notify_all();
                QueueCounters::bump(&queue.counters.escalations);
                debug!(tries = *tries, "queue saturated, re-broadcasting to consumers");
                *tries = 0;
            }
            return Push::Full { item, owner };
        }

        *tries = 0;
        self.slots.items.push_back((item, owner));
        QueueCounters::bump(&queue.counters.pushed);
        let len = self.slots.items.len();
        if len == 1 {
            queue.non_empty.notify_all();
            QueueCounters::bump(&queue.counters.non_empty_signals);
        }
        if len == queue.capacity {
            self.slots.was_full = true;
        }
        Push::Queued
    }

    /// Remove the head item and its owner, `None` if the queue is empty.
    /// Never blocks.
    pub fn pop(&mut self) -> Option<(T, O)> {
        let queue = self.queue;
        let head = self.slots.items.pop_front()?;
        QueueCounters::bump(&queue.counters.popped);
        if self.slots.was_full && self.slots.items.len() <= queue.low_watermark {
            self.slots.was_full = false;
            queue.below_low_watermark.notify_all();
            QueueCounters::bump(&queue.counters.low_watermark_signals);
        }
        Some(head)
    }

    /// Drop every queued item without notifying anyone.
    pub fn wipe(&mut self) {
        self.slots.items.clear();
        self.slots.was_full = false;
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.slots.items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.items.is_empty()
    }

    /// Whether the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.slots.items.len() >= self.queue.capacity
    }

    /// Release the lock and sleep until `non_empty` is broadcast or
    /// `timeout` passes (`None` waits indefinitely). Returns `false` on
    /// timeout. Wakes may be spurious; re-check after returning.
    pub fn wait_non_empty(&mut self, timeout: Option<Duration>) -> bool {
        wait(&self.queue.non_empty, &mut self.slots, timeout)
    }

    /// Release the lock and sleep until `below_low_watermark` is broadcast
    /// or `timeout` passes. Returns `false` on timeout.
    pub fn wait_below_low_watermark(&mut self, timeout: Option<Duration>) -> bool {
        wait(&self.queue.below_low_watermark, &mut self.slots, timeout)
    }
}

fn wait<S>(cond: &Condvar, guard: &mut MutexGuard<'_, S>, timeout: Option<Duration>) -> bool {
    match timeout {
        Some(timeout) => !cond.wait_for(guard, timeout).timed_out(),
        None => {
            cond.wait(guard);
            true
        }
    }
}
