//! Per-owner accounting of sub-jobs handed to drudgers.
//!
//! A worker that splits a zone into signing jobs is the owner of those jobs.
//! It appoints each job on its ledger before pushing it, drudgers report
//! completion or failure back to the ledger, and the worker waits until every
//! appointed job has settled before it finishes the zone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Interval at which a waiting owner re-checks its exit flag.
const EXIT_RECHECK: Duration = Duration::from_millis(100);

/// Counts for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobTally {
    /// Jobs handed out.
    pub appointed: u64,
    /// Jobs finished successfully.
    pub completed: u64,
    /// Jobs that failed.
    pub failed: u64,
}

impl JobTally {
    /// Whether every appointed job has completed or failed.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.completed + self.failed >= self.appointed
    }

    /// Jobs still in flight.
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.appointed.saturating_sub(self.completed + self.failed)
    }
}

/// Job counters plus the condition variable the owner sleeps on.
#[derive(Debug, Default)]
pub struct JobLedger {
    tally: Mutex<JobTally>,
    settled: Condvar,
}

impl JobLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more job handed out.
    pub fn appoint(&self) {
        self.tally.lock().appointed += 1;
    }

    /// Record a finished job.
    pub fn complete(&self) {
        let mut tally = self.tally.lock();
        tally.completed += 1;
        if tally.is_settled() {
            self.settled.notify_all();
        }
    }

    /// Record a failed job.
    pub fn fail(&self) {
        let mut tally = self.tally.lock();
        tally.failed += 1;
        if tally.is_settled() {
            self.settled.notify_all();
        }
    }

    /// Current counts.
    pub fn tally(&self) -> JobTally {
        *self.tally.lock()
    }

    /// Block until every appointed job has settled or `must_exit` is raised,
    /// and return the counts at that point.
    pub fn wait_settled(&self, must_exit: &AtomicBool) -> JobTally {
        let mut tally = self.tally.lock();
        while !tally.is_settled() && !must_exit.load(Ordering::Acquire) {
            let _ = self.settled.wait_for(&mut tally, EXIT_RECHECK);
        }
        *tally
    }

    /// Clear the counts before the owner starts its next batch.
    pub fn reset(&self) {
        *self.tally.lock() = JobTally::default();
    }
}
