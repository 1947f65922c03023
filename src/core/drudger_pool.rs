//! Fixed-size pool of drudgers consuming a [`FifoQueue`].
//!
//! Drudgers sleep on the queue's `non_empty` condition, take one sub-job at a
//! time, run it through the caller's [`Drudge`] outside the queue lock and
//! report the outcome to the job owner's [`JobLedger`].
//!
//! Jobs still queued when the pool exits are failed on their owner's ledger,
//! so a producer waiting for its jobs to settle is never left hanging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::DrudgerPoolConfig;
use crate::core::executor::Drudge;
use crate::core::worker_pool::{run_contained, thread_runtime, PoolThreads, WorkerCounters};
use crate::core::{FifoGuard, FifoQueue, JobLedger, PoolError, PoolStats};

/// Queue type drudgers consume: each job is owned by the ledger of the
/// worker that produced it.
pub type SignQueue<J> = FifoQueue<J, Arc<JobLedger>>;

/// Pool of threads draining a [`SignQueue`].
pub struct DrudgerPool<J> {
    queue: Arc<SignQueue<J>>,
    must_exit: Arc<AtomicBool>,
    threads: PoolThreads,
}

impl<J> DrudgerPool<J>
where
    J: Send + 'static,
{
    /// Start `config.worker_count` drudgers on `queue`, each with its own
    /// clone of `drudge` and `context`.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Spawn` if a thread cannot be created
    pub fn start<D, C>(
        config: &DrudgerPoolConfig,
        queue: Arc<SignQueue<J>>,
        drudge: D,
        context: C,
    ) -> Result<Self, PoolError>
    where
        D: Drudge<J, C>,
        C: Clone + Send + 'static,
    {
        config.validate()?;
        let must_exit = Arc::new(AtomicBool::new(false));

        let threads = PoolThreads::spawn_all(config, |id, counters| {
            let drudger = Drudger {
                id,
                queue: Arc::clone(&queue),
                drudge: drudge.clone(),
                context: context.clone(),
                must_exit: Arc::clone(&must_exit),
                counters,
            };
            move || drudger.run()
        })
        .inspect_err(|_| {
            must_exit.store(true, Ordering::Release);
            queue.wake_consumers();
        })?;

        info!(
            drudger_count = config.worker_count,
            capacity = queue.capacity(),
            "DrudgerPool started"
        );

        Ok(Self {
            queue,
            must_exit,
            threads,
        })
    }

    /// Tell every drudger to stop taking jobs and wake the idle ones. Also
    /// wakes producers parked on a full queue. Jobs still queued are failed
    /// on their owner's ledger.
    pub fn request_exit(&self) {
        if !self.must_exit.swap(true, Ordering::AcqRel) {
            info!("Drudger pool exit requested");
        }
        let failed = fail_queued(&mut self.queue.lock());
        if failed > 0 {
            info!(failed, "Failed jobs left in queue at exit");
        }
        self.queue.wake_consumers();
        self.queue.wake_producers();
    }

    /// Wait for every drudger to leave.
    ///
    /// # Errors
    ///
    /// - `PoolError::AlreadyJoined` once every drudger has been joined
    /// - `PoolError::JoinTimeout` if drudgers are still running at the
    ///   deadline; calling `join` again keeps waiting for them
    /// - `PoolError::WorkerPanicked` if a drudger died outside job execution
    pub fn join(&self) -> Result<(), PoolError> {
        let joined = self.threads.join();
        if self.must_exit.load(Ordering::Acquire) {
            let failed = fail_queued(&mut self.queue.lock());
            if failed > 0 {
                info!(failed, "Failed jobs queued after drudgers left");
            }
        }
        joined
    }

    /// [`request_exit`](Self::request_exit) followed by [`join`](Self::join).
    ///
    /// # Errors
    ///
    /// See [`join`](Self::join).
    pub fn shutdown(&self) -> Result<(), PoolError> {
        self.request_exit();
        self.join()
    }

    /// Number of drudger threads.
    pub fn drudger_count(&self) -> usize {
        self.threads.len()
    }

    /// The queue this pool drains.
    pub const fn queue(&self) -> &Arc<SignQueue<J>> {
        &self.queue
    }

    /// Per-drudger counters.
    pub fn stats(&self) -> PoolStats {
        self.threads.stats()
    }
}

impl<J> Drop for DrudgerPool<J> {
    fn drop(&mut self) {
        if !self.must_exit.swap(true, Ordering::AcqRel) {
            fail_queued(&mut self.queue.lock());
            self.queue.wake_consumers();
            self.queue.wake_producers();
            debug!("DrudgerPool dropped without explicit shutdown - drudgers will be detached");
        }
    }
}

/// Pop every queued job and fail it on its owner's ledger.
fn fail_queued<J>(guard: &mut FifoGuard<'_, J, Arc<JobLedger>>) -> usize {
    let mut failed = 0;
    while let Some((_, owner)) = guard.pop() {
        owner.fail();
        failed += 1;
    }
    failed
}

struct Drudger<J, D, C> {
    id: usize,
    queue: Arc<SignQueue<J>>,
    drudge: D,
    context: C,
    must_exit: Arc<AtomicBool>,
    counters: Arc<WorkerCounters>,
}

impl<J, D, C> Drudger<J, D, C>
where
    J: Send + 'static,
    D: Drudge<J, C>,
    C: Send + 'static,
{
    fn run(mut self) {
        debug!(drudger_id = self.id, "Drudger thread started");

        let rt = match thread_runtime() {
            Ok(rt) => rt,
            Err(e) => {
                error!(drudger_id = self.id, error = %e, "Failed to create drudger runtime");
                return;
            }
        };

        while let Some((job, owner)) = self.next_job() {
            let outcome = run_contained(&rt, self.drudge.drudge(job, &mut self.context));
            match &outcome {
                Ok(()) => owner.complete(),
                Err(e) => {
                    debug!(drudger_id = self.id, error = %e, "Job failed");
                    owner.fail();
                }
            }
            self.counters.record(&outcome);
        }

        debug!(drudger_id = self.id, "Drudger thread exiting");
    }

    /// Block until a job is available, `None` once exit is requested.
    fn next_job(&self) -> Option<(J, Arc<JobLedger>)> {
        let mut guard = self.queue.lock();
        loop {
            if self.must_exit.load(Ordering::Acquire) {
                let failed = fail_queued(&mut guard);
                if failed > 0 {
                    debug!(drudger_id = self.id, failed, "Failed queued jobs on exit");
                }
                return None;
            }
            if let Some(job) = guard.pop() {
                return Some(job);
            }
            guard.wait_non_empty(None);
        }
    }
}
