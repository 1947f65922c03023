//! Schedule-driven worker pool on dedicated OS threads.
//!
//! Each worker blocks in [`Schedule::pop_due`], runs the due task through the
//! caller's [`TaskExecutor`] and goes back for the next one. Workers share
//! one exit flag; raising it and broadcasting the schedule's condition
//! variable makes every idle worker leave, while a busy worker finishes its
//! current task first.
//!
//! # Design Principles
//!
//! - **No polling**: idle workers sleep on the schedule's Condvar
//! - **Own runtime per thread**: async executors run on a current-thread tokio
//!   runtime owned by the worker, never on the caller's runtime
//! - **Bounded shutdown**: `join` gives up on threads that overrun their
//!   timeout and reports them, keeping their handles for a later `join`

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::executor::TaskExecutor;
use crate::core::{AppResult, PoolError, Schedule};

/// Per-thread outcome counters.
#[derive(Debug, Default)]
pub(crate) struct WorkerCounters {
    pub completed: AtomicU64,
    pub failed: AtomicU64,
}

impl WorkerCounters {
    pub fn record(&self, outcome: &AppResult<()>) {
        match outcome {
            Ok(()) => self.completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Snapshot of one pool thread's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    /// Position of the thread in its pool.
    pub id: usize,
    /// Thread name.
    pub name: String,
    /// Tasks (or sub-jobs) that finished successfully.
    pub tasks_completed: u64,
    /// Tasks (or sub-jobs) that returned an error or panicked.
    pub tasks_failed: u64,
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// One entry per thread, ordered by id.
    pub workers: Vec<WorkerStats>,
}

impl PoolStats {
    /// Completed tasks across all threads.
    #[must_use]
    pub fn total_completed(&self) -> u64 {
        self.workers.iter().map(|w| w.tasks_completed).sum()
    }

    /// Failed tasks across all threads.
    #[must_use]
    pub fn total_failed(&self) -> u64 {
        self.workers.iter().map(|w| w.tasks_failed).sum()
    }
}

struct ThreadSlot {
    id: usize,
    name: String,
    counters: Arc<WorkerCounters>,
}

/// Sends the thread's id when dropped, so an exit is reported even when the
/// thread unwinds.
struct ExitSignal {
    id: usize,
    tx: Sender<usize>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.tx.send(self.id);
    }
}

/// Thread bookkeeping shared by the worker and drudger pools.
pub(crate) struct PoolThreads {
    config: WorkerPoolConfig,
    slots: Vec<ThreadSlot>,
    /// Handles not joined yet; `None` once every thread has been joined.
    handles: Mutex<Option<Vec<(usize, JoinHandle<()>)>>>,
    exited: Receiver<usize>,
}

impl PoolThreads {
    /// Spawn `config.worker_count` named threads, each running the body
    /// returned by `make_body` for its id and counters.
    pub fn spawn_all<F, B>(config: &WorkerPoolConfig, mut make_body: F) -> Result<Self, PoolError>
    where
        F: FnMut(usize, Arc<WorkerCounters>) -> B,
        B: FnOnce() + Send + 'static,
    {
        let mut slots = Vec::with_capacity(config.worker_count);
        let mut handles = Vec::with_capacity(config.worker_count);
        let (tx, exited) = unbounded();

        for id in 0..config.worker_count {
            let name = format!("{}-{id}", config.thread_name_prefix);
            let counters = Arc::new(WorkerCounters::default());
            let body = make_body(id, Arc::clone(&counters));
            let signal = ExitSignal { id, tx: tx.clone() };
            let handle = thread::Builder::new()
                .name(name.clone())
                .stack_size(config.thread_stack_size)
                .spawn(move || {
                    let _signal = signal;
                    body();
                })
                .map_err(|source| PoolError::Spawn {
                    name: name.clone(),
                    source,
                })?;
            slots.push(ThreadSlot { id, name, counters });
            handles.push((id, handle));
        }

        Ok(Self {
            config: config.clone(),
            slots,
            handles: Mutex::new(Some(handles)),
            exited,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self
                .slots
                .iter()
                .map(|slot| WorkerStats {
                    id: slot.id,
                    name: slot.name.clone(),
                    tasks_completed: slot.counters.completed.load(Ordering::Relaxed),
                    tasks_failed: slot.counters.failed.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }

    /// Join every thread that exits within the configured timeout.
    ///
    /// Threads still running at the deadline stay attached and are waited
    /// for again by the next call.
    pub fn join(&self) -> Result<(), PoolError> {
        let mut slot = self.handles.lock();
        let mut remaining = slot.take().ok_or(PoolError::AlreadyJoined)?;
        let timeout = self.config.join_timeout();
        let deadline = Instant::now().checked_add(timeout);
        let mut panicked = 0;

        while !remaining.is_empty() {
            let left = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
            let Ok(id) = self.exited.recv_timeout(left) else {
                break;
            };
            let Some(pos) = remaining.iter().position(|(tid, _)| *tid == id) else {
                continue;
            };
            let (id, handle) = remaining.swap_remove(pos);
            if handle.join().is_ok() {
                debug!(worker_id = id, "Worker joined successfully");
            } else {
                warn!(worker_id = id, "Worker panicked");
                panicked += 1;
            }
        }

        if !remaining.is_empty() {
            let running = remaining.len();
            warn!(
                prefix = %self.config.thread_name_prefix,
                running,
                "Pool threads still running after join timeout"
            );
            *slot = Some(remaining);
            return Err(PoolError::JoinTimeout(running));
        }

        info!(
            prefix = %self.config.thread_name_prefix,
            worker_count = self.slots.len(),
            "Pool shut down complete"
        );

        if panicked > 0 {
            return Err(PoolError::WorkerPanicked(panicked));
        }
        Ok(())
    }
}

/// Runtime each pool thread drives its async callbacks on.
pub(crate) fn thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

/// Drive `fut` to completion, turning a panic into a task failure.
pub(crate) fn run_contained<F>(rt: &tokio::runtime::Runtime, fut: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    panic::catch_unwind(AssertUnwindSafe(|| rt.block_on(fut)))
        .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Pool of threads consuming a shared [`Schedule`].
///
/// Dropping the pool requests exit but does not join; call
/// [`join`](Self::join) (or [`shutdown`](Self::shutdown)) before assuming
/// quiescence, since each worker may still finish one task.
pub struct WorkerPool<P> {
    schedule: Arc<Schedule<P>>,
    must_exit: Arc<AtomicBool>,
    threads: PoolThreads,
}

impl<P> WorkerPool<P>
where
    P: Send + 'static,
{
    /// Start `config.worker_count` workers draining `schedule`.
    ///
    /// Each worker gets its own clone of `executor` and `context`; a context
    /// such as a database handle is therefore per worker.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Spawn` if a thread cannot be created; workers already
    ///   started are told to exit
    pub fn start<E, C>(
        config: &WorkerPoolConfig,
        schedule: Arc<Schedule<P>>,
        executor: E,
        context: C,
    ) -> Result<Self, PoolError>
    where
        E: TaskExecutor<P, C>,
        C: Clone + Send + 'static,
    {
        config.validate()?;
        let must_exit = Arc::new(AtomicBool::new(false));

        let threads = PoolThreads::spawn_all(config, |id, counters| {
            let worker = Worker {
                id,
                schedule: Arc::clone(&schedule),
                executor: executor.clone(),
                context: context.clone(),
                must_exit: Arc::clone(&must_exit),
                counters,
            };
            move || worker.run()
        })
        .inspect_err(|_| {
            must_exit.store(true, Ordering::Release);
            schedule.wake_all();
        })?;

        info!(
            worker_count = config.worker_count,
            prefix = %config.thread_name_prefix,
            "WorkerPool started"
        );

        Ok(Self {
            schedule,
            must_exit,
            threads,
        })
    }

    /// Tell every worker to stop picking up tasks and wake the idle ones.
    /// A worker busy with a task finishes it first.
    pub fn request_exit(&self) {
        if !self.must_exit.swap(true, Ordering::AcqRel) {
            info!("Worker pool exit requested");
        }
        self.schedule.wake_all();
    }

    /// Wait for every worker to leave.
    ///
    /// # Errors
    ///
    /// - `PoolError::AlreadyJoined` once every worker has been joined
    /// - `PoolError::JoinTimeout` if workers are still running at the
    ///   deadline; calling `join` again keeps waiting for them
    /// - `PoolError::WorkerPanicked` if a worker thread died outside task execution
    pub fn join(&self) -> Result<(), PoolError> {
        self.threads.join()
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

    /// Whether exit has been requested.
    pub fn is_exiting(&self) -> bool {
        self.must_exit.load(Ordering::Acquire)
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    /// The schedule this pool drains.
    pub const fn schedule(&self) -> &Arc<Schedule<P>> {
        &self.schedule
    }

    /// Per-worker counters.
    pub fn stats(&self) -> PoolStats {
        self.threads.stats()
    }
}

impl<P> Drop for WorkerPool<P> {
    fn drop(&mut self) {
        // Signal exit but DON'T join: a worker may be deep inside a task.
        if !self.must_exit.swap(true, Ordering::AcqRel) {
            self.schedule.wake_all();
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// State owned by one worker thread.
struct Worker<P, E, C> {
    id: usize,
    schedule: Arc<Schedule<P>>,
    executor: E,
    context: C,
    must_exit: Arc<AtomicBool>,
    counters: Arc<WorkerCounters>,
}

impl<P, E, C> Worker<P, E, C>
where
    P: Send + 'static,
    E: TaskExecutor<P, C>,
    C: Send + 'static,
{
    fn run(mut self) {
        debug!(worker_id = self.id, "Worker thread started");

        let rt = match thread_runtime() {
            Ok(rt) => rt,
            Err(e) => {
                error!(worker_id = self.id, error = %e, "Failed to create worker runtime");
                return;
            }
        };

        while let Some(task) = self.schedule.pop_due(&self.must_exit) {
            let task_id = task.id().clone();
            debug!(worker_id = self.id, task = %task_id, "Worker executing task");

            let outcome = run_contained(&rt, self.executor.execute(task, &mut self.context));
            if let Err(e) = &outcome {
                debug!(worker_id = self.id, task = %task_id, error = %e, "Task failed");
            } else {
                debug!(worker_id = self.id, task = %task_id, "Worker completed task");
            }
            self.counters.record(&outcome);
        }

        debug!(worker_id = self.id, "Worker thread exiting");
    }
}
