//! Callbacks run by the worker and drudger pools.

use async_trait::async_trait;

use crate::core::{AppResult, Task};

/// Business logic run for every due task.
///
/// One clone of the executor and one clone of the context live on each
/// worker thread; `execute` is never called concurrently for the same task
/// since a task sits in exactly one place at a time.
///
/// A task that needs another run re-submits itself (e.g. via
/// [`Task::reschedule`] or [`Task::retry_later`]) through a schedule handle
/// carried by the executor or the context. The pool never retries on its own.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use dnssec_scheduler::core::{AppResult, Schedule, Task, TaskExecutor};
///
/// #[derive(Clone)]
/// struct Enforcer {
///     schedule: Arc<Schedule<ZoneJob>>,
/// }
///
/// #[async_trait]
/// impl TaskExecutor<ZoneJob, DbHandle> for Enforcer {
///     async fn execute(&self, task: Task<ZoneJob>, db: &mut DbHandle) -> AppResult<()> {
///         let next = db.enforce(task.payload()).await?;
///         self.schedule.lock_and_submit(task.reschedule(next), true)?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor<P, C>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    C: Send + 'static,
{
    /// Run one task against this worker's context.
    ///
    /// # Threading
    ///
    /// Called from a dedicated worker thread that owns a single-threaded
    /// tokio runtime, so awaiting I/O here never stalls other workers.
    async fn execute(&self, task: Task<P>, context: &mut C) -> AppResult<()>;
}

/// Business logic run by drudgers for each sub-job taken off a
/// [`FifoQueue`](crate::core::FifoQueue).
///
/// Completion or failure is reported to the job's owner
/// [`JobLedger`](crate::core::JobLedger) by the pool.
#[async_trait]
pub trait Drudge<J, C>: Send + Sync + Clone + 'static
where
    J: Send + 'static,
    C: Send + 'static,
{
    /// Process one sub-job.
    async fn drudge(&self, job: J, context: &mut C) -> AppResult<()>;
}
