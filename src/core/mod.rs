//! Scheduling and handoff primitives shared by the enforcer and the signer.

pub mod drudger_pool;
pub mod error;
pub mod executor;
pub mod fifo;
pub mod ledger;
pub mod schedule;
pub mod status;
pub mod task;
pub mod worker_pool;

pub use drudger_pool::{DrudgerPool, SignQueue};
pub use error::{AppResult, PoolError, SchedulerError};
pub use executor::{Drudge, TaskExecutor};
pub use fifo::{FifoGuard, FifoQueue, Push, QueueStats};
pub use ledger::{JobLedger, JobTally};
pub use schedule::{Schedule, ScheduleGuard};
pub use status::Status;
pub use task::{DueTime, Task, TaskId};
pub use worker_pool::{PoolStats, WorkerPool, WorkerStats};
