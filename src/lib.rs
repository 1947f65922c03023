//! # DNSSEC Scheduler
//!
//! The concurrency core of a DNSSEC key-management daemon pair: an enforcer
//! that evolves key state on a timetable and a signer that turns zones into
//! signed data.
//!
//! Both daemons run on the same substrate:
//!
//! - **[`Schedule`](core::Schedule)**: time-ordered tasks, at most one per
//!   identity, handed to workers once due. Supports flush, purge and a
//!   configurable merge policy for duplicate identities.
//! - **[`WorkerPool`](core::WorkerPool)**: OS threads blocking on the
//!   schedule and running each due task through a
//!   [`TaskExecutor`](core::TaskExecutor) against a per-worker context.
//! - **[`FifoQueue`](core::FifoQueue)**: a bounded handoff queue with
//!   high/low watermark backpressure that carries signing sub-jobs from
//!   workers to a [`DrudgerPool`](core::DrudgerPool). Each job is owned by
//!   its producer's [`JobLedger`](core::JobLedger).
//!
//! State lives in process memory only; callers re-derive and re-submit work
//! after a restart.
//!
//! ## Enforcer
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dnssec_scheduler::config::SchedulerConfig;
//! use dnssec_scheduler::core::{Schedule, Task, TaskId, WorkerPool};
//!
//! let cfg = SchedulerConfig::from_env()?;
//! let schedule = Arc::new(Schedule::with_policy(cfg.schedule.merge));
//! let pool = WorkerPool::start(&cfg.workers, Arc::clone(&schedule), enforcer, db)?;
//!
//! schedule.lock_and_submit(Task::immediate(TaskId::new("enforce", "example.com"), job), true)?;
//! // ...
//! pool.shutdown()?;
//! ```
//!
//! ## Signer
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dnssec_scheduler::core::{DrudgerPool, JobLedger, SignQueue};
//!
//! let queue = Arc::new(SignQueue::with_config(&cfg.queue)?);
//! let drudgers = DrudgerPool::start(&cfg.drudgers, Arc::clone(&queue), signer, hsm)?;
//!
//! // inside a worker's executor:
//! let ledger = Arc::new(JobLedger::new());
//! for rrset in zone.rrsets() {
//!     ledger.appoint();
//!     queue.push_with_backpressure(rrset, Arc::clone(&ledger), &must_exit);
//! }
//! let tally = ledger.wait_settled(&must_exit);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Schedule, worker pools, handoff queue and their error types.
pub mod core;
/// Configuration models for the schedule, pools and queue.
pub mod config;
/// Shared utilities.
pub mod util;
