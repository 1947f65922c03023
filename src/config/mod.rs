//! Configuration models for the schedule, the thread pools and the handoff queue.

pub mod scheduler;

pub use scheduler::{
    DrudgerPoolConfig, FifoQueueConfig, MergePolicy, ScheduleConfig, SchedulerConfig,
    WorkerPoolConfig,
};
