//! Benchmarks for the schedule and the handoff queue.
//!
//! Benchmarks cover:
//! - Schedule submit/pop in due order
//! - Resubmission of already scheduled identities
//! - FifoQueue push/pop with and without contention
//! - Worker pool throughput on immediate tasks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dnssec_scheduler::config::{MergePolicy, WorkerPoolConfig};
use dnssec_scheduler::core::{
    AppResult, FifoQueue, Schedule, Task, TaskExecutor, TaskId, WorkerPool,
};
use dnssec_scheduler::util::clock;

use async_trait::async_trait;
use rand::Rng;

// ============================================================================
// Helper Functions
// ============================================================================

fn zone_ids(count: u64) -> Vec<TaskId> {
    (0..count)
        .map(|i| TaskId::new("enforce", format!("zone-{i}.example")))
        .collect()
}

#[derive(Clone)]
struct CountingExecutor {
    done: Arc<AtomicU64>,
}

#[async_trait]
impl TaskExecutor<u64, ()> for CountingExecutor {
    async fn execute(&self, task: Task<u64>, _context: &mut ()) -> AppResult<()> {
        black_box(task.into_payload());
        self.done.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ============================================================================
// Schedule Benchmarks
// ============================================================================

fn bench_schedule_submit_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_submit_pop");

    for size in [100_u64, 1_000, 10_000] {
        let ids = zone_ids(size);
        let mut rng = rand::rng();
        let base = clock::now() - Duration::from_secs(100_000);
        let dues: Vec<_> = (0..size)
            .map(|_| base + Duration::from_secs(rng.random_range(0..50_000)))
            .collect();

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let must_exit = AtomicBool::new(false);
            b.iter(|| {
                let schedule = Schedule::new();
                for (id, due) in ids.iter().zip(&dues) {
                    schedule
                        .lock_and_submit(Task::new(id.clone(), *due, ()), false)
                        .unwrap();
                }
                for _ in 0..size {
                    black_box(schedule.pop_due(&must_exit));
                }
            });
        });
    }
    group.finish();
}

fn bench_schedule_resubmit(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_resubmit");
    let ids = zone_ids(1_000);

    for policy in [MergePolicy::Replace, MergePolicy::EarliestWins] {
        group.throughput(Throughput::Elements(ids.len() as u64 * 4));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{policy:?}")),
            &policy,
            |b, &policy| {
                b.iter(|| {
                    let schedule = Schedule::with_policy(policy);
                    for round in 0..4_u64 {
                        let mut guard = schedule.lock();
                        for id in &ids {
                            let task =
                                Task::after(id.clone(), Duration::from_secs(3600 - round), round);
                            guard.submit(task, false).unwrap();
                        }
                    }
                    black_box(schedule.len())
                });
            },
        );
    }
    group.finish();
}

// ============================================================================
// FifoQueue Benchmarks
// ============================================================================

fn bench_fifo_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_push_pop");

    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let queue = FifoQueue::new(size as usize).unwrap();
            b.iter(|| {
                let mut tries = 0;
                for i in 0..size {
                    let _ = queue.push(i, (), &mut tries);
                }
                while let Some(item) = queue.pop() {
                    black_box(item);
                }
            });
        });
    }
    group.finish();
}

fn bench_fifo_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_contended");
    const ITEMS: u64 = 10_000;

    for producers in [1_u64, 4] {
        group.throughput(Throughput::Elements(ITEMS));
        group.bench_with_input(
            BenchmarkId::from_parameter(producers),
            &producers,
            |b, &producers| {
                b.iter(|| {
                    let queue = Arc::new(FifoQueue::new(64).unwrap());
                    let must_exit = Arc::new(AtomicBool::new(false));
                    let handles: Vec<_> = (0..producers)
                        .map(|p| {
                            let queue = Arc::clone(&queue);
                            let must_exit = Arc::clone(&must_exit);
                            thread::spawn(move || {
                                for i in 0..ITEMS / producers {
                                    let _ = queue.push_with_backpressure(i, p, &must_exit);
                                }
                            })
                        })
                        .collect();

                    let mut received = 0;
                    while received < (ITEMS / producers) * producers {
                        if queue.pop().is_some() {
                            received += 1;
                        } else {
                            let mut guard = queue.lock();
                            if guard.is_empty() {
                                guard.wait_non_empty(Some(Duration::from_millis(1)));
                            }
                        }
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

// ============================================================================
// Worker Pool Benchmarks
// ============================================================================

fn bench_worker_pool_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_pool_throughput");
    group.sample_size(10);
    const TASKS: u64 = 1_000;
    let ids = zone_ids(TASKS);

    for workers in [1_usize, 4] {
        group.throughput(Throughput::Elements(TASKS));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let schedule = Arc::new(Schedule::new());
                let done = Arc::new(AtomicU64::new(0));
                let executor = CountingExecutor {
                    done: Arc::clone(&done),
                };
                let config = WorkerPoolConfig::new().with_worker_count(workers);
                let pool = WorkerPool::start(&config, Arc::clone(&schedule), executor, ()).unwrap();

                for (n, id) in ids.iter().enumerate() {
                    schedule
                        .lock_and_submit(Task::immediate(id.clone(), n as u64), false)
                        .unwrap();
                }
                while done.load(Ordering::Relaxed) < TASKS {
                    thread::yield_now();
                }
                pool.shutdown().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    schedule_benches,
    bench_schedule_submit_pop,
    bench_schedule_resubmit
);
criterion_group!(queue_benches, bench_fifo_push_pop, bench_fifo_contended);
criterion_group!(pool_benches, bench_worker_pool_throughput);
criterion_main!(schedule_benches, queue_benches, pool_benches);
