use crate::{
    jobs::VideoJob,
    report::{BatchReport, SampleOutcome},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    Pooled,
}

/// Per-job work handed to an executor. Must never panic on bad input.
pub type Task<'a> = dyn Fn(&VideoJob) -> SampleOutcome + Sync + 'a;

/// Runs every job exactly once and returns outcomes in dispatch order.
pub trait Executor {
    /// Matches the configured strategy name.
    fn name(&self) -> String;
    fn workers(&self) -> usize;
    fn execute(&self, jobs: &[VideoJob], task: &Task<'_>) -> Vec<SampleOutcome>;
}

pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn name(&self) -> String {
        "sequential".to_string()
    }

    fn workers(&self) -> usize {
        1
    }

    fn execute(&self, jobs: &[VideoJob], task: &Task<'_>) -> Vec<SampleOutcome> {
        jobs.iter().map(|job| task(job)).collect()
    }
}

/// Fixed set of worker threads pulling from a shared FIFO queue.
pub struct PooledExecutor {
    workers: usize,
}

impl PooledExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl Executor for PooledExecutor {
    fn name(&self) -> String {
        "pooled".to_string()
    }

    fn workers(&self) -> usize {
        self.workers
    }

    fn execute(&self, jobs: &[VideoJob], task: &Task<'_>) -> Vec<SampleOutcome> {
        if jobs.is_empty() {
            return Vec::new();
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &VideoJob)>();
        for item in jobs.iter().enumerate() {
            let _ = job_tx.send(item);
        }
        drop(job_tx);

        let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, SampleOutcome)>();
        let workers = self.workers.min(jobs.len());

        std::thread::scope(|s| {
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    for (index, job) in job_rx.iter() {
                        debug!(worker, index, "picked {}", job.source_path.display());
                        let _ = done_tx.send((index, task(job)));
                    }
                });
            }
        });
        drop(done_tx);

        let mut done: Vec<(usize, SampleOutcome)> = done_rx.iter().collect();
        done.sort_by_key(|(index, _)| *index);
        done.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

pub fn executor_for(strategy: Strategy, concurrency: usize) -> Box<dyn Executor> {
    match strategy {
        Strategy::Sequential => Box::new(SequentialExecutor),
        Strategy::Pooled => Box::new(PooledExecutor::new(concurrency)),
    }
}

pub struct Orchestrator {
    executor: Box<dyn Executor>,
}

impl Orchestrator {
    pub fn new(strategy: Strategy, concurrency: usize) -> Self {
        Self::with_executor(executor_for(strategy, concurrency))
    }

    pub fn with_executor(executor: Box<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Runs the whole batch. Failed jobs are recorded, never fatal.
    pub fn run<F>(&self, jobs: &[VideoJob], task: F) -> BatchReport
    where
        F: Fn(&VideoJob) -> SampleOutcome + Sync,
    {
        let strategy_name = self.executor.name();
        let workers = self.executor.workers();
        info!(
            "dispatching {} jobs strategy={} workers={}",
            jobs.len(),
            strategy_name,
            workers
        );

        let started = Instant::now();
        let outcomes = self.executor.execute(jobs, &task);
        let duration_seconds = started.elapsed().as_secs_f64();

        debug_assert_eq!(outcomes.len(), jobs.len());

        BatchReport {
            strategy_name,
            workers,
            outcomes,
            duration_seconds,
        }
    }
}
