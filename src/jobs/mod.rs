//! Background job dispatch with owner-thread completion.
//!
//! A `JobDispatcher` runs compute closures on Bevy's `AsyncComputeTaskPool`
//! and hands each result back to a completion callback. Callbacks never run
//! on a worker: they run inside `drain`, which the owner calls once per
//! frame with exclusive access to its context. Callbacks receive the
//! dispatcher too, so a completion may schedule follow-up work.
//!
//! A compute closure that returns an error or panics still completes; the
//! callback receives `Err(JobError)` and decides what to do with it.
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use bevy::log::debug;
use bevy::tasks::{AsyncComputeTaskPool, Task, TaskPool};
use thiserror::Error;

use crate::debug::record_thread_global;
use crate::error::TerrainError;

/// Thread tag recorded by every job for the debug dump.
pub const JOB_THREAD_TAG: &str = "terrain_job";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error("job panicked: {0}")]
    Panicked(String),
}

impl From<TerrainError> for JobError {
    fn from(err: TerrainError) -> Self {
        JobError::Failed(err.to_string())
    }
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);

type Completion<Ctx, T> = Box<dyn FnOnce(&mut Ctx, &mut JobDispatcher<Ctx>, JobResult<T>) + Send + Sync>;

trait InFlight<Ctx>: Send + Sync {
    fn is_finished(&self) -> bool;
    fn complete(self: Box<Self>, ctx: &mut Ctx, jobs: &mut JobDispatcher<Ctx>);
}

struct Job<Ctx, T> {
    id: JobId,
    task: Task<JobResult<T>>,
    on_complete: Completion<Ctx, T>,
}

impl<Ctx: 'static, T: Send + Sync + 'static> InFlight<Ctx> for Job<Ctx, T> {
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn complete(self: Box<Self>, ctx: &mut Ctx, jobs: &mut JobDispatcher<Ctx>) {
        let Job { id, task, on_complete } = *self;
        // The task is finished, so this returns immediately.
        let result = futures::executor::block_on(task);
        match &result {
            Ok(_) => jobs.completed += 1,
            Err(e) => {
                jobs.failed += 1;
                debug!("job {} completed with error: {e}", id.0);
            }
        }
        on_complete(ctx, jobs, result);
    }
}

/// Owner-side handle to the worker pool.
///
/// `Ctx` is whatever the completion callbacks mutate; the dispatcher never
/// stores it, the owner passes it to `drain`.
pub struct JobDispatcher<Ctx> {
    in_flight: Vec<Box<dyn InFlight<Ctx>>>,
    next_id: u64,
    completed: u64,
    failed: u64,
}

impl<Ctx: 'static> Default for JobDispatcher<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx: 'static> JobDispatcher<Ctx> {
    /// Create a dispatcher. Initialises the async compute pool when no Bevy
    /// app has done so (tests, benches, tools).
    #[must_use]
    pub fn new() -> Self {
        AsyncComputeTaskPool::get_or_init(TaskPool::default);
        Self { in_flight: Vec::new(), next_id: 0, completed: 0, failed: 0 }
    }

    /// Run `compute` on a worker and `on_complete` on the owner once it is done.
    pub fn dispatch<T, F, C>(&mut self, compute: F, on_complete: C) -> JobId
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, TerrainError> + Send + 'static,
        C: FnOnce(&mut Ctx, &mut JobDispatcher<Ctx>, JobResult<T>) + Send + Sync + 'static,
    {
        let id = JobId(self.next_id);
        self.next_id += 1;

        let task = AsyncComputeTaskPool::get().spawn(async move {
            record_thread_global(JOB_THREAD_TAG);
            match catch_unwind(AssertUnwindSafe(compute)) {
                Ok(result) => result.map_err(JobError::from),
                Err(payload) => Err(JobError::Panicked(panic_message(payload.as_ref()))),
            }
        });

        self.in_flight.push(Box::new(Job { id, task, on_complete: Box::new(on_complete) }));
        id
    }

    /// Complete every finished job, in dispatch order. Returns how many ran.
    ///
    /// Jobs dispatched by the callbacks are not completed in the same call.
    pub fn drain(&mut self, ctx: &mut Ctx) -> usize {
        let (finished, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.in_flight).into_iter().partition(|job| job.is_finished());
        self.in_flight = pending;

        let count = finished.len();
        for job in finished {
            job.complete(ctx, self);
        }
        count
    }

    /// Block until nothing is in flight, including follow-up jobs.
    pub fn finish_all(&mut self, ctx: &mut Ctx) -> usize {
        let mut total = 0;
        while !self.in_flight.is_empty() {
            let ran = self.drain(ctx);
            if ran == 0 {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            total += ran;
        }
        total
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.next_id
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
