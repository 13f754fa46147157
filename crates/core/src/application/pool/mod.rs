// Worker Pool - bounded workers plus a bounded backlog

pub mod constants;
mod panic_guard;

use constants::*;
pub use panic_guard::panic_message;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Admission failures: the job was never started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("capacity exceeded: {capacity} jobs already admitted")]
    CapacityExceeded { capacity: usize },

    #[error("worker pool is shut down")]
    Shutdown,
}

/// Failures of a job that was admitted and started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("job was cancelled")]
    Cancelled,
}

/// Pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Jobs executing at the same time
    pub workers: usize,
    /// Admitted jobs waiting for a worker
    pub backlog: usize,
}

impl PoolConfig {
    pub fn new(workers: usize, backlog: usize) -> Self {
        Self {
            workers: workers.max(1),
            backlog,
        }
    }

    /// workers = max(MIN_WORKERS, available parallelism), backlog = workers * multiplier
    pub fn from_available_parallelism(backlog_multiplier: usize) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_workers(parallelism.max(MIN_WORKERS), backlog_multiplier)
    }

    /// backlog = workers * multiplier
    pub fn with_workers(workers: usize, backlog_multiplier: usize) -> Self {
        let workers = workers.max(1);
        Self::new(workers, workers.saturating_mul(backlog_multiplier))
    }

    /// Maximum number of admitted (running + waiting) jobs
    pub fn capacity(&self) -> usize {
        self.workers + self.backlog
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_available_parallelism(DEFAULT_BACKLOG_MULTIPLIER)
    }
}

/// Point-in-time pool counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub workers: usize,
    pub backlog: usize,
    pub capacity: usize,
    /// Admitted and not yet finished
    pub in_flight: usize,
    /// Holding a worker right now
    pub running: usize,
    /// Highest `running` ever observed
    pub peak_running: usize,
    /// Jobs that acquired a worker since creation
    pub started: usize,
    pub rejected: usize,
    pub shutdown: bool,
}

#[derive(Default)]
struct Counters {
    running: AtomicUsize,
    peak_running: AtomicUsize,
    started: AtomicUsize,
    rejected: AtomicUsize,
}

/// Decrements `running` on drop, including when the job unwinds
struct RunningGuard(Arc<Counters>);

impl RunningGuard {
    fn enter(counters: Arc<Counters>) -> Self {
        let now = counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_running.fetch_max(now, Ordering::SeqCst);
        counters.started.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to one admitted job
pub struct JobHandle<T> {
    inner: JoinHandle<T>,
}

impl<T> JobHandle<T> {
    /// Wait for the job; panics inside the job come back as `JobError::Panicked`
    pub async fn join(self) -> Result<T, JobError> {
        match self.inner.await {
            Ok(value) => Ok(value),
            Err(join_err) if join_err.is_panic() => {
                Err(JobError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(_) => Err(JobError::Cancelled),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

/// Fixed-size pool with a bounded backlog.
///
/// Admission is bounded by `workers + backlog` permits; execution by `workers`
/// permits. A job keeps its admission permit until it finishes, so
/// `in_flight <= capacity` always holds. Both semaphores are FIFO, so queued
/// jobs start in admission order.
///
/// The pool is created once by the composition root and shared via `Arc`.
pub struct WorkerPool {
    config: PoolConfig,
    admission: Arc<Semaphore>,
    execution: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        info!(
            workers = config.workers,
            backlog = config.backlog,
            capacity = config.capacity(),
            "Worker pool created"
        );
        Self {
            admission: Arc::new(Semaphore::new(config.capacity())),
            execution: Arc::new(Semaphore::new(config.workers)),
            counters: Arc::new(Counters::default()),
            config,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Admit a job without waiting.
    ///
    /// # Errors
    /// - `PoolError::CapacityExceeded` if workers and backlog are all taken
    /// - `PoolError::Shutdown` after `shutdown()`
    pub fn submit<F, T>(&self, job: F) -> Result<JobHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                self.counters.rejected.fetch_add(1, Ordering::SeqCst);
                warn!(
                    capacity = self.capacity(),
                    "Worker pool saturated, rejecting job"
                );
                return Err(PoolError::CapacityExceeded {
                    capacity: self.capacity(),
                });
            }
            Err(TryAcquireError::Closed) => return Err(PoolError::Shutdown),
        };
        Ok(self.spawn_admitted(permit, job))
    }

    /// Admit a job, waiting for a free slot if the pool is saturated.
    ///
    /// # Errors
    /// - `PoolError::Shutdown` if the pool is (or becomes) shut down while waiting
    pub async fn submit_blocking<F, T>(&self, job: F) -> Result<JobHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.admission)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Shutdown)?;
        Ok(self.spawn_admitted(permit, job))
    }

    /// Admit every job (waiting for slots as needed), then wait for all of them.
    ///
    /// Jobs are admitted one at a time and start as soon as a worker frees up,
    /// so progress never depends on the whole batch being admitted first.
    /// Results are returned in submission order.
    pub async fn invoke_all<I, F, T>(&self, jobs: I) -> Result<Vec<Result<T, JobError>>, PoolError>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::new();
        for job in jobs {
            handles.push(self.submit_blocking(job).await?);
        }
        debug!(jobs = handles.len(), "Batch admitted, waiting for completion");
        Ok(join_all(handles.into_iter().map(JobHandle::join)).await)
    }

    fn spawn_admitted<F, T>(&self, admitted: OwnedSemaphorePermit, job: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let execution = Arc::clone(&self.execution);
        let counters = Arc::clone(&self.counters);

        let inner = tokio::spawn(async move {
            let _admitted = admitted;
            // The execution semaphore is never closed, so this only waits.
            let _worker = execution.acquire_owned().await.ok();
            let _running = RunningGuard::enter(counters);
            job.await
        });

        JobHandle { inner }
    }

    /// Stop admitting new jobs. Jobs already admitted run to completion.
    pub fn shutdown(&self) {
        info!("Worker pool shutting down");
        self.admission.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.admission.is_closed()
    }

    pub fn stats(&self) -> PoolStats {
        let capacity = self.capacity();
        PoolStats {
            workers: self.config.workers,
            backlog: self.config.backlog,
            capacity,
            in_flight: capacity.saturating_sub(self.admission.available_permits()),
            running: self.counters.running.load(Ordering::SeqCst),
            peak_running: self.counters.peak_running.load(Ordering::SeqCst),
            started: self.counters.started.load(Ordering::SeqCst),
            rejected: self.counters.rejected.load(Ordering::SeqCst),
            shutdown: self.is_shutdown(),
        }
    }
}
