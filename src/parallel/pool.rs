//! Rayon thread pool configuration for simulation workloads.
//!
//! Use [WorkerPool::build] once per batch and run each chunk through the returned [ReadyPool],
//! or rely on Rayon's default (all CPU cores).

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

/// Configures how many worker threads are used for parallel batch execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool {
    /// Number of worker threads. If 0, use Rayon default (num_cpus).
    pub workers: usize,
}

impl WorkerPool {
    /// Use all available CPU cores (Rayon default).
    pub fn default_workers() -> Self {
        Self::default()
    }

    /// Use exactly `n` worker threads.
    pub fn with_workers(n: usize) -> Self {
        Self { workers: n }
    }

    /// Threads a parallel batch will actually spread over.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            rayon::current_num_threads()
        } else {
            self.workers
        }
    }

    /// Builds the threads for this worker count. With [workers](WorkerPool::workers) at 0 the
    /// global Rayon pool is used and nothing is built.
    pub fn build(&self) -> Result<ReadyPool> {
        let dedicated = if self.workers == 0 {
            None
        } else {
            Some(ThreadPoolBuilder::new().num_threads(self.workers).build()?)
        };
        Ok(ReadyPool { dedicated })
    }

    /// Builds a pool and runs a single closure on it.
    pub fn install<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        Ok(self.build()?.install(f))
    }
}

/// A built pool, reused for every chunk of a batch.
#[derive(Debug)]
pub struct ReadyPool {
    dedicated: Option<ThreadPool>,
}

impl ReadyPool {
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.dedicated {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    pub fn is_dedicated(&self) -> bool {
        self.dedicated.is_some()
    }
}
