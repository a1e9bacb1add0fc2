//! Worker pool for concurrent chunk decode, built on `rayon`.
//!
//! Each [`WorkerPool`] owns its own `rayon::ThreadPool` rather than touching
//! the process-global pool, so multiple readers in one process don't
//! contend over pool sizing.

use crate::error::Result;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("h5range-worker-{i}"))
            .build()
            .map_err(|e| crate::error::H5Error::Io(std::io::Error::other(e)))?;
        Ok(Self { pool })
    }

    /// Runs `items` through `f` concurrently, collecting results in input
    /// order. A panic or error in one item does not stop the others.
    pub fn map_collect<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        self.pool.install(|| {
            use rayon::prelude::*;
            items.into_par_iter().map(f).collect()
        })
    }

    /// Fire-and-forget: runs `task` on the pool without waiting for it.
    /// Used for the Orchestrator's deferred return mode, where the caller
    /// gets a handle back immediately and blocks only on first access.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(task);
    }
}
