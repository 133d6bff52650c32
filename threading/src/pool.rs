//! Physical worker pool backing parallel regions.

use parajit_errors::ThreadingError;
use rayon::ThreadPoolBuilder;
use tracing::info;

pub fn thread_name(index: usize) -> String {
    format!("parajit-worker-{}", index)
}

/// A launched pool. Its size never changes.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    size: usize,
}

impl WorkerPool {
    pub fn launch(size: usize) -> Result<Self, ThreadingError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(thread_name)
            .build()
            .map_err(|e| ThreadingError::PoolLaunch {
                threads: size,
                reason: e.to_string(),
            })?;

        info!("Launched worker pool with {} threads", size);
        Ok(Self { pool, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Threads rayon actually started for this pool.
    pub fn running_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub(crate) fn scope<'scope, F>(&self, f: F)
    where
        F: FnOnce(&rayon::Scope<'scope>) + Send,
    {
        self.pool.scope(f);
    }
}

/// Split `len` items into at most `workers` contiguous chunks.
pub(crate) fn chunk_bounds(len: usize, workers: usize) -> Vec<(usize, usize)> {
    if len == 0 || workers == 0 {
        return Vec::new();
    }
    let chunk = len.div_ceil(workers);
    (0..len)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(len)))
        .collect()
}
