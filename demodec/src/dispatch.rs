//! Runs many recordings through a fixed pool of workers.
//!
//! Each recording is read and decoded by one worker in one sequential
//! pass. Workers share nothing mutable.

use std::path::Path;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug_span;

use crate::error::{DemoError, DemoResult};

/// A fixed-size worker pool for batch decoding.
#[derive(Debug)]
pub struct Dispatcher {
    pool: ThreadPool,
}

impl Dispatcher {
    /// Builds a pool with `threads` workers; `0` picks one per core.
    pub fn new(threads: usize) -> DemoResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("demodec-{index}"))
            .build()
            .map_err(|err| DemoError::Dispatch {
                reason: err.to_string(),
            })?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Reads each file and runs `job` on its bytes.
    ///
    /// Results come back in input order. A failure affects only its own
    /// entry.
    pub fn run<P, T, F>(&self, paths: &[P], job: F) -> Vec<DemoResult<T>>
    where
        P: AsRef<Path> + Sync,
        T: Send,
        F: Fn(&Path, &[u8]) -> DemoResult<T> + Sync,
    {
        self.pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    let path = path.as_ref();
                    let _span = debug_span!("file", path = %path.display()).entered();
                    let bytes = std::fs::read(path).map_err(|err| DemoError::io(path, &err))?;
                    job(path, &bytes)
                })
                .collect()
        })
    }

    /// Runs `job` over recordings already in memory, in input order.
    pub fn run_bytes<B, T, F>(&self, inputs: &[B], job: F) -> Vec<DemoResult<T>>
    where
        B: AsRef<[u8]> + Sync,
        T: Send,
        F: Fn(&[u8]) -> DemoResult<T> + Sync,
    {
        self.pool
            .install(|| inputs.par_iter().map(|bytes| job(bytes.as_ref())).collect())
    }
}
