//! Fork-join execution for the per-step parallel phases.
//!
//! A step hands the pool a batch of closures and blocks until all of them
//! complete; nothing outlives the call that submitted it.

use crate::error::ThreadManagerError;

pub struct ThreadManager {
    pool: rayon::ThreadPool,
    parallelism: usize,
}

impl ThreadManager {
    /// Build a dedicated pool of `parallelism` workers (at least one).
    pub fn new(parallelism: usize) -> Result<Self, ThreadManagerError> {
        let parallelism = parallelism.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("hullsim-worker-{}", i))
            .build()?;
        log::info!("Simulation thread pool: {} workers", parallelism);
        Ok(Self { pool, parallelism })
    }

    /// One worker per available core.
    pub fn with_available_parallelism() -> Result<Self, ThreadManagerError> {
        let parallelism = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::new(parallelism)
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run two independent closures, possibly in parallel, and wait for both.
    pub fn run_pair<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        self.pool.install(|| rayon::join(a, b))
    }

    /// Run `f` inside the pool, so nested rayon iterators use its workers.
    pub fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_pair_returns_both_results() {
        let tm = ThreadManager::new(2).unwrap();
        assert_eq!(tm.parallelism(), 2);

        let mut left = vec![1, 2, 3];
        let mut right = vec![10, 20];
        let (a, b) = tm.run_pair(
            || {
                left.iter_mut().for_each(|x| *x *= 2);
                left.iter().sum::<i32>()
            },
            || {
                right.push(30);
                right.len()
            },
        );
        assert_eq!(a, 12);
        assert_eq!(b, 3);
    }

    #[test]
    fn test_zero_parallelism_means_one_worker() {
        let tm = ThreadManager::new(0).unwrap();
        assert_eq!(tm.parallelism(), 1);
        assert_eq!(tm.install(|| 7), 7);
    }
}
