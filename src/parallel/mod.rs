//! Fan-out of per-tree work
//!
//! With the `parallel` feature and parallel execution enabled, the forest
//! owns a dedicated fixed-size rayon pool and each tree is one unit of work.
//! Results always come back in tree order, so reductions over them are
//! identical whether the pool is used or not.

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "parallel")]
use crate::error::ForestError;
use crate::error::Result;
use crate::sampler::AdmitDecision;

/// Get actual number of threads to use (`None` = all cores)
pub fn actual_threads(requested: Option<usize>) -> usize {
    match requested {
        Some(n) => n.max(1),
        None => {
            #[cfg(feature = "parallel")]
            {
                num_cpus::get().max(1)
            }
            #[cfg(not(feature = "parallel"))]
            {
                1
            }
        }
    }
}

/// Executes per-tree closures serially or on a worker pool
#[derive(Debug)]
pub struct TreePool {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl TreePool {
    /// Run everything on the calling thread
    pub fn serial() -> Self {
        Self {
            #[cfg(feature = "parallel")]
            pool: None,
            threads: 1,
        }
    }

    /// Build a pool of `num_threads` workers when `enabled`
    pub fn build(enabled: bool, num_threads: Option<usize>) -> Result<Self> {
        if !enabled {
            return Ok(Self::serial());
        }

        #[cfg(feature = "parallel")]
        {
            let threads = actual_threads(num_threads);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("rcforest-{}", i))
                .build()
                .map_err(|e| ForestError::InvalidOption(format!("worker pool: {}", e)))?;
            tracing::debug!(threads, "built tree worker pool");
            Ok(Self {
                pool: Some(pool),
                threads,
            })
        }

        #[cfg(not(feature = "parallel"))]
        {
            tracing::warn!(
                ?num_threads,
                "parallel execution requested but the `parallel` feature is disabled"
            );
            Ok(Self::serial())
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.threads > 1 || self.has_pool()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    #[cfg(feature = "parallel")]
    fn has_pool(&self) -> bool {
        self.pool.is_some()
    }

    #[cfg(not(feature = "parallel"))]
    fn has_pool(&self) -> bool {
        false
    }

    /// Map over shared items, preserving order
    #[cfg(feature = "parallel")]
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            None => items.iter().map(f).collect(),
        }
    }

    /// Map over shared items, preserving order
    #[cfg(not(feature = "parallel"))]
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        F: Fn(&T) -> R,
    {
        items.iter().map(f).collect()
    }

    /// Map over exclusively borrowed items, preserving order
    #[cfg(feature = "parallel")]
    pub fn map_mut<T, R, F>(&self, items: &mut [T], f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(&mut T) -> R + Send + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter_mut().map(&f).collect()),
            None => items.iter_mut().map(f).collect(),
        }
    }

    /// Map over exclusively borrowed items, preserving order
    #[cfg(not(feature = "parallel"))]
    pub fn map_mut<T, R, F>(&self, items: &mut [T], f: F) -> Vec<R>
    where
        F: Fn(&mut T) -> R,
    {
        items.iter_mut().map(f).collect()
    }
}

/// What one update did across all trees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub admitted: usize,
    pub evicted: usize,
    pub rejected: usize,
}

impl UpdateSummary {
    /// Merge per-tree decisions
    pub fn merge<'a>(decisions: impl IntoIterator<Item = &'a AdmitDecision>) -> UpdateSummary {
        let mut merged = UpdateSummary::default();
        for decision in decisions {
            match decision {
                AdmitDecision::Admit => merged.admitted += 1,
                AdmitDecision::AdmitAndEvict(_) => {
                    merged.admitted += 1;
                    merged.evicted += 1;
                }
                AdmitDecision::Reject => merged.rejected += 1,
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_pool() {
        let pool = TreePool::serial();
        assert!(!pool.is_parallel());
        let items: Vec<i32> = (0..10).collect();
        assert_eq!(pool.map(&items, |x| x * 2), (0..10).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_disabled_pool_is_serial() {
        let pool = TreePool::build(false, Some(4)).unwrap();
        assert!(!pool.is_parallel());
        assert_eq!(pool.threads(), 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_pool_preserves_order() {
        let pool = TreePool::build(true, Some(3)).unwrap();
        assert!(pool.is_parallel());
        assert_eq!(pool.threads(), 3);

        let items: Vec<u64> = (0..1000).collect();
        let squares = pool.map(&items, |x| x * x);
        assert_eq!(squares, items.iter().map(|x| x * x).collect::<Vec<_>>());

        let mut counters = vec![0u64; 64];
        let seen = pool.map_mut(&mut counters, |c| {
            *c += 1;
            *c
        });
        assert!(seen.iter().all(|&c| c == 1));
        assert!(counters.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_actual_threads() {
        assert_eq!(actual_threads(Some(8)), 8);
        assert!(actual_threads(None) >= 1);
    }

    #[test]
    fn test_update_summary_merge() {
        let decisions = [
            AdmitDecision::Admit,
            AdmitDecision::AdmitAndEvict(3),
            AdmitDecision::Reject,
            AdmitDecision::Reject,
        ];
        let merged = UpdateSummary::merge(&decisions);
        assert_eq!(merged.admitted, 2);
        assert_eq!(merged.evicted, 1);
        assert_eq!(merged.rejected, 2);
    }
}
