//! Thread-safe forest handle

use std::sync::Arc;

use parking_lot::RwLock;

use super::stats::StatsSnapshot;
use super::RandomCutForest;
use crate::config::ForestConfig;
use crate::error::Result;
use crate::types::{DiVector, InterpolationMeasure, NearNeighbor, RangeVector};

/// Reader/writer-locked [`RandomCutForest`]
///
/// Updates take the write lock and complete on every tree before it is
/// released, so a query issued after `update` returns always sees it.
/// Queries share the read lock.
pub struct SharedForest {
    inner: Arc<RwLock<RandomCutForest>>,
}

impl SharedForest {
    pub fn new(config: ForestConfig) -> Result<Self> {
        Ok(Self::from_forest(RandomCutForest::new(config)?))
    }

    pub fn from_forest(forest: RandomCutForest) -> Self {
        Self {
            inner: Arc::new(RwLock::new(forest)),
        }
    }

    pub fn update(&self, point: &[f64]) -> Result<()> {
        let mut forest = self.inner.write();
        forest.update(point)
    }

    pub fn score(&self, point: &[f64]) -> Result<f64> {
        let forest = self.inner.read();
        forest.score(point)
    }

    pub fn displacement_score(&self, point: &[f64]) -> Result<f64> {
        let forest = self.inner.read();
        forest.displacement_score(point)
    }

    pub fn attribution(&self, point: &[f64]) -> Result<DiVector> {
        let forest = self.inner.read();
        forest.attribution(point)
    }

    pub fn density(&self, point: &[f64]) -> Result<f64> {
        let forest = self.inner.read();
        forest.density(point)
    }

    pub fn directional_density(&self, point: &[f64]) -> Result<DiVector> {
        self.inner.read().directional_density(point)
    }

    pub fn density_interpolant(&self, point: &[f64]) -> Result<InterpolationMeasure> {
        self.inner.read().density_interpolant(point)
    }

    pub fn extrapolate(&self, look_ahead: usize) -> Result<RangeVector> {
        self.inner.read().extrapolate(look_ahead)
    }

    pub fn near_neighbor_list(&self, point: &[f64], percentile: f64) -> Result<Vec<NearNeighbor>> {
        let forest = self.inner.read();
        forest.near_neighbor_list(point, percentile)
    }

    pub fn is_output_ready(&self) -> bool {
        self.inner.read().is_output_ready()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.read().stats().snapshot()
    }

    /// Run `f` with shared access to the forest
    pub fn with_forest<R>(&self, f: impl FnOnce(&RandomCutForest) -> R) -> R {
        f(&self.inner.read())
    }
}

impl Clone for SharedForest {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn config() -> ForestConfig {
        ForestConfig::new(2, 1)
            .with_num_trees(6)
            .with_sample_size(32)
            .with_output_after(1)
            .with_random_seed(9)
    }

    #[test]
    fn test_update_visible_to_next_query() {
        let shared = SharedForest::new(config()).unwrap();
        assert!(!shared.is_output_ready());
        shared.update(&[0.0, 0.0]).unwrap();
        assert!(shared.is_output_ready());
        assert!(shared.score(&[1.0, 1.0]).unwrap() > 0.0);
        assert_eq!(shared.stats().shingles_seen, 1);
    }

    #[test]
    fn test_forecast_through_handle() {
        let shared = SharedForest::new(config().with_num_trees(4)).unwrap();
        for i in 0..40 {
            shared.update(&[i as f64, 0.0]).unwrap();
        }
        // shingle_size 1 has no history to extend
        assert!(shared.extrapolate(2).is_err());
        let split = shared.directional_density(&[10.0, 0.0]).unwrap();
        let density = shared.density(&[10.0, 0.0]).unwrap();
        assert!((split.total() - density).abs() < 1e-9 * density.max(1.0));
        let m = shared.density_interpolant(&[100.0, 0.0]).unwrap();
        assert!(m.probability_mass.high[0] > 0.5);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let shared = SharedForest::new(config()).unwrap();
        shared.update(&[0.5, 0.5]).unwrap();

        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..400 {
                    let t = i as f64 * 0.05;
                    shared.update(&[t.sin(), t.cos()]).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let score = shared.score(&[0.1, 0.9]).unwrap();
                        assert!(score >= 0.0);
                        let attr = shared.attribution(&[0.1, 0.9]).unwrap();
                        assert_eq!(attr.dimensions(), 2);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(shared.stats().points_observed, 401);
        shared.with_forest(|forest| {
            for tree in forest.trees() {
                assert_eq!(tree.sampler().len(), tree.tree().mass());
            }
        });
    }
}
