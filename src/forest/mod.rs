//! Forest coordinator
//!
//! A [`RandomCutForest`] owns the shingle window, one [`SampledTree`] per
//! ensemble member and the shared counters. Updates fan out to every tree
//! (serially or on the forest's worker pool) and only return once every
//! tree has settled; queries fan out read-only and the per-tree answers are
//! reduced in tree order.

pub mod sampled_tree;
pub mod shared;
pub mod stats;

pub use sampled_tree::SampledTree;
pub use shared::SharedForest;
pub use stats::{ForestStats, StatsSnapshot};

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::ForestConfig;
use crate::error::{ForestError, Result};
use crate::parallel::{TreePool, UpdateSummary};
use crate::rng::{entropy_seed, SeedSequence};
use crate::sampler::AdmitDecision;
use crate::scoring::{self, neighbor};
use crate::shingle::ShingleBuilder;
use crate::types::{DiVector, InterpolationMeasure, NearNeighbor, RangeVector};

/// Streaming Random Cut Forest
#[derive(Debug)]
pub struct RandomCutForest {
    config: ForestConfig,
    seed: u64,
    shingle: ShingleBuilder,
    trees: Vec<SampledTree>,
    stats: ForestStats,
    pool: TreePool,
    output_after: u64,
    density_depth: usize,
}

impl RandomCutForest {
    /// Validate `config` and build an empty forest
    pub fn new(config: ForestConfig) -> Result<Self> {
        config.validate()?;

        let seed = config.random_seed.unwrap_or_else(entropy_seed);
        let lambda = config.effective_lambda();
        let dimensions = config.shingled_dimensions();

        let mut seeds = SeedSequence::new(seed);
        let trees = (0..config.num_trees)
            .map(|_| SampledTree::new(dimensions, config.sample_size, lambda, seeds.next_seed()))
            .collect();

        let pool = TreePool::build(config.parallel_execution_enabled, config.num_threads)?;

        info!(
            dimensions = config.dimensions,
            shingle_size = config.shingle_size,
            num_trees = config.num_trees,
            sample_size = config.sample_size,
            output_after = config.effective_output_after(),
            lambda,
            seed,
            parallel = pool.is_parallel(),
            threads = pool.threads(),
            "random cut forest created"
        );

        Ok(Self {
            shingle: ShingleBuilder::new(config.dimensions, config.shingle_size),
            output_after: config.effective_output_after() as u64,
            density_depth: config.effective_density_depth(),
            config,
            seed,
            trees,
            stats: ForestStats::new(),
            pool,
        })
    }

    /// Ingest one raw point
    ///
    /// Invalid points are rejected before any state changes. Once the
    /// shingle window is full every update offers the new shingle to all
    /// trees.
    pub fn update(&mut self, point: &[f64]) -> Result<()> {
        let shingle = self.shingle.push(point)?;
        self.stats.add_point();
        let Some(shingle) = shingle else {
            return Ok(());
        };

        let sequence = self.stats.next_shingle();
        let decisions = self
            .pool
            .map_mut(&mut self.trees, |tree| tree.update(&shingle, sequence, sequence))
            .into_iter()
            .collect::<Result<Vec<AdmitDecision>>>()?;

        let summary = UpdateSummary::merge(&decisions);
        self.stats.record(&summary);
        debug!(
            sequence,
            admitted = summary.admitted,
            evicted = summary.evicted,
            rejected = summary.rejected,
            "update"
        );
        Ok(())
    }

    /// True once `output_after` shingles have been observed
    pub fn is_output_ready(&self) -> bool {
        self.stats.get_shingles() >= self.output_after
    }

    /// The shingle a query with `point` would use
    pub fn shingled_point(&self, point: &[f64]) -> Result<Vec<f64>> {
        self.shingle.preview(point)
    }

    /// Mean anomaly score over all trees
    pub fn score(&self, point: &[f64]) -> Result<f64> {
        let query = self.query_shingle(point)?;
        Ok(self.score_shingle(&query))
    }

    /// Mean fraction of tree mass displaced by inserting the point
    pub fn displacement_score(&self, point: &[f64]) -> Result<f64> {
        let query = self.query_shingle(point)?;
        let scores = self
            .pool
            .map(&self.trees, |tree| scoring::displacement_score(tree.tree(), &query));
        Ok(mean(&scores))
    }

    /// Elementwise mean of the per-tree attributions
    pub fn attribution(&self, point: &[f64]) -> Result<DiVector> {
        let query = self.query_shingle(point)?;
        let parts = self
            .pool
            .map(&self.trees, |tree| scoring::attribution(tree.tree(), &query));

        Ok(DiVector::mean_of(&parts, query.len()))
    }

    /// Mean local density over all trees
    pub fn density(&self, point: &[f64]) -> Result<f64> {
        let query = self.query_shingle(point)?;
        let depth = self.density_depth;
        let densities = self
            .pool
            .map(&self.trees, |tree| scoring::density(tree.tree(), &query, depth));
        Ok(mean(&densities))
    }

    /// Mean density split across axes and directions; sums to [`density`](Self::density)
    pub fn directional_density(&self, point: &[f64]) -> Result<DiVector> {
        let query = self.query_shingle(point)?;
        let depth = self.density_depth;
        let parts = self.pool.map(&self.trees, |tree| {
            scoring::directional_density(tree.tree(), &query, depth)
        });
        Ok(DiVector::mean_of(&parts, query.len()))
    }

    /// Componentwise mean of the per-tree interpolation measures
    pub fn density_interpolant(&self, point: &[f64]) -> Result<InterpolationMeasure> {
        let query = self.query_shingle(point)?;
        let parts = self
            .pool
            .map(&self.trees, |tree| scoring::interpolant(tree.tree(), &query));
        Ok(InterpolationMeasure::mean_of(&parts, query.len()))
    }

    /// Forecast the next `look_ahead` raw points
    ///
    /// Each step completes the newest shingle by imputing its last point in
    /// every tree; the per-coordinate median across trees is the forecast
    /// and the 10th and 90th percentiles bound it. The forecast is then
    /// shifted into the window for the next step. Values are laid out point
    /// after point, `look_ahead * dimensions` in all.
    pub fn extrapolate(&self, look_ahead: usize) -> Result<RangeVector> {
        let dims = self.dimensions();
        if self.shingle_size() < 2 {
            return Err(ForestError::InvalidOption(
                "extrapolation needs shingle_size of at least 2".to_string(),
            ));
        }
        let mut window = self.shingle.tail()?;
        self.check_ready()?;

        let missing: Vec<usize> = (window.len()..window.len() + dims).collect();
        let mut forecast = RangeVector::with_capacity(look_ahead * dims);
        for _ in 0..look_ahead {
            let mut query = window.clone();
            query.resize(window.len() + dims, 0.0);

            let imputed = self
                .pool
                .map(&self.trees, |tree| scoring::impute(tree.tree(), &query, &missing));
            let imputed: Vec<Vec<f64>> = imputed.into_iter().flatten().collect();

            let mut next = Vec::with_capacity(dims);
            for &index in &missing {
                let mut column: Vec<f64> = imputed.iter().map(|p| p[index]).collect();
                let (Some(value), Some(lower), Some(upper)) = (
                    neighbor::percentile_value(&mut column, 50.0),
                    neighbor::percentile_value(&mut column, 10.0),
                    neighbor::percentile_value(&mut column, 90.0),
                ) else {
                    return Err(self.not_ready());
                };
                forecast.push(value, lower, upper);
                next.push(value);
            }

            window.drain(..dims);
            window.extend_from_slice(&next);
        }
        debug!(look_ahead, "extrapolated");
        Ok(forecast)
    }

    /// Retained samples near the query shingle, by ascending distance
    ///
    /// `percentile` in [0, 100] bounds each tree's candidates by the
    /// distribution of distances from the query to that tree's samples.
    pub fn near_neighbor_list(&self, point: &[f64], percentile: f64) -> Result<Vec<NearNeighbor>> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(ForestError::InvalidPercentile(percentile));
        }
        let query = self.query_shingle(point)?;

        let per_tree = self.pool.map(&self.trees, |tree| {
            scoring::near_neighbors(tree.tree(), &query, percentile)
        });

        let mut seen = HashSet::new();
        let mut neighbors: Vec<NearNeighbor> = per_tree
            .into_iter()
            .flatten()
            .filter(|c| seen.insert(c.point.iter().map(|v| v.to_bits()).collect::<Vec<u64>>()))
            .map(|c| NearNeighbor {
                score: self.score_shingle(&c.point),
                point: c.point,
                distance: c.distance,
            })
            .collect();

        if neighbors.is_empty() {
            return Err(ForestError::NoNeighborsFound);
        }
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(neighbors)
    }

    /// Width of a raw input point
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Raw points per shingle
    pub fn shingle_size(&self) -> usize {
        self.config.shingle_size
    }

    /// Width of a shingle, `dimensions * shingle_size`
    pub fn shingled_dimensions(&self) -> usize {
        self.config.shingled_dimensions()
    }

    /// Raw points accepted by `update`
    pub fn entries_seen(&self) -> u64 {
        self.stats.get_points()
    }

    /// Shingles observed (drives readiness)
    pub fn points_seen(&self) -> u64 {
        self.stats.get_shingles()
    }

    /// Trees in the ensemble
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Reservoir capacity of each tree
    pub fn sample_size(&self) -> usize {
        self.config.sample_size
    }

    /// Shingles required before queries answer
    pub fn output_after(&self) -> u64 {
        self.output_after
    }

    /// Master seed actually in use
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Configuration the forest was built from
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Live update counters
    pub fn stats(&self) -> &ForestStats {
        &self.stats
    }

    /// Ensemble members in tree order
    pub fn trees(&self) -> &[SampledTree] {
        &self.trees
    }

    fn query_shingle(&self, point: &[f64]) -> Result<Vec<f64>> {
        let query = self.shingle.preview(point)?;
        self.check_ready()?;
        Ok(query)
    }

    fn check_ready(&self) -> Result<()> {
        if self.is_output_ready() {
            Ok(())
        } else {
            Err(self.not_ready())
        }
    }

    fn not_ready(&self) -> ForestError {
        ForestError::NotReady {
            seen: self.points_seen(),
            required: self.output_after,
        }
    }

    fn score_shingle(&self, query: &[f64]) -> f64 {
        let scores = self
            .pool
            .map(&self.trees, |tree| scoring::anomaly_score(tree.tree(), query));
        mean(&scores)
    }
}

// Divides before summing: per-tree values may sit at `f64::MAX`.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    values.iter().map(|v| v / n).sum::<f64>().min(f64::MAX)
}
