//! Streaming anomaly detection with Random Cut Forests
//!
//! A [`RandomCutForest`] ingests a stream of fixed-width numeric points,
//! shingles them into overlapping windows and keeps a time-decayed sample of
//! recent shingles in each of its trees. Once warmed up it answers anomaly
//! score, attribution, density, near-neighbor and extrapolation queries.
//!
//! ```no_run
//! use rcforest::{ForestConfig, RandomCutForest};
//!
//! let config = ForestConfig::new(2, 4).with_random_seed(7);
//! let mut forest = RandomCutForest::new(config)?;
//! for i in 0..1000 {
//!     let t = i as f64 * 0.1;
//!     forest.update(&[t.sin(), t.cos()])?;
//! }
//! let score = forest.score(&[5.0, 5.0])?;
//! # Ok::<(), rcforest::ForestError>(())
//! ```

pub mod config;
pub mod error;
pub mod forest;
pub mod parallel;
pub mod rng;
pub mod sampler;
pub mod scoring;
pub mod shingle;
pub mod tree;
pub mod types;

pub use config::ForestConfig;
pub use error::{ForestError, Result};
pub use forest::{ForestStats, RandomCutForest, SharedForest, StatsSnapshot};
pub use types::{DiVector, InterpolationMeasure, NearNeighbor, RangeVector};
