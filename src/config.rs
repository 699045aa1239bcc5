//! Forest construction options
//!
//! `ForestConfig` is the single construction contract for a
//! [`RandomCutForest`](crate::RandomCutForest). It can be built in code with
//! the `with_*` methods or loaded from TOML:
//!
//! ```toml
//! dimensions = 3
//! shingle_size = 4
//! num_trees = 50
//! sample_size = 256
//! random_seed = 17
//! parallel_execution_enabled = true
//! ```
//!
//! Unknown keys are rejected, and every value is range-checked by
//! [`ForestConfig::validate`] before a forest is built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ForestError, Result};

/// Default number of trees in the ensemble.
pub const DEFAULT_NUM_TREES: usize = 50;
/// Default reservoir capacity per tree.
pub const DEFAULT_SAMPLE_SIZE: usize = 256;

const MAX_NUM_TREES: usize = 10_000;
const MAX_SAMPLE_SIZE: usize = 65_536;
const MAX_SHINGLED_DIMENSIONS: usize = 100_000;

fn default_num_trees() -> usize {
    DEFAULT_NUM_TREES
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

/// Random Cut Forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForestConfig {
    /// Number of values in each raw input point
    pub dimensions: usize,
    /// Number of consecutive points concatenated into one shingle
    pub shingle_size: usize,
    /// Number of trees in the ensemble
    #[serde(default = "default_num_trees")]
    pub num_trees: usize,
    /// Reservoir capacity of every tree
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Shingles to observe before queries are answered (default: sample_size)
    #[serde(default)]
    pub output_after: Option<usize>,
    /// Master seed; trees derive their own generators from it
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Fan updates and queries out to a worker pool
    #[serde(default)]
    pub parallel_execution_enabled: bool,
    /// Time-decay rate of the samplers (default: 0.1 / sample_size)
    #[serde(default)]
    pub lambda: Option<f64>,
    /// Worker pool size when parallel execution is enabled (default: all cores)
    #[serde(default)]
    pub num_threads: Option<usize>,
    /// Deepest level considered by the density estimate (default: log2(sample_size))
    #[serde(default)]
    pub density_depth: Option<usize>,
}

impl ForestConfig {
    /// Create a configuration with defaults for every optional field
    pub fn new(dimensions: usize, shingle_size: usize) -> Self {
        Self {
            dimensions,
            shingle_size,
            num_trees: DEFAULT_NUM_TREES,
            sample_size: DEFAULT_SAMPLE_SIZE,
            output_after: None,
            random_seed: None,
            parallel_execution_enabled: false,
            lambda: None,
            num_threads: None,
            density_depth: None,
        }
    }

    pub fn with_num_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_output_after(mut self, output_after: usize) -> Self {
        self.output_after = Some(output_after);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_parallel_execution(mut self, enabled: bool) -> Self {
        self.parallel_execution_enabled = enabled;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = Some(lambda);
        self
    }

    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    pub fn with_density_depth(mut self, depth: usize) -> Self {
        self.density_depth = Some(depth);
        self
    }

    /// Dimension of a shingled point
    pub fn shingled_dimensions(&self) -> usize {
        self.dimensions * self.shingle_size
    }

    /// Effective cold-start threshold
    pub fn effective_output_after(&self) -> usize {
        self.output_after.unwrap_or(self.sample_size)
    }

    /// Effective time-decay rate
    pub fn effective_lambda(&self) -> f64 {
        self.lambda
            .unwrap_or_else(|| 0.1 / self.sample_size.max(1) as f64)
    }

    /// Effective density depth threshold
    pub fn effective_density_depth(&self) -> usize {
        self.density_depth.unwrap_or_else(|| {
            let size = self.sample_size.max(2) as f64;
            (size.log2().ceil() as usize).max(1)
        })
    }

    /// Check every option against its allowed range
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(invalid("dimensions must be greater than 0"));
        }
        if self.shingle_size == 0 {
            return Err(invalid("shingle_size must be greater than 0"));
        }
        if self.dimensions.saturating_mul(self.shingle_size) > MAX_SHINGLED_DIMENSIONS {
            return Err(invalid(format!(
                "dimensions * shingle_size must not exceed {}",
                MAX_SHINGLED_DIMENSIONS
            )));
        }
        if self.num_trees == 0 || self.num_trees > MAX_NUM_TREES {
            return Err(invalid(format!(
                "num_trees must be within 1..={}, got {}",
                MAX_NUM_TREES, self.num_trees
            )));
        }
        if self.sample_size == 0 || self.sample_size > MAX_SAMPLE_SIZE {
            return Err(invalid(format!(
                "sample_size must be within 1..={}, got {}",
                MAX_SAMPLE_SIZE, self.sample_size
            )));
        }
        if let Some(lambda) = self.lambda {
            if !lambda.is_finite() || lambda < 0.0 {
                return Err(invalid(format!(
                    "lambda must be finite and non-negative, got {}",
                    lambda
                )));
            }
        }
        if self.num_threads == Some(0) {
            return Err(invalid("num_threads must be greater than 0"));
        }
        if self.density_depth == Some(0) {
            return Err(invalid("density_depth must be greater than 0"));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ForestConfig = toml::from_str(content)
            .map_err(|e| ForestError::InvalidOption(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForestError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to pretty TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ForestError::Config(e.to_string()))
    }
}

fn invalid(message: impl Into<String>) -> ForestError {
    ForestError::InvalidOption(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ForestConfig::new(3, 2);
        assert_eq!(config.num_trees, 50);
        assert_eq!(config.sample_size, 256);
        assert_eq!(config.effective_output_after(), 256);
        assert_eq!(config.shingled_dimensions(), 6);
        assert_eq!(config.effective_density_depth(), 8);
        assert!((config.effective_lambda() - 0.1 / 256.0).abs() < 1e-15);
        assert!(!config.parallel_execution_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ForestConfig::new(2, 1)
            .with_num_trees(10)
            .with_sample_size(32)
            .with_output_after(5)
            .with_random_seed(42)
            .with_parallel_execution(true)
            .with_lambda(0.01)
            .with_num_threads(4);
        assert_eq!(config.num_trees, 10);
        assert_eq!(config.sample_size, 32);
        assert_eq!(config.effective_output_after(), 5);
        assert_eq!(config.random_seed, Some(42));
        assert_eq!(config.effective_lambda(), 0.01);
        assert_eq!(config.num_threads, Some(4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let bad = [
            ForestConfig::new(0, 1),
            ForestConfig::new(1, 0),
            ForestConfig::new(1, 1).with_num_trees(0),
            ForestConfig::new(1, 1).with_sample_size(0),
            ForestConfig::new(1, 1).with_lambda(-1.0),
            ForestConfig::new(1, 1).with_lambda(f64::NAN),
            ForestConfig::new(1, 1).with_num_threads(0),
            ForestConfig::new(1, 1).with_density_depth(0),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ForestError::InvalidOption(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ForestConfig::new(4, 3).with_random_seed(7).with_lambda(0.001);
        let text = config.to_toml_string().unwrap();
        let parsed = ForestConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_toml_unknown_field_rejected() {
        let text = "dimensions = 2\nshingle_size = 1\nnum_tress = 5\n";
        assert!(matches!(
            ForestConfig::from_toml_str(text),
            Err(ForestError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_toml_missing_required_field() {
        assert!(ForestConfig::from_toml_str("shingle_size = 1\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dimensions = 5").unwrap();
        writeln!(file, "shingle_size = 2").unwrap();
        writeln!(file, "output_after = 1").unwrap();
        let config = ForestConfig::load(file.path()).unwrap();
        assert_eq!(config.dimensions, 5);
        assert_eq!(config.effective_output_after(), 1);
        assert_eq!(config.num_trees, DEFAULT_NUM_TREES);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ForestConfig::load("/nonexistent/rcforest.toml");
        assert!(matches!(result, Err(ForestError::Config(_))));
    }
}
