//! Shared data types

use serde::{Deserialize, Serialize};

/// A shingled point retained by one tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Shingled coordinates
    pub point: Vec<f64>,
    /// Value of the forest's shingle counter when the sample was offered
    pub timestamp: u64,
    /// Unique id used for eviction and tie-breaking
    pub sequence: u64,
}

impl Sample {
    pub fn new(point: Vec<f64>, timestamp: u64, sequence: u64) -> Self {
        Self {
            point,
            timestamp,
            sequence,
        }
    }
}

/// Directional vector: per-coordinate contributions split by whether the
/// query was below (`low`) or above (`high`) the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiVector {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl DiVector {
    pub fn zeros(dimensions: usize) -> Self {
        Self {
            low: vec![0.0; dimensions],
            high: vec![0.0; dimensions],
        }
    }

    pub fn dimensions(&self) -> usize {
        self.low.len()
    }

    /// Sum of every entry in both buckets
    pub fn total(&self) -> f64 {
        self.low.iter().sum::<f64>() + self.high.iter().sum::<f64>()
    }

    pub fn scale(&mut self, factor: f64) {
        self.low.iter_mut().for_each(|v| *v *= factor);
        self.high.iter_mut().for_each(|v| *v *= factor);
    }

    /// `self = self * keep + other * add`
    pub fn blend(&mut self, keep: f64, other: &DiVector, add: f64) {
        for i in 0..self.low.len() {
            self.low[i] = self.low[i] * keep + other.low[i] * add;
            self.high[i] = self.high[i] * keep + other.high[i] * add;
        }
    }

    /// Elementwise mean; each part is scaled before summing so entries
    /// near `f64::MAX` cannot overflow
    pub fn mean_of(parts: &[DiVector], dimensions: usize) -> DiVector {
        let mut mean = DiVector::zeros(dimensions);
        if parts.is_empty() {
            return mean;
        }
        let weight = 1.0 / parts.len() as f64;
        for part in parts {
            mean.blend(1.0, part, weight);
        }
        mean.low.iter_mut().chain(mean.high.iter_mut()).for_each(|v| *v = v.min(f64::MAX));
        mean
    }
}

/// Directional summary of the neighborhood a query falls into
///
/// Built over the query's path from leaf to root like the anomaly score:
/// `probability_mass` is the chance the query is separated along each axis
/// and direction, `measure` the sample mass it is separated from and
/// `distance` the expected gap at the separating cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationMeasure {
    pub measure: DiVector,
    pub distance: DiVector,
    pub probability_mass: DiVector,
    /// Samples the measure was taken over
    pub sample_size: f64,
}

impl InterpolationMeasure {
    pub fn zeros(dimensions: usize) -> Self {
        Self {
            measure: DiVector::zeros(dimensions),
            distance: DiVector::zeros(dimensions),
            probability_mass: DiVector::zeros(dimensions),
            sample_size: 0.0,
        }
    }

    /// Componentwise mean of per-tree measures
    pub fn mean_of(parts: &[InterpolationMeasure], dimensions: usize) -> Self {
        let collect = |f: fn(&InterpolationMeasure) -> &DiVector| {
            let vectors: Vec<DiVector> = parts.iter().map(|p| f(p).clone()).collect();
            DiVector::mean_of(&vectors, dimensions)
        };
        let sample_size = if parts.is_empty() {
            0.0
        } else {
            parts.iter().map(|p| p.sample_size).sum::<f64>() / parts.len() as f64
        };
        Self {
            measure: collect(|p| &p.measure),
            distance: collect(|p| &p.distance),
            probability_mass: collect(|p| &p.probability_mass),
            sample_size,
        }
    }
}

/// Forecast values with a per-coordinate interval, `lower <= values <= upper`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeVector {
    pub values: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

impl RangeVector {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            upper: Vec::with_capacity(capacity),
            lower: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: f64, lower: f64, upper: f64) {
        self.values.push(value);
        self.lower.push(lower);
        self.upper.push(upper);
    }
}

/// One entry of a near-neighbor answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearNeighbor {
    /// Shingled coordinates of the retained sample
    pub point: Vec<f64>,
    /// Euclidean distance to the query shingle
    pub distance: f64,
    /// Anomaly score of the neighbor itself
    pub score: f64,
}
