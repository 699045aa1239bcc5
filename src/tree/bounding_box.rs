//! Axis-aligned bounding boxes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    min: Vec<f64>,
    max: Vec<f64>,
    range_sum: f64,
}

impl BoundingBox {
    /// Degenerate box around a single point
    pub fn from_point(point: &[f64]) -> Self {
        Self {
            min: point.to_vec(),
            max: point.to_vec(),
            range_sum: 0.0,
        }
    }

    /// Smallest box containing both `a` and `b`
    pub fn union(a: &BoundingBox, b: &BoundingBox) -> Self {
        let mut merged = a.clone();
        merged.merge(b);
        merged
    }

    pub fn dimensions(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    #[inline]
    pub fn range(&self, dim: usize) -> f64 {
        self.max[dim] - self.min[dim]
    }

    /// Sum of the side lengths
    #[inline]
    pub fn range_sum(&self) -> f64 {
        self.range_sum
    }

    /// Grow in place to include `point`
    pub fn extend(&mut self, point: &[f64]) {
        for (i, &v) in point.iter().enumerate() {
            if v < self.min[i] {
                self.min[i] = v;
            }
            if v > self.max[i] {
                self.max[i] = v;
            }
        }
        self.recompute_range_sum();
    }

    /// Grow in place to include `other`
    pub fn merge(&mut self, other: &BoundingBox) {
        for i in 0..self.min.len() {
            if other.min[i] < self.min[i] {
                self.min[i] = other.min[i];
            }
            if other.max[i] > self.max[i] {
                self.max[i] = other.max[i];
            }
        }
        self.recompute_range_sum();
    }

    /// Copy of this box grown to include `point`
    pub fn extended(&self, point: &[f64]) -> Self {
        let mut merged = self.clone();
        merged.extend(point);
        merged
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point
            .iter()
            .enumerate()
            .all(|(i, &v)| v >= self.min[i] && v <= self.max[i])
    }

    /// Probability that a random cut of `self ∪ {point}` separates `point`
    /// from this box: the growth in range sum relative to the merged range sum.
    pub fn separation_probability(&self, point: &[f64]) -> f64 {
        let ext = self.extension(point);
        if ext.growth > 0.0 {
            (ext.growth / ext.merged).min(1.0)
        } else {
            0.0
        }
    }

    /// Per-dimension split of [`separation_probability`](Self::separation_probability):
    /// returns `(low, high)` where `low[i]` is the share from `point` lying
    /// below the box on axis `i` and `high[i]` above it.
    pub fn directional_separation(&self, point: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let Extension {
            mut low,
            mut high,
            growth,
            merged,
        } = self.extension(point);
        if growth > 0.0 {
            low.iter_mut().for_each(|v| *v /= merged);
            high.iter_mut().for_each(|v| *v /= merged);
        } else {
            low.iter_mut().for_each(|v| *v = 0.0);
            high.iter_mut().for_each(|v| *v = 0.0);
        }
        (low, high)
    }

    /// Distance from the box to `point` along each axis, below and above.
    /// Saturates at `f64::MAX` when the difference overflows.
    pub fn gaps(&self, point: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let saturate = |v: f64| v.min(f64::MAX);
        let low = (0..self.min.len())
            .map(|i| saturate((self.min[i] - point[i]).max(0.0)))
            .collect();
        let high = (0..self.min.len())
            .map(|i| saturate((point[i] - self.max[i]).max(0.0)))
            .collect();
        (low, high)
    }

    /// Sum of ln(max(range, floor)) over all dimensions
    pub fn log_volume(&self, floor: f64) -> f64 {
        (0..self.min.len())
            .map(|i| self.range(i).max(floor).ln())
            .sum()
    }

    fn recompute_range_sum(&mut self) {
        self.range_sum = self
            .min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| hi - lo)
            .sum();
    }

    // Growth of the box towards `point`. When the sums overflow, everything
    // is measured at a reduced common scale; only the ratios are used.
    fn extension(&self, point: &[f64]) -> Extension {
        let exact = self.extension_at(point, 1.0);
        if exact.merged.is_finite() {
            exact
        } else {
            self.extension_at(point, 0.125 / self.min.len().max(1) as f64)
        }
    }

    fn extension_at(&self, point: &[f64], scale: f64) -> Extension {
        let dims = self.min.len();
        let mut low = vec![0.0; dims];
        let mut high = vec![0.0; dims];
        let mut growth = 0.0;
        let mut ranges = 0.0;
        for (i, &v) in point.iter().enumerate() {
            let (lo, hi, v) = (self.min[i] * scale, self.max[i] * scale, v * scale);
            ranges += hi - lo;
            if v < lo {
                low[i] = lo - v;
                growth += low[i];
            } else if v > hi {
                high[i] = v - hi;
                growth += high[i];
            }
        }
        Extension {
            low,
            high,
            growth,
            merged: ranges + growth,
        }
    }
}

struct Extension {
    low: Vec<f64>,
    high: Vec<f64>,
    growth: f64,
    merged: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_point_is_degenerate() {
        let b = BoundingBox::from_point(&[1.0, 2.0]);
        assert_eq!(b.range_sum(), 0.0);
        assert!(b.contains(&[1.0, 2.0]));
        assert!(!b.contains(&[1.0, 2.5]));
    }

    #[test]
    fn test_extend_and_union() {
        let mut b = BoundingBox::from_point(&[0.0, 0.0]);
        b.extend(&[2.0, -1.0]);
        assert_eq!(b.min(), &[0.0, -1.0]);
        assert_eq!(b.max(), &[2.0, 0.0]);
        assert_eq!(b.range_sum(), 3.0);

        let other = BoundingBox::from_point(&[5.0, 5.0]);
        let u = BoundingBox::union(&b, &other);
        assert_eq!(u.min(), &[0.0, -1.0]);
        assert_eq!(u.max(), &[5.0, 5.0]);
        assert_eq!(u.range_sum(), 11.0);
    }

    #[test]
    fn test_separation_probability() {
        let mut b = BoundingBox::from_point(&[0.0, 0.0]);
        b.extend(&[1.0, 1.0]);
        assert_eq!(b.separation_probability(&[0.5, 0.5]), 0.0);
        // growth 2 on a merged range sum of 4
        assert!((b.separation_probability(&[3.0, 0.5]) - 0.5).abs() < 1e-12);
        // a point box is always separated from a distinct point
        let p = BoundingBox::from_point(&[0.0, 0.0]);
        assert_eq!(p.separation_probability(&[0.0, 1.0]), 1.0);
        assert_eq!(p.separation_probability(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_directional_separation_sums_to_probability() {
        let mut b = BoundingBox::from_point(&[0.0, 0.0, 0.0]);
        b.extend(&[1.0, 1.0, 1.0]);
        let q = [-1.0, 0.5, 4.0];
        let (low, high) = b.directional_separation(&q);
        let total: f64 = low.iter().chain(&high).sum();
        assert!((total - b.separation_probability(&q)).abs() < 1e-12);
        assert!(low[0] > 0.0 && high[0] == 0.0);
        assert_eq!(low[1], 0.0);
        assert_eq!(high[1], 0.0);
        assert!(high[2] > low[2]);
    }

    #[test]
    fn test_overflowing_ranges_stay_consistent() {
        let mut b = BoundingBox::from_point(&[-1e308, 0.0]);
        b.extend(&[1e308, 0.0]);
        assert!(b.range_sum().is_infinite());

        for q in [[0.0, 1.0], [0.0, -1e308], [0.0, 1e308]] {
            let p = b.separation_probability(&q);
            let (low, high) = b.directional_separation(&q);
            let total: f64 = low.iter().chain(&high).sum();
            assert!(p > 0.0 && p <= 1.0, "{:?}: {}", q, p);
            assert!((total - p).abs() <= 1e-12 * p, "{:?}: {} vs {}", q, total, p);
            assert_eq!(low[0] + high[0], 0.0);
        }
        assert_eq!(b.separation_probability(&[5.0, 0.0]), 0.0);

        let (low, high) = b.gaps(&[0.0, -1e308]);
        assert_eq!(low, vec![0.0, 1e308]);
        assert_eq!(high, vec![0.0, 0.0]);
    }

    #[test]
    fn test_gaps() {
        let mut b = BoundingBox::from_point(&[0.0, 0.0]);
        b.extend(&[1.0, 1.0]);
        let (low, high) = b.gaps(&[-2.0, 1.5]);
        assert_eq!(low, vec![2.0, 0.0]);
        assert_eq!(high, vec![0.0, 0.5]);
    }

    #[test]
    fn test_log_volume_floor() {
        let mut b = BoundingBox::from_point(&[0.0, 0.0]);
        b.extend(&[2.0, 0.0]);
        let v = b.log_volume(0.5);
        assert!((v - (2.0f64.ln() + 0.5f64.ln())).abs() < 1e-12);
    }
}
