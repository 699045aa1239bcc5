//! Random axis-aligned cuts

use serde::{Deserialize, Serialize};

use super::bounding_box::BoundingBox;
use crate::rng::CutRng;

/// Points with `point[dimension] <= value` belong to the left child.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub dimension: usize,
    pub value: f64,
}

impl Cut {
    pub fn new(dimension: usize, value: f64) -> Self {
        Self { dimension, value }
    }

    #[inline]
    pub fn goes_left(&self, point: &[f64]) -> bool {
        point[self.dimension] <= self.value
    }

    /// Draw a cut over `bbox`: dimension with probability proportional to its
    /// range, value uniform within that range. Returns `None` when the box
    /// has no extent in any dimension.
    pub fn random(bbox: &BoundingBox, rng: &mut CutRng) -> Option<Cut> {
        let total = bbox.range_sum();
        if !(total > 0.0) {
            return None;
        }
        if !total.is_finite() {
            return Some(Self::random_unbounded(bbox, rng));
        }

        let mut remaining = rng.uniform() * total;
        let mut last_positive = None;
        for dim in 0..bbox.dimensions() {
            let range = bbox.range(dim);
            if range <= 0.0 {
                continue;
            }
            last_positive = Some(dim);
            if remaining < range {
                return Some(Self::within(bbox, dim, bbox.min()[dim] + remaining));
            }
            remaining -= range;
        }

        // rounding pushed `remaining` past the last range
        last_positive.map(|dim| Self::within(bbox, dim, bbox.min()[dim]))
    }

    /// Cut for a box with zero extent: uniform dimension, exactly at the point.
    pub fn degenerate(point: &[f64], rng: &mut CutRng) -> Cut {
        let dim = rng.index(point.len());
        Cut::new(dim, point[dim])
    }

    /// Deterministic cut separating two distinct points, if they differ.
    pub fn between(a: &[f64], b: &[f64]) -> Option<Cut> {
        a.iter()
            .zip(b)
            .position(|(x, y)| x != y)
            .map(|dim| Cut::new(dim, a[dim].min(b[dim])))
    }

    /// Whether this cut puts `point` on one side and all of `existing` on the other
    pub fn separates(&self, existing: &BoundingBox, point: &[f64]) -> bool {
        let d = self.dimension;
        if self.goes_left(point) {
            existing.min()[d] > self.value
        } else {
            existing.max()[d] <= self.value
        }
    }

    // Ranges overflowed f64; pick among extended dimensions uniformly.
    fn random_unbounded(bbox: &BoundingBox, rng: &mut CutRng) -> Cut {
        let dims: Vec<usize> = (0..bbox.dimensions())
            .filter(|&d| bbox.range(d) > 0.0)
            .collect();
        let dim = dims[rng.index(dims.len())];
        let (lo, hi) = (bbox.min()[dim], bbox.max()[dim]);
        let u = rng.uniform();
        Self::within(bbox, dim, lo * (1.0 - u) + hi * u)
    }

    // Keep the value inside [min, max) of the chosen dimension.
    fn within(bbox: &BoundingBox, dim: usize, value: f64) -> Cut {
        let (lo, hi) = (bbox.min()[dim], bbox.max()[dim]);
        let value = if value >= hi || value < lo { lo } else { value };
        Cut::new(dim, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(dims: usize) -> BoundingBox {
        let mut b = BoundingBox::from_point(&vec![0.0; dims]);
        b.extend(&vec![1.0; dims]);
        b
    }

    #[test]
    fn test_random_cut_within_box() {
        let bbox = unit_box(3);
        let mut rng = CutRng::seeded(11);
        for _ in 0..500 {
            let cut = Cut::random(&bbox, &mut rng).unwrap();
            assert!(cut.dimension < 3);
            assert!(cut.value >= 0.0 && cut.value < 1.0);
        }
    }

    #[test]
    fn test_random_cut_prefers_wide_dimensions() {
        let mut bbox = BoundingBox::from_point(&[0.0, 0.0]);
        bbox.extend(&[9.0, 1.0]);
        let mut rng = CutRng::seeded(12);
        let wide = (0..2000)
            .filter(|_| Cut::random(&bbox, &mut rng).unwrap().dimension == 0)
            .count();
        // expected 90%
        assert!(wide > 1700 && wide < 1900, "wide = {}", wide);
    }

    #[test]
    fn test_degenerate_box_has_no_random_cut() {
        let bbox = BoundingBox::from_point(&[1.0, 2.0]);
        let mut rng = CutRng::seeded(13);
        assert!(Cut::random(&bbox, &mut rng).is_none());
        let cut = Cut::degenerate(&[1.0, 2.0], &mut rng);
        assert!(cut.goes_left(&[1.0, 2.0]));
    }

    #[test]
    fn test_zero_range_dimension_never_cut() {
        let mut bbox = BoundingBox::from_point(&[5.0, 0.0]);
        bbox.extend(&[5.0, 1.0]);
        let mut rng = CutRng::seeded(14);
        for _ in 0..200 {
            assert_eq!(Cut::random(&bbox, &mut rng).unwrap().dimension, 1);
        }
    }

    #[test]
    fn test_separates() {
        let existing = unit_box(2);
        let point = [3.0, 0.5];
        assert!(Cut::new(0, 2.0).separates(&existing, &point));
        assert!(Cut::new(0, 1.0).separates(&existing, &point));
        assert!(!Cut::new(0, 0.5).separates(&existing, &point));
        assert!(!Cut::new(1, 0.7).separates(&existing, &point));

        let below = [-2.0, 0.5];
        assert!(Cut::new(0, -1.0).separates(&existing, &below));
        assert!(!Cut::new(0, 0.0).separates(&existing, &below));
    }

    #[test]
    fn test_between() {
        let cut = Cut::between(&[1.0, 2.0], &[1.0, 5.0]).unwrap();
        assert_eq!(cut, Cut::new(1, 2.0));
        assert!(Cut::between(&[1.0], &[1.0]).is_none());
    }
}
