//! Local density estimate
//!
//! Per tree: the deepest node on the query's path, no deeper than the depth
//! limit, whose box contains the query; its mass divided by the product of
//! its side lengths (each floored at [`RANGE_FLOOR`]). A query outside the
//! root's box has density 0.
//!
//! The interpolation measure walks the same path bottom-up and records, per
//! axis and direction, how likely the query is to be cut off there, from how
//! much mass and across how wide a gap. Its probability masses sum to 1 on a
//! non-empty tree and split the density into a [`DiVector`].

use super::{visit_upward, LeafVisit, Visitor};
use crate::tree::{Node, RandomCutTree};
use crate::types::{DiVector, InterpolationMeasure};

/// Smallest side length used in the volume product
pub const RANGE_FLOOR: f64 = 1e-6;

pub fn density(tree: &RandomCutTree, point: &[f64], depth_limit: usize) -> f64 {
    let traversal = tree.traverse(point);
    let enclosing = traversal
        .path()
        .iter()
        .take(depth_limit + 1)
        .map(|&id| tree.node(id))
        .take_while(|node| node.bbox.contains(point))
        .last();

    let Some(node) = enclosing else {
        return 0.0;
    };

    let log_density = (node.mass as f64).ln() - node.bbox.log_volume(RANGE_FLOOR);
    let value = log_density.exp();
    if value.is_finite() {
        value
    } else {
        f64::MAX
    }
}

struct InterpolationVisitor {
    measure: InterpolationMeasure,
}

impl InterpolationVisitor {
    fn target(node: &Node, point: &[f64]) -> (DiVector, DiVector, DiVector) {
        let (low, high) = node.bbox.directional_separation(point);
        let probability = DiVector { low, high };

        let mut measure = probability.clone();
        measure.scale(node.mass as f64);

        let (gap_low, gap_high) = node.bbox.gaps(point);
        let distance = DiVector {
            low: probability.low.iter().zip(&gap_low).map(|(p, g)| p * g).collect(),
            high: probability.high.iter().zip(&gap_high).map(|(p, g)| p * g).collect(),
        };
        (probability, measure, distance)
    }
}

impl Visitor for InterpolationVisitor {
    type Output = InterpolationMeasure;

    fn accept_leaf(&mut self, leaf: LeafVisit<'_>, point: &[f64]) {
        if leaf.duplicate {
            let share = 1.0 / (2 * point.len()) as f64;
            let m = &mut self.measure;
            m.probability_mass.low.iter_mut().for_each(|v| *v = share);
            m.probability_mass.high.iter_mut().for_each(|v| *v = share);
            m.measure = m.probability_mass.clone();
            m.measure.scale(leaf.mass as f64);
        } else {
            let (probability, measure, distance) = Self::target(leaf.node, point);
            self.measure.probability_mass = probability;
            self.measure.measure = measure;
            self.measure.distance = distance;
        }
    }

    fn accept(&mut self, node: &Node, _depth: usize, point: &[f64]) {
        let (probability, measure, distance) = Self::target(node, point);
        let p = probability.total();
        if p > 0.0 {
            let m = &mut self.measure;
            m.probability_mass.blend(1.0 - p, &probability, 1.0);
            m.measure.blend(1.0 - p, &measure, 1.0);
            m.distance.blend(1.0 - p, &distance, 1.0);
        }
    }

    fn result(mut self, tree_mass: usize) -> InterpolationMeasure {
        self.measure.sample_size = tree_mass as f64;
        self.measure
    }
}

/// Interpolation measure of `point` against one tree; zeros for an empty tree
pub fn interpolant(tree: &RandomCutTree, point: &[f64]) -> InterpolationMeasure {
    let visitor = InterpolationVisitor {
        measure: InterpolationMeasure::zeros(point.len()),
    };
    visit_upward(tree, point, visitor).unwrap_or_else(|| InterpolationMeasure::zeros(point.len()))
}

/// [`density`] split across axes and directions by the interpolation
/// probability masses; the entries sum to the scalar density
pub fn directional_density(tree: &RandomCutTree, point: &[f64], depth_limit: usize) -> DiVector {
    let value = density(tree, point, depth_limit);
    if value == 0.0 {
        return DiVector::zeros(point.len());
    }
    let mut split = interpolant(tree, point).probability_mass;
    split.scale(value);
    split
}
