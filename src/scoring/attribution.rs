//! Directional attribution of the anomaly score
//!
//! Same recursion as the scalar anomaly score, with the separation
//! probability split per coordinate and direction. The entries of the result
//! sum to the tree's anomaly score.

use super::score::{ScoringRule, ANOMALY};
use super::{visit_upward, LeafVisit, Visitor};
use crate::tree::{Node, RandomCutTree};
use crate::types::DiVector;

struct AttributionVisitor {
    rule: ScoringRule,
    tree_mass: usize,
    attribution: DiVector,
}

impl AttributionVisitor {
    fn directional(node: &Node, point: &[f64]) -> DiVector {
        let (low, high) = node.bbox.directional_separation(point);
        DiVector { low, high }
    }
}

impl Visitor for AttributionVisitor {
    type Output = DiVector;

    fn accept_leaf(&mut self, leaf: LeafVisit<'_>, point: &[f64]) {
        if leaf.duplicate {
            let score = (self.rule.damp)(leaf.mass, self.tree_mass)
                * (self.rule.seen)(leaf.depth, leaf.mass);
            let share = score / (2 * point.len()) as f64;
            self.attribution.low.iter_mut().for_each(|v| *v = share);
            self.attribution.high.iter_mut().for_each(|v| *v = share);
        } else {
            let unseen = (self.rule.unseen)(leaf.depth, leaf.mass);
            self.attribution = Self::directional(leaf.node, point);
            self.attribution.scale(unseen);
        }
    }

    fn accept(&mut self, node: &Node, depth: usize, point: &[f64]) {
        let split = Self::directional(node, point);
        let p = split.total();
        if p > 0.0 {
            let unseen = (self.rule.unseen)(depth, node.mass);
            self.attribution.blend(1.0 - p, &split, unseen);
        }
    }

    fn result(mut self, tree_mass: usize) -> DiVector {
        let factor = (self.rule.normalize)(1.0, tree_mass);
        self.attribution.scale(factor);
        self.attribution
    }
}

/// Attribution of `point` against one tree; zeros for an empty tree
pub fn attribution(tree: &RandomCutTree, point: &[f64]) -> DiVector {
    let visitor = AttributionVisitor {
        rule: ANOMALY,
        tree_mass: tree.mass(),
        attribution: DiVector::zeros(point.len()),
    };
    visit_upward(tree, point, visitor).unwrap_or_else(|| DiVector::zeros(point.len()))
}
