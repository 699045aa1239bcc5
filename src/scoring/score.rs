//! Scalar scores: anomaly score and displacement
//!
//! Both follow the same recursion. Starting from the leaf the query lands in,
//!
//! ```text
//! s = damp(m, M) * seen(d, m)     if the query equals the leaf's point(s)
//! s = unseen(d, 1)                otherwise
//! ```
//!
//! and at every ancestor at depth `d` with mass `m`, where `p` is the
//! probability that a random cut of the node's box extended by the query
//! isolates the query,
//!
//! ```text
//! s = (1 - p) * s + p * unseen(d, m)
//! ```
//!
//! The root's value is finally passed through `normalize(s, M)` with `M`
//! the tree's mass.

use super::{visit_upward, LeafVisit, Visitor};
use crate::tree::{Node, RandomCutTree};

/// Functions that shape a scalar score
#[derive(Debug, Clone, Copy)]
pub struct ScoringRule {
    pub seen: fn(depth: usize, mass: usize) -> f64,
    pub unseen: fn(depth: usize, mass: usize) -> f64,
    pub damp: fn(leaf_mass: usize, tree_mass: usize) -> f64,
    pub normalize: fn(score: f64, tree_mass: usize) -> f64,
}

/// Anomaly score: isolation at shallow depth scores high.
///
/// `unseen = 1 / (d + 1)`, `seen = 1 / (d + log2(m + 1))`,
/// `damp = 1 - m / (2M)`, `normalize = s * (1 + log2(1 + M))`.
/// A point isolated at the root scores `1 + log2(1 + M)`.
pub const ANOMALY: ScoringRule = ScoringRule {
    seen: |depth, mass| 1.0 / (depth as f64 + ((mass + 1) as f64).log2()),
    unseen: |depth, _| 1.0 / (depth as f64 + 1.0),
    damp: |leaf_mass, tree_mass| 1.0 - leaf_mass as f64 / (2.0 * tree_mass as f64),
    normalize: |score, tree_mass| score * (1.0 + ((tree_mass + 1) as f64).log2()),
};

/// Displacement: expected share of the tree's mass that ends up as the
/// sibling of the query if it were inserted. Duplicates displace nothing.
pub const DISPLACEMENT: ScoringRule = ScoringRule {
    seen: |_, _| 0.0,
    unseen: |_, mass| mass as f64,
    damp: |_, _| 1.0,
    normalize: |score, tree_mass| {
        if tree_mass == 0 {
            0.0
        } else {
            score / tree_mass as f64
        }
    },
};

pub struct ScalarScoreVisitor {
    rule: ScoringRule,
    tree_mass: usize,
    score: f64,
}

impl ScalarScoreVisitor {
    pub fn new(rule: ScoringRule, tree_mass: usize) -> Self {
        Self {
            rule,
            tree_mass,
            score: 0.0,
        }
    }
}

impl Visitor for ScalarScoreVisitor {
    type Output = f64;

    fn accept_leaf(&mut self, leaf: LeafVisit<'_>, _point: &[f64]) {
        self.score = if leaf.duplicate {
            (self.rule.damp)(leaf.mass, self.tree_mass) * (self.rule.seen)(leaf.depth, leaf.mass)
        } else {
            (self.rule.unseen)(leaf.depth, leaf.mass)
        };
    }

    fn accept(&mut self, node: &Node, depth: usize, point: &[f64]) {
        let p = node.bbox.separation_probability(point);
        if p > 0.0 {
            self.score = (1.0 - p) * self.score + p * (self.rule.unseen)(depth, node.mass);
        }
    }

    fn result(self, tree_mass: usize) -> f64 {
        (self.rule.normalize)(self.score, tree_mass).max(0.0)
    }
}

/// Score `point` against one tree with an arbitrary rule; 0 for an empty tree
pub fn scalar_score(tree: &RandomCutTree, point: &[f64], rule: ScoringRule) -> f64 {
    let visitor = ScalarScoreVisitor::new(rule, tree.mass());
    visit_upward(tree, point, visitor).unwrap_or(0.0)
}

pub fn anomaly_score(tree: &RandomCutTree, point: &[f64]) -> f64 {
    scalar_score(tree, point, ANOMALY)
}

pub fn displacement_score(tree: &RandomCutTree, point: &[f64]) -> f64 {
    scalar_score(tree, point, DISPLACEMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::CutRng;
    use crate::scoring::test_support::cluster_tree;
    use crate::types::Sample;

    #[test]
    fn test_empty_tree_scores_zero() {
        let tree = RandomCutTree::new(2, 4);
        assert_eq!(anomaly_score(&tree, &[1.0, 1.0]), 0.0);
        assert_eq!(displacement_score(&tree, &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_single_leaf_tree() {
        let mut rng = CutRng::seeded(1);
        let mut tree = RandomCutTree::new(1, 4);
        tree.insert(Sample::new(vec![0.0], 0, 0), &mut rng).unwrap();

        // isolated at the root: 1 * (1 + log2 2)
        assert!((anomaly_score(&tree, &[5.0]) - 2.0).abs() < 1e-12);
        // seen: damp 0.5 * 1 / (0 + 1), normalized by 2
        assert!((anomaly_score(&tree, &[0.0]) - 1.0).abs() < 1e-12);
        assert!((displacement_score(&tree, &[5.0]) - 1.0).abs() < 1e-12);
        assert_eq!(displacement_score(&tree, &[0.0]), 0.0);
    }

    #[test]
    fn test_outlier_scores_higher_than_inlier() {
        let tree = cluster_tree(2, 128);
        let inlier = anomaly_score(&tree, &[0.5, 0.5]);
        let outlier = anomaly_score(&tree, &[50.0, -50.0]);
        assert!(outlier > inlier, "outlier {} inlier {}", outlier, inlier);
        // nearly certain isolation at the root
        let bound = 1.0 + (129f64).log2();
        assert!(outlier > 0.95 * bound && outlier <= bound + 1e-9);
    }

    #[test]
    fn test_displacement_bounded() {
        let tree = cluster_tree(3, 64);
        for q in [[0.5, 0.5], [2.0, 2.0], [100.0, 0.0], [-3.0, 0.2]] {
            let d = displacement_score(&tree, &q);
            assert!((0.0..=1.0).contains(&d), "{}", d);
        }
        assert!(displacement_score(&tree, &[100.0, 0.0]) > 0.9);
    }

    #[test]
    fn test_score_is_read_only() {
        let tree = cluster_tree(4, 32);
        let first = anomaly_score(&tree, &[0.2, 0.9]);
        let second = anomaly_score(&tree, &[0.2, 0.9]);
        assert_eq!(first.to_bits(), second.to_bits());
        tree.check_invariants().unwrap();
    }
}
