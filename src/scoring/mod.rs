//! Per-tree query algorithms
//!
//! Scores are computed by walking a tree's traversal path from the leaf back
//! to the root. A [`Visitor`] sees the leaf (or the cluster of duplicates the
//! query lands in) first, then every ancestor with the probability that a
//! random cut there would have separated the query. Nothing here mutates a
//! tree; the forest averages the per-tree results.

pub mod attribution;
pub mod density;
pub mod impute;
pub mod neighbor;
pub mod score;

pub use attribution::attribution;
pub use density::{density, directional_density, interpolant};
pub use impute::impute;
pub use neighbor::{near_neighbors, Candidate};
pub use score::{anomaly_score, displacement_score, ScoringRule, ANOMALY, DISPLACEMENT};

use crate::tree::{Node, RandomCutTree};

/// Where the upward walk starts
#[derive(Debug, Clone, Copy)]
pub struct LeafVisit<'a> {
    pub node: &'a Node,
    pub depth: usize,
    /// Leaves represented by `node`
    pub mass: usize,
    /// The query coincides with every sample under `node`
    pub duplicate: bool,
}

pub trait Visitor {
    type Output;

    fn accept_leaf(&mut self, leaf: LeafVisit<'_>, point: &[f64]);

    fn accept(&mut self, node: &Node, depth: usize, point: &[f64]);

    fn result(self, tree_mass: usize) -> Self::Output;
}

/// Run `visitor` over the traversal path of `point`, bottom-up.
/// Returns `None` for an empty tree.
pub fn visit_upward<V: Visitor>(tree: &RandomCutTree, point: &[f64], mut visitor: V) -> Option<V::Output> {
    let traversal = tree.traverse(point);
    let path = traversal.path();
    let leaf_id = traversal.leaf()?;
    let leaf = tree.node(leaf_id);

    let duplicate = leaf.sample().is_some_and(|s| s.point.as_slice() == point);

    // Duplicates of one point hang off each other in zero-extent subtrees;
    // treat the largest such subtree as a single leaf of higher mass.
    let mut start = path.len() - 1;
    if duplicate {
        while start > 0 && tree.node(path[start - 1]).bbox.range_sum() == 0.0 {
            start -= 1;
        }
    }

    let node = tree.node(path[start]);
    visitor.accept_leaf(
        LeafVisit {
            node,
            depth: start,
            mass: node.mass,
            duplicate,
        },
        point,
    );
    for depth in (0..start).rev() {
        visitor.accept(tree.node(path[depth]), depth, point);
    }

    Some(visitor.result(tree.mass()))
}
