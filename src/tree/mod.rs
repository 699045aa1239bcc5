//! Random Cut Tree
//!
//! A binary tree over shingled points in which every internal node stores a
//! random axis-aligned cut, the tightest bounding box of the leaves below it
//! and their count (`mass`). Every leaf holds exactly one [`Sample`].
//!
//! Nodes live in an index arena addressed by [`NodeId`]; parent links make the
//! bottom-up box and mass maintenance after an insert or delete a walk over
//! the ancestors only.

pub mod bounding_box;
pub mod cut;
pub mod node;

use std::collections::HashMap;

use tracing::trace;

pub use bounding_box::BoundingBox;
pub use cut::Cut;
pub use node::{Node, NodeId, NodeKind};

use node::NodeStore;

use crate::error::{ForestError, Result};
use crate::rng::CutRng;
use crate::types::Sample;

/// Nodes visited by a read-only descent, root first
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    path: Vec<NodeId>,
}

impl Traversal {
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// Leaf the descent ended at
    pub fn leaf(&self) -> Option<NodeId> {
        self.path.last().copied()
    }

    /// Depth of the leaf (root is depth 0)
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

enum InsertStep {
    /// Put the new leaf next to the current subtree under a new internal node
    Split { cut: Cut, new_on_left: bool },
    Descend(NodeId),
}

#[derive(Debug, Clone)]
pub struct RandomCutTree {
    dimensions: usize,
    store: NodeStore,
    root: Option<NodeId>,
    /// sequence -> leaf holding that sample
    leaves: HashMap<u64, NodeId>,
}

impl RandomCutTree {
    pub fn new(dimensions: usize, capacity: usize) -> Self {
        Self {
            dimensions,
            store: NodeStore::with_capacity(2 * capacity.max(1)),
            root: None,
            leaves: HashMap::with_capacity(capacity),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.store[id]
    }

    /// Number of samples (leaves)
    pub fn mass(&self) -> usize {
        self.root.map(|r| self.store[r].mass).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, sequence: u64) -> bool {
        self.leaves.contains_key(&sequence)
    }

    /// Occupied arena slots
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    /// Insert a sample, drawing cuts from the root down until one separates it
    pub fn insert(&mut self, sample: Sample, rng: &mut CutRng) -> Result<()> {
        if sample.point.len() != self.dimensions {
            return Err(ForestError::DimensionMismatch {
                expected: self.dimensions,
                got: sample.point.len(),
            });
        }
        if self.leaves.contains_key(&sample.sequence) {
            return Err(ForestError::DuplicateSample(sample.sequence));
        }

        let sequence = sample.sequence;
        let point = sample.point.clone();

        let Some(root) = self.root else {
            let leaf = self.store.alloc(Node::leaf(sample, None));
            self.root = Some(leaf);
            self.leaves.insert(sequence, leaf);
            trace!(sequence, "inserted first leaf");
            return Ok(());
        };

        let mut current = root;
        let mut depth = 0usize;
        loop {
            let node = &self.store[current];
            if node.bbox.range_sum() == 0.0 && node.bbox.contains(&point) {
                // Every sample below is a copy of the point. Split a leaf
                // reached by coin flips so the cluster stays shallow.
                let mut target = current;
                while let Some((_, left, right)) = self.store[target].split() {
                    target = if rng.uniform() < 0.5 { left } else { right };
                    depth += 1;
                }
                trace!(sequence, depth, "stacked duplicate point");
                let cut = Cut::degenerate(&point, rng);
                let bbox = self.store[target].bbox.clone();
                self.split_at(target, sample, cut, true, bbox, &point);
                return Ok(());
            }

            let merged = node.bbox.extended(&point);
            let drawn = Cut::random(&merged, rng).filter(|c| c.separates(&node.bbox, &point));

            let step = match (&node.kind, drawn) {
                (_, Some(cut)) => InsertStep::Split {
                    cut,
                    new_on_left: cut.goes_left(&point),
                },
                (NodeKind::Leaf(existing), None) => match Cut::between(&existing.point, &point) {
                    Some(cut) => InsertStep::Split {
                        cut,
                        new_on_left: cut.goes_left(&point),
                    },
                    None => return Err(ForestError::DuplicateSample(sequence)),
                },
                (_, None) => match node.child_for(&point) {
                    Some(child) => InsertStep::Descend(child),
                    None => return Err(ForestError::NotFound(sequence)),
                },
            };

            match step {
                InsertStep::Descend(child) => {
                    current = child;
                    depth += 1;
                }
                InsertStep::Split { cut, new_on_left } => {
                    self.split_at(current, sample, cut, new_on_left, merged, &point);
                    trace!(sequence, depth, dim = cut.dimension, "inserted leaf");
                    return Ok(());
                }
            }
        }
    }

    fn split_at(
        &mut self,
        sibling: NodeId,
        sample: Sample,
        cut: Cut,
        new_on_left: bool,
        merged: BoundingBox,
        point: &[f64],
    ) {
        let sequence = sample.sequence;
        let parent = self.store[sibling].parent;
        let mass = self.store[sibling].mass + 1;

        let leaf = self.store.alloc(Node::leaf(sample, None));
        let (left, right) = if new_on_left {
            (leaf, sibling)
        } else {
            (sibling, leaf)
        };
        let internal = self
            .store
            .alloc(Node::internal(cut, left, right, merged, mass, parent));
        self.store[leaf].parent = Some(internal);
        self.store[sibling].parent = Some(internal);

        match parent {
            Some(p) => self.store[p].replace_child(sibling, internal),
            None => self.root = Some(internal),
        }
        self.leaves.insert(sequence, leaf);

        let mut up = parent;
        while let Some(id) = up {
            let node = &mut self.store[id];
            node.mass += 1;
            node.bbox.extend(point);
            up = node.parent;
        }
    }

    /// Remove the sample with `sequence`, promoting its sibling
    pub fn delete(&mut self, sequence: u64) -> Result<Sample> {
        let leaf = self
            .leaves
            .remove(&sequence)
            .ok_or(ForestError::NotFound(sequence))?;

        let parent = self.store[leaf].parent;
        let sibling = parent.and_then(|p| self.store[p].sibling_of(leaf));
        let removed = self.store.release(leaf);
        let NodeKind::Leaf(sample) = removed.kind else {
            return Err(ForestError::NotFound(sequence));
        };

        let (Some(parent), Some(sibling)) = (parent, sibling) else {
            self.root = None;
            trace!(sequence, "tree emptied");
            return Ok(sample);
        };

        let grandparent = self.store[parent].parent;
        self.store.release(parent);
        self.store[sibling].parent = grandparent;
        match grandparent {
            Some(g) => self.store[g].replace_child(parent, sibling),
            None => self.root = Some(sibling),
        }

        let mut up = grandparent;
        while let Some(id) = up {
            let bbox = match self.store[id].split() {
                Some((_, left, right)) => {
                    BoundingBox::union(&self.store[left].bbox, &self.store[right].bbox)
                }
                None => self.store[id].bbox.clone(),
            };
            let node = &mut self.store[id];
            node.mass -= 1;
            node.bbox = bbox;
            up = node.parent;
        }

        trace!(sequence, "deleted leaf");
        Ok(sample)
    }

    /// Read-only descent following the cuts
    pub fn traverse(&self, point: &[f64]) -> Traversal {
        let mut path = Vec::new();
        let mut current = self.root;
        while let Some(id) = current {
            path.push(id);
            current = self.store[id].child_for(point);
        }
        Traversal { path }
    }

    /// Samples in the subtree rooted at `id`, left to right
    pub fn samples_under(&self, id: NodeId) -> Vec<&Sample> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.store[current];
            match &node.kind {
                NodeKind::Leaf(sample) => out.push(sample),
                NodeKind::Internal { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
                NodeKind::Vacant => {}
            }
        }
        out
    }

    /// All samples, left to right
    pub fn samples(&self) -> Vec<&Sample> {
        self.root.map(|r| self.samples_under(r)).unwrap_or_default()
    }

    /// Depth of the deepest leaf
    #[cfg(test)]
    pub(crate) fn max_depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut deepest = 0;
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Some((_, left, right)) = self.store[id].split() {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        deepest
    }

    /// Verify masses, boxes, parent links and the leaf index
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        let Some(root) = self.root else {
            return if self.leaves.is_empty() {
                Ok(())
            } else {
                Err(format!("empty tree indexes {} leaves", self.leaves.len()))
            };
        };
        if self.store[root].parent.is_some() {
            return Err("root has a parent".into());
        }

        let mut leaf_count = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.store[id];
            match &node.kind {
                NodeKind::Leaf(sample) => {
                    leaf_count += 1;
                    if node.mass != 1 {
                        return Err(format!("leaf {} has mass {}", sample.sequence, node.mass));
                    }
                    if node.bbox != BoundingBox::from_point(&sample.point) {
                        return Err(format!("leaf {} box is not its point", sample.sequence));
                    }
                    if self.leaves.get(&sample.sequence) != Some(&id) {
                        return Err(format!("leaf {} missing from index", sample.sequence));
                    }
                }
                NodeKind::Internal { left, right, .. } => {
                    let (l, r) = (&self.store[*left], &self.store[*right]);
                    if l.parent != Some(id) || r.parent != Some(id) {
                        return Err(format!("broken parent link under {:?}", id));
                    }
                    if node.mass != l.mass + r.mass {
                        return Err(format!("mass mismatch at {:?}", id));
                    }
                    if node.bbox != BoundingBox::union(&l.bbox, &r.bbox) {
                        return Err(format!("box mismatch at {:?}", id));
                    }
                    stack.push(*left);
                    stack.push(*right);
                }
                NodeKind::Vacant => return Err(format!("vacant node {:?} reachable", id)),
            }
        }

        if leaf_count != self.leaves.len() || leaf_count != self.mass() {
            return Err(format!(
                "{} leaves reachable, {} indexed, root mass {}",
                leaf_count,
                self.leaves.len(),
                self.mass()
            ));
        }
        if self.store.len() != 2 * leaf_count - 1 {
            return Err(format!(
                "{} nodes for {} leaves",
                self.store.len(),
                leaf_count
            ));
        }
        Ok(())
    }
}
