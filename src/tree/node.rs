//! Index-addressed node arena
//!
//! Nodes refer to each other by [`NodeId`]; released slots are recycled
//! through a free list so a tree of bounded size never grows its arena past
//! `2 * sample_size - 1` slots.

use std::ops::{Index, IndexMut};

use super::bounding_box::BoundingBox;
use super::cut::Cut;
use crate::types::Sample;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Leaf(Sample),
    Internal { cut: Cut, left: NodeId, right: NodeId },
    /// Slot on the free list
    Vacant,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    /// Leaves in this subtree
    pub mass: usize,
    pub bbox: BoundingBox,
    pub kind: NodeKind,
}

impl Node {
    pub fn leaf(sample: Sample, parent: Option<NodeId>) -> Self {
        Self {
            parent,
            mass: 1,
            bbox: BoundingBox::from_point(&sample.point),
            kind: NodeKind::Leaf(sample),
        }
    }

    pub fn internal(
        cut: Cut,
        left: NodeId,
        right: NodeId,
        bbox: BoundingBox,
        mass: usize,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            parent,
            mass,
            bbox,
            kind: NodeKind::Internal { cut, left, right },
        }
    }

    fn vacant() -> Self {
        Self {
            parent: None,
            mass: 0,
            bbox: BoundingBox::from_point(&[]),
            kind: NodeKind::Vacant,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Sample held by a leaf
    pub fn sample(&self) -> Option<&Sample> {
        match &self.kind {
            NodeKind::Leaf(sample) => Some(sample),
            _ => None,
        }
    }

    /// `(cut, left, right)` of an internal node
    pub fn split(&self) -> Option<(Cut, NodeId, NodeId)> {
        match self.kind {
            NodeKind::Internal { cut, left, right } => Some((cut, left, right)),
            _ => None,
        }
    }

    /// Child on the side of `point`
    pub fn child_for(&self, point: &[f64]) -> Option<NodeId> {
        self.split()
            .map(|(cut, left, right)| if cut.goes_left(point) { left } else { right })
    }

    /// The other child of this internal node
    pub fn sibling_of(&self, child: NodeId) -> Option<NodeId> {
        self.split().and_then(|(_, left, right)| {
            if left == child {
                Some(right)
            } else if right == child {
                Some(left)
            } else {
                None
            }
        })
    }

    /// Point a replaced child slot at `new`
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) {
        if let NodeKind::Internal { left, right, .. } = &mut self.kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeStore {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
}

impl NodeStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Take the node out of its slot and recycle the slot
    pub fn release(&mut self, id: NodeId) -> Node {
        let node = std::mem::replace(&mut self.nodes[id.0], Node::vacant());
        self.free.push(id);
        node
    }

    /// Occupied slots
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Slots ever allocated, occupied or free
    #[cfg(test)]
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }
}

impl Index<NodeId> for NodeStore {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for NodeStore {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_reuses_released_slots() {
        let mut store = NodeStore::default();
        let a = store.alloc(Node::leaf(Sample::new(vec![1.0], 0, 0), None));
        let b = store.alloc(Node::leaf(Sample::new(vec![2.0], 1, 1), None));
        assert_eq!(store.len(), 2);

        let released = store.release(a);
        assert_eq!(released.sample().map(|s| s.sequence), Some(0));
        assert_eq!(store.len(), 1);

        let c = store.alloc(Node::leaf(Sample::new(vec![3.0], 2, 2), None));
        assert_eq!(c, a);
        assert_eq!(store.slots(), 2);
        assert_eq!(store[b].sample().map(|s| s.point[0]), Some(2.0));
    }

    #[test]
    fn test_child_navigation() {
        let mut store = NodeStore::default();
        let left = store.alloc(Node::leaf(Sample::new(vec![0.0], 0, 0), None));
        let right = store.alloc(Node::leaf(Sample::new(vec![2.0], 1, 1), None));
        let mut bbox = BoundingBox::from_point(&[0.0]);
        bbox.extend(&[2.0]);
        let parent = Node::internal(Cut::new(0, 1.0), left, right, bbox, 2, None);

        assert_eq!(parent.child_for(&[0.5]), Some(left));
        assert_eq!(parent.child_for(&[1.5]), Some(right));
        assert_eq!(parent.sibling_of(left), Some(right));
        assert_eq!(parent.sibling_of(right), Some(left));
        assert!(!parent.is_leaf());
        assert!(store[left].is_leaf());
    }
}
