//! Mutable tree for incremental construction.

use super::leaf::LeafValue;
use super::tree::{Tree, TreeView};
use super::NodeId;

/// Mutable tree for model loaders and tests.
///
/// Nodes are allocated up front as placeholder leaves and filled in once
/// their splits, leaf values and covers are known. Covers are optional: if
/// no [`set_cover`](Self::set_cover) call is made, the frozen tree carries
/// none.
#[derive(Debug, Clone)]
pub struct MutableTree<L: LeafValue> {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<L>,
    covers: Vec<f32>,
    has_covers: bool,
}

impl<L: LeafValue> Default for MutableTree<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: LeafValue> MutableTree<L> {
    /// Create a new mutable tree.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a tree with capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            split_indices: Vec::with_capacity(capacity),
            split_thresholds: Vec::with_capacity(capacity),
            left_children: Vec::with_capacity(capacity),
            right_children: Vec::with_capacity(capacity),
            default_left: Vec::with_capacity(capacity),
            is_leaf: Vec::with_capacity(capacity),
            leaf_values: Vec::with_capacity(capacity),
            covers: Vec::with_capacity(capacity),
            has_covers: false,
        }
    }

    /// Initialize the root node as a placeholder.
    ///
    /// Returns the root node ID (always 0).
    pub fn init_root(&mut self) -> NodeId {
        self.init_root_with_n_nodes(1)
    }

    /// Initialize the tree with a fixed number of placeholder nodes.
    ///
    /// Useful when node indices and child references are already known.
    /// Returns the root node ID (0).
    pub fn init_root_with_n_nodes(&mut self, n_nodes: usize) -> NodeId {
        self.reset();
        for _ in 0..n_nodes {
            self.allocate_node();
        }
        0
    }

    /// Apply a numeric split to a node, allocating child nodes.
    ///
    /// Returns `(left_id, right_id)`.
    pub fn apply_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
    ) -> (NodeId, NodeId) {
        let left_id = self.allocate_node();
        let right_id = self.allocate_node();
        self.set_numeric_split(node, feature, threshold, default_left, left_id, right_id);
        (left_id, right_id)
    }

    /// Set a numeric split on an existing node, with explicit child indices.
    pub fn set_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
        left_child: NodeId,
        right_child: NodeId,
    ) {
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.split_thresholds[idx] = threshold;
        self.left_children[idx] = left_child;
        self.right_children[idx] = right_child;
        self.default_left[idx] = default_left;
        self.is_leaf[idx] = false;
    }

    /// Set a node as a leaf with the given value.
    pub fn make_leaf(&mut self, node: NodeId, value: L) {
        let idx = node as usize;
        self.is_leaf[idx] = true;
        self.leaf_values[idx] = value;
    }

    /// Record the cover (training weight) reaching a node.
    pub fn set_cover(&mut self, node: NodeId, cover: f32) {
        self.covers[node as usize] = cover;
        self.has_covers = true;
    }

    /// Current number of allocated nodes.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.split_indices.len()
    }

    /// Reset the tree for reuse.
    pub fn reset(&mut self) {
        self.split_indices.clear();
        self.split_thresholds.clear();
        self.left_children.clear();
        self.right_children.clear();
        self.default_left.clear();
        self.is_leaf.clear();
        self.leaf_values.clear();
        self.covers.clear();
        self.has_covers = false;
    }

    /// Finalize the tree and return immutable storage.
    pub fn freeze(self) -> Tree<L> {
        let tree = Tree::new(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.leaf_values,
        );

        if self.has_covers {
            tree.with_covers(self.covers)
        } else {
            tree
        }
    }

    fn allocate_node(&mut self) -> NodeId {
        let id = self.split_indices.len() as NodeId;

        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(true);
        self.is_leaf.push(true);
        self.leaf_values.push(L::default());
        self.covers.push(0.0);

        id
    }
}

impl<L: LeafValue> TreeView for MutableTree<L> {
    type LeafValue = L;

    #[inline]
    fn n_nodes(&self) -> usize {
        self.split_indices.len()
    }

    #[inline]
    fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    #[inline]
    fn leaf_value(&self, node: NodeId) -> &L {
        &self.leaf_values[node as usize]
    }
}
