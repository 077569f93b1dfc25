//! Frozen regression trees and the traversal interface.
//!
//! - [`Tree`]: immutable node arrays plus optional covers
//! - [`TreeView`]: what a traversal needs to read from a tree
//! - [`TreeValidationError`]: why a tree was rejected
//!
//! Trees are assembled with [`MutableTree`](super::mutable_tree::MutableTree).

use crate::data::SampleAccessor;

use super::leaf::{LeafValue, ScalarLeaf};
use super::NodeId;

// ============================================================================
// TreeView Trait
// ============================================================================

/// Node-level read access used by prediction and TreeSHAP.
///
/// Implemented for both [`Tree`] and [`MutableTree`](super::MutableTree).
///
/// # Example
///
/// ```
/// use treeshap::repr::gbdt::TreeView;
///
/// fn leaf_count(tree: &impl TreeView) -> usize {
///     (0..tree.n_nodes() as u32).filter(|&node| tree.is_leaf(node)).count()
/// }
///
/// let tree = treeshap::scalar_tree! {
///     0 => num(0, 0.5, L) -> 1, 2,
///     1 => leaf(1.0),
///     2 => leaf(2.0),
/// };
/// assert_eq!(leaf_count(&tree), 2);
/// ```
pub trait TreeView {
    type LeafValue: LeafValue;

    fn n_nodes(&self) -> usize;

    fn is_leaf(&self, node: NodeId) -> bool;

    /// Feature a split node tests.
    fn split_index(&self, node: NodeId) -> u32;

    fn split_threshold(&self, node: NodeId) -> f32;

    fn left_child(&self, node: NodeId) -> NodeId;

    fn right_child(&self, node: NodeId) -> NodeId;

    /// Whether missing (NaN) values go to the left child.
    fn default_left(&self, node: NodeId) -> bool;

    /// Value stored at a leaf. Unspecified for split nodes.
    fn leaf_value(&self, node: NodeId) -> &Self::LeafValue;

    /// Child that a feature value is routed to at a split node.
    ///
    /// `value < threshold` goes left, anything else right. NaN follows the
    /// node's default direction.
    #[inline]
    fn child_for(&self, node: NodeId, value: f32) -> NodeId {
        let go_left = if value.is_nan() {
            self.default_left(node)
        } else {
            value < self.split_threshold(node)
        };

        if go_left {
            self.left_child(node)
        } else {
            self.right_child(node)
        }
    }

    /// Leaf reached by `sample` from the root.
    #[inline]
    fn traverse_to_leaf<S: SampleAccessor + ?Sized>(&self, sample: &S) -> NodeId {
        self.traverse_to_leaf_from(0, sample)
    }

    /// Leaf reached by `sample` from `node`.
    #[inline]
    fn traverse_to_leaf_from<S: SampleAccessor + ?Sized>(&self, mut node: NodeId, sample: &S) -> NodeId {
        while !self.is_leaf(node) {
            node = self.child_for(node, sample.feature(self.split_index(node) as usize));
        }
        node
    }
}

// ============================================================================
// TreeValidationError
// ============================================================================

/// Reasons [`Tree::validate`] rejects a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValidationError {
    EmptyTree,
    /// A child index points past the last node.
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    SelfLoop { node: NodeId },
    /// Two split nodes share a child.
    DuplicateVisit { node: NodeId },
    /// A node is its own ancestor.
    CycleDetected { node: NodeId },
    /// No path from the root reaches this node.
    UnreachableNode { node: NodeId },
    /// Cover statistics are not sized to nodes.
    CoversLenMismatch { covers_len: usize, n_nodes: usize },
    /// A cover is negative or non-finite, or a split node has zero cover.
    InvalidCover { node: NodeId, cover: f32 },
}

// ============================================================================
// Tree
// ============================================================================

/// Immutable tree stored as one array per node attribute.
///
/// Node 0 is the root; child indices refer to positions in the same
/// arrays. Covers (training weight reaching each node) are optional but
/// required by TreeSHAP.
#[derive(Debug, Clone)]
pub struct Tree<L: LeafValue> {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[L]>,
    /// Optional cover (training sample weight) at each node.
    covers: Option<Box<[f32]>>,
}

impl<L: LeafValue> Tree<L> {
    /// Assemble a tree from per-node arrays of equal length.
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<L>,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert!(
            [
                split_thresholds.len(),
                left_children.len(),
                right_children.len(),
                default_left.len(),
                is_leaf.len(),
                leaf_values.len(),
            ]
            .iter()
            .all(|&len| len == n_nodes),
            "node arrays must have equal length"
        );

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            covers: None,
        }
    }

    /// Attach per-node covers. Checked by [`validate`](Self::validate).
    pub fn with_covers(mut self, covers: Vec<f32>) -> Self {
        self.covers = Some(covers.into_boxed_slice());
        self
    }

    #[inline]
    pub fn has_covers(&self) -> bool {
        self.covers.is_some()
    }

    /// Per-node covers, if attached.
    #[inline]
    pub fn covers(&self) -> Option<&[f32]> {
        self.covers.as_deref()
    }

    /// Leaf value for one row of features.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> &L {
        self.leaf_value(self.traverse_to_leaf(features))
    }

    /// Largest number of splits between the root and any leaf.
    ///
    /// A single-leaf tree has depth 0.
    pub fn max_depth(&self) -> usize {
        if self.n_nodes() == 0 {
            return 0;
        }

        let mut max_depth = 0;
        let mut stack: Vec<(NodeId, usize)> = vec![(0, 0)];
        while let Some((node, depth)) = stack.pop() {
            if self.is_leaf(node) {
                max_depth = max_depth.max(depth);
            } else {
                stack.push((self.left_child(node), depth + 1));
                stack.push((self.right_child(node), depth + 1));
            }
        }
        max_depth
    }

    /// Largest split feature index plus one, or 0 for a tree without splits.
    pub fn n_features_used(&self) -> usize {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|&(_, &leaf)| !leaf)
            .map(|(&feature, _)| feature as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// Check the node graph and covers.
    ///
    /// Every node must be reachable from the root through exactly one
    /// parent. When covers are attached they must be sized to the nodes,
    /// finite, non-negative and strictly positive on split nodes.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Visit {
            Unseen,
            Open,
            Closed,
        }

        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        // `(node, true)` closes a node once its subtree is done.
        let mut visits = vec![Visit::Unseen; n_nodes];
        let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];

        while let Some((node, closing)) = stack.pop() {
            if closing {
                visits[node as usize] = Visit::Closed;
                continue;
            }
            match visits[node as usize] {
                Visit::Unseen => {}
                Visit::Open => return Err(TreeValidationError::CycleDetected { node }),
                Visit::Closed => return Err(TreeValidationError::DuplicateVisit { node }),
            }
            visits[node as usize] = Visit::Open;
            stack.push((node, true));

            if self.is_leaf(node) {
                continue;
            }
            let children = [("left", self.left_child(node)), ("right", self.right_child(node))];
            for (side, child) in children {
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds { node, side, child, n_nodes });
                }
            }
            for (_, child) in children.into_iter().rev() {
                stack.push((child, false));
            }
        }

        if let Some(node) = visits.iter().position(|&v| v == Visit::Unseen) {
            return Err(TreeValidationError::UnreachableNode { node: node as NodeId });
        }

        if let Some(covers) = self.covers() {
            if covers.len() != n_nodes {
                return Err(TreeValidationError::CoversLenMismatch {
                    covers_len: covers.len(),
                    n_nodes,
                });
            }
            for (i, &cover) in covers.iter().enumerate() {
                let node = i as NodeId;
                let valid = cover.is_finite()
                    && cover >= 0.0
                    && (self.is_leaf(node) || cover > 0.0);
                if !valid {
                    return Err(TreeValidationError::InvalidCover { node, cover });
                }
            }
        }

        Ok(())
    }
}

impl Tree<ScalarLeaf> {
    /// Expected output of the tree over the training distribution.
    ///
    /// Each split node averages its children weighted by their covers, so
    /// the result is the root's cover-weighted leaf mean. Returns `None`
    /// when the tree carries no covers.
    pub fn expected_value(&self) -> Option<f64> {
        let covers = self.covers()?;
        Some(self.node_expectation(covers, 0))
    }

    fn node_expectation(&self, covers: &[f32], node: NodeId) -> f64 {
        if self.is_leaf(node) {
            return f64::from(self.leaf_value(node).0);
        }

        let left = self.left_child(node);
        let right = self.right_child(node);
        let left_cover = f64::from(covers[left as usize]);
        let right_cover = f64::from(covers[right as usize]);
        let cover = f64::from(covers[node as usize]);

        (left_cover * self.node_expectation(covers, left)
            + right_cover * self.node_expectation(covers, right))
            / cover
    }
}

// =============================================================================
// TreeView for Tree
// =============================================================================

impl<L: LeafValue> TreeView for Tree<L> {
    type LeafValue = L;

    #[inline]
    fn n_nodes(&self) -> usize {
        self.is_leaf.len()
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
