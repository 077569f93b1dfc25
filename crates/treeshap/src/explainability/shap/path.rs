//! Unique-path state shared by the TreeSHAP recurrences.
//!
//! A *unique path* is the sequence of distinct features split on between the
//! tree root and the node currently being visited. Each entry records how the
//! sample would be routed with the feature unobserved (`zero_fraction`) and
//! observed (`one_fraction`), plus the permutation weight of the subsets of
//! observed features consistent with the path so far.
//!
//! Two memory layouts implement the same recurrence:
//! - [`FullPath`](super::FullPath): weights live inline in every path entry.
//! - [`SplitPath`](super::SplitPath): weights live in a separate buffer that
//!   only grows for entries with a non-zero one fraction.
//!
//! Both are exposed through [`PathRecurrence`] so the tree traversal is
//! monomorphized per layout.

/// Feature index of the synthetic entry at depth 0.
pub const ROOT_FEATURE: i32 = -1;

/// Errors raised by the path recurrence kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// A depth counter does not fit the signed 32-bit range used for
    /// depth arithmetic.
    #[error("path depth {depth} exceeds the supported index range")]
    IndexOverflow { depth: usize },
}

/// Reject depth counters outside the signed 32-bit range.
///
/// No real tree gets close: the path buffers alone would need more memory
/// than any machine has long before this triggers.
#[inline]
pub(crate) fn check_depth(depth: usize) -> Result<(), PathError> {
    if depth >= i32::MAX as usize {
        return Err(PathError::IndexOverflow { depth });
    }
    Ok(())
}

/// One decision on the unique path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathElement {
    /// Split feature, or [`ROOT_FEATURE`] for the synthetic root entry.
    pub feature_index: i32,
    /// Fraction of the node's cover that follows the taken branch when the
    /// feature is unobserved.
    pub zero_fraction: f32,
    /// Fraction routed down the taken branch when the feature is observed
    /// (1 on the hot path, 0 on the cold path).
    pub one_fraction: f32,
    /// Permutation weight for subsets of size equal to this entry's index.
    ///
    /// Unused by the split-weights layout, which keeps weights separately.
    pub partial_weight: f32,
}

impl PathElement {
    pub fn new(feature_index: i32, zero_fraction: f32, one_fraction: f32, partial_weight: f32) -> Self {
        Self {
            feature_index,
            zero_fraction,
            one_fraction,
            partial_weight,
        }
    }

    /// Whether this entry is the synthetic root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.feature_index == ROOT_FEATURE
    }
}

impl Default for PathElement {
    fn default() -> Self {
        Self::new(ROOT_FEATURE, 0.0, 0.0, 0.0)
    }
}

// =============================================================================
// PathRecurrence
// =============================================================================

/// Owned, capacity-bounded unique path with the three TreeSHAP operations.
///
/// Implementations never reallocate after construction. Exceeding the
/// capacity given to [`with_capacity`](Self::with_capacity) panics.
pub trait PathRecurrence: Clone + Send {
    /// Allocate a path able to hold a tree of the given maximum depth
    /// (root entry plus one entry per level).
    fn with_capacity(max_depth: usize) -> Self;

    /// Maximum tree depth this path was sized for.
    fn max_depth(&self) -> usize;

    /// Number of active entries, including the root entry.
    fn len(&self) -> usize;

    /// Whether no entry has been extended yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active entries in path order.
    fn elements(&self) -> &[PathElement];

    /// Drop all entries.
    fn clear(&mut self);

    /// Overwrite this path with the active state of `other`.
    fn copy_from(&mut self, other: &Self);

    /// Append one decision and redistribute the existing weights.
    fn extend(&mut self, zero_fraction: f32, one_fraction: f32, feature_index: i32) -> Result<(), PathError>;

    /// Retract the decision at `path_index` and compact the path.
    fn unwind(&mut self, path_index: usize) -> Result<(), PathError>;

    /// Total weight the path would carry with the decision at `path_index`
    /// retracted. Does not modify the path.
    fn unwound_sum(&self, path_index: usize) -> Result<f32, PathError>;

    /// Entry at `index`.
    #[inline]
    fn element(&self, index: usize) -> &PathElement {
        &self.elements()[index]
    }

    /// Index of the entry (other than the root) that splits on `feature_index`.
    fn find_feature(&self, feature_index: i32) -> Option<usize> {
        self.elements()
            .iter()
            .skip(1)
            .position(|e| e.feature_index == feature_index)
            .map(|pos| pos + 1)
    }
}

// =============================================================================
// PathStack
// =============================================================================

/// Reusable per-thread arena of path frames, one per tree level.
///
/// A recursive traversal at level `l` works on frame `l`, which starts as a
/// copy of frame `l - 1`. Children only ever write deeper frames, so a
/// parent's path is intact when the traversal returns to it.
#[derive(Debug, Clone)]
pub struct PathStack<P> {
    frames: Vec<P>,
}

impl<P: PathRecurrence> PathStack<P> {
    /// Allocate frames for trees up to `max_depth` levels deep.
    pub fn new(max_depth: usize) -> Self {
        let frames = (0..=max_depth).map(|_| P::with_capacity(max_depth)).collect();
        Self { frames }
    }

    /// Deepest tree this stack can traverse.
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Prepare frame `level` for a new node: empty for the root level,
    /// otherwise a copy of the parent frame.
    ///
    /// # Panics
    /// Panics if `level > self.max_depth()`.
    pub fn enter(&mut self, level: usize) -> &mut P {
        let (parents, rest) = self.frames.split_at_mut(level);
        let frame = &mut rest[0];
        match parents.last() {
            Some(parent) => frame.copy_from(parent),
            None => frame.clear(),
        }
        frame
    }

    /// Frame at `level`, as last written.
    #[inline]
    pub fn frame(&self, level: usize) -> &P {
        &self.frames[level]
    }
}
