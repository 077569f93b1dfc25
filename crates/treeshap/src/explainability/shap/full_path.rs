//! Single-buffer path recurrence.
//!
//! Every path entry carries its own partial weight, so the weights buffer is
//! always exactly as long as the path. This is the reference formulation of
//! Lundberg et al., Algorithm 2.
//!
//! The free functions take the caller's `unique_depth`:
//! - for [`extend_path`], the index where the new entry is written;
//! - for [`unwind_path`] and [`unwound_path_sum`], the index of the last
//!   active entry.

use super::path::{check_depth, PathElement, PathError, PathRecurrence};

/// Extend the path with a decision at index `unique_depth`.
///
/// # Panics
/// Panics if `path.len() <= unique_depth`.
pub fn extend_path(
    path: &mut [PathElement],
    unique_depth: usize,
    zero_fraction: f32,
    one_fraction: f32,
    feature_index: i32,
) -> Result<(), PathError> {
    check_depth(unique_depth)?;
    let depth = unique_depth;

    path[depth] = PathElement::new(
        feature_index,
        zero_fraction,
        one_fraction,
        if depth == 0 { 1.0 } else { 0.0 },
    );

    let constant = 1.0 / (depth + 1) as f32;
    for i in (0..depth).rev() {
        // Reads the old weight of `i` before it is overwritten below.
        path[i + 1].partial_weight += one_fraction * path[i].partial_weight * (i + 1) as f32 * constant;
        path[i].partial_weight = zero_fraction * path[i].partial_weight * (depth - i) as f32 * constant;
    }
    Ok(())
}

/// Undo the extension at `path_index`, leaving `unique_depth` active entries.
///
/// Entries above `path_index` shift down one slot. When `path_index` is the
/// most recent extension this restores the weights present before it.
pub fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) -> Result<(), PathError> {
    check_depth(unique_depth)?;
    let depth = unique_depth;

    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].partial_weight;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = path[i].partial_weight;
            path[i].partial_weight = next_one_portion * (depth + 1) as f32 / ((i + 1) as f32 * one_fraction);
            next_one_portion = tmp - path[i].partial_weight * zero_fraction * (depth - i) as f32 / (depth + 1) as f32;
        }
    } else {
        debug_assert!(zero_fraction != 0.0, "cannot unwind a decision with both fractions zero");
        for i in 0..depth {
            path[i].partial_weight = path[i].partial_weight * (depth + 1) as f32 / (zero_fraction * (depth - i) as f32);
        }
    }

    for i in path_index..depth {
        path[i].feature_index = path[i + 1].feature_index;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    Ok(())
}

/// Total permutation weight of the path if the decision at `path_index`
/// were unwound. The path is left untouched.
pub fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> Result<f32, PathError> {
    check_depth(unique_depth)?;
    let depth = unique_depth;

    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].partial_weight;
    let mut total = 0.0f32;

    if one_fraction != 0.0 {
        let frac = zero_fraction / one_fraction;
        for i in (0..depth).rev() {
            let tmp = next_one_portion / (i + 1) as f32;
            total += tmp;
            next_one_portion = path[i].partial_weight - tmp * frac * (depth - i) as f32;
        }
        total *= (depth + 1) as f32 / one_fraction;
    } else if zero_fraction != 0.0 {
        for (i, element) in path[..depth].iter().enumerate() {
            total += element.partial_weight / (depth - i) as f32;
        }
        total *= (depth + 1) as f32 / zero_fraction;
    } else {
        debug_assert!(
            path[..depth].iter().all(|e| e.partial_weight == 0.0),
            "decision with both fractions zero must carry no weight"
        );
    }

    Ok(total)
}

// =============================================================================
// FullPath
// =============================================================================

/// Owned single-buffer path with a fixed capacity.
#[derive(Debug, Clone)]
pub struct FullPath {
    elements: Box<[PathElement]>,
    len: usize,
}

impl FullPath {
    #[inline]
    fn last_index(&self) -> usize {
        assert!(self.len > 0, "path is empty");
        self.len - 1
    }
}

impl PathRecurrence for FullPath {
    fn with_capacity(max_depth: usize) -> Self {
        Self {
            elements: vec![PathElement::default(); max_depth + 1].into_boxed_slice(),
            len: 0,
        }
    }

    #[inline]
    fn max_depth(&self) -> usize {
        self.elements.len() - 1
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn elements(&self) -> &[PathElement] {
        &self.elements[..self.len]
    }

    #[inline]
    fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    fn copy_from(&mut self, other: &Self) {
        self.elements[..other.len].copy_from_slice(&other.elements[..other.len]);
        self.len = other.len;
    }

    #[inline]
    fn extend(&mut self, zero_fraction: f32, one_fraction: f32, feature_index: i32) -> Result<(), PathError> {
        extend_path(&mut self.elements, self.len, zero_fraction, one_fraction, feature_index)?;
        self.len += 1;
        Ok(())
    }

    #[inline]
    fn unwind(&mut self, path_index: usize) -> Result<(), PathError> {
        let depth = self.last_index();
        unwind_path(&mut self.elements, depth, path_index)?;
        self.len -= 1;
        Ok(())
    }

    #[inline]
    fn unwound_sum(&self, path_index: usize) -> Result<f32, PathError> {
        unwound_path_sum(&self.elements, self.last_index(), path_index)
    }
}
