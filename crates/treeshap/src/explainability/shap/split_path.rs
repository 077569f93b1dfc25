//! Split-buffer path recurrence.
//!
//! Partial weights live in their own buffer, separate from the path entries.
//! A decision with `one_fraction == 0` (the cold branch) cannot make any new
//! subset of observed features distinguishable, so it does not get a weight
//! slot: the existing weights are rescaled in place instead. The weights
//! buffer therefore holds one slot per hot decision (root included) and is
//! usually much shorter than the path.
//!
//! The weights are kept equal to the leading entries of the single-buffer
//! weights; every slot the single buffer has beyond them is zero.
//!
//! Counter convention matches [`full_path`](super::full_path): `extend_path`
//! receives the indices where new entries are written, the other functions
//! receive the indices of the last active path entry and weight slot.

use super::path::{check_depth, PathElement, PathError, PathRecurrence};

/// Extend the path with a decision at index `unique_depth`.
///
/// A weight slot is opened at `unique_depth_partial_weights` only when
/// `one_fraction != 0`; callers advance their weights counter accordingly.
pub fn extend_path(
    path: &mut [PathElement],
    partial_weights: &mut [f32],
    unique_depth: usize,
    unique_depth_partial_weights: usize,
    zero_fraction: f32,
    one_fraction: f32,
    feature_index: i32,
) -> Result<(), PathError> {
    check_depth(unique_depth)?;
    check_depth(unique_depth_partial_weights)?;
    debug_assert!(unique_depth_partial_weights <= unique_depth);
    debug_assert!(
        unique_depth != 0 || one_fraction != 0.0,
        "root entry must carry a non-zero one fraction"
    );

    let depth = unique_depth;
    let depth_weights = unique_depth_partial_weights;

    path[depth] = PathElement::new(feature_index, zero_fraction, one_fraction, 0.0);

    let constant = 1.0 / (depth + 1) as f32;
    if one_fraction != 0.0 {
        partial_weights[depth_weights] = if depth_weights == 0 { 1.0 } else { 0.0 };
        for i in (0..depth_weights).rev() {
            partial_weights[i + 1] += one_fraction * partial_weights[i] * (i + 1) as f32 * constant;
            partial_weights[i] = zero_fraction * partial_weights[i] * (depth - i) as f32 * constant;
        }
    } else {
        for (i, weight) in partial_weights[..depth_weights].iter_mut().enumerate() {
            *weight = zero_fraction * *weight * (depth - i) as f32 * constant;
        }
    }
    Ok(())
}

/// Undo the extension at `path_index`.
///
/// Drops the last weight slot when the retracted decision owned one
/// (`one_fraction != 0`); callers decrement their weights counter in that case.
pub fn unwind_path(
    path: &mut [PathElement],
    partial_weights: &mut [f32],
    unique_depth: usize,
    unique_depth_partial_weights: usize,
    path_index: usize,
) -> Result<(), PathError> {
    check_depth(unique_depth)?;
    check_depth(unique_depth_partial_weights)?;

    let depth = unique_depth;
    let depth_weights = unique_depth_partial_weights;

    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;

    if one_fraction != 0.0 {
        let mut next_one_portion = partial_weights[depth_weights];
        for i in (0..depth_weights).rev() {
            let tmp = partial_weights[i];
            partial_weights[i] = next_one_portion * (depth + 1) as f32 / ((i + 1) as f32 * one_fraction);
            next_one_portion = tmp - partial_weights[i] * zero_fraction * (depth - i) as f32 / (depth + 1) as f32;
        }
    } else {
        debug_assert!(zero_fraction != 0.0, "cannot unwind a decision with both fractions zero");
        debug_assert!(depth_weights < depth);
        for (i, weight) in partial_weights[..=depth_weights].iter_mut().enumerate() {
            *weight = *weight * (depth + 1) as f32 / (zero_fraction * (depth - i) as f32);
        }
    }

    for i in path_index..depth {
        path[i].feature_index = path[i + 1].feature_index;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    Ok(())
}

/// Total permutation weight if the decision at `path_index` were unwound.
///
/// Cold decisions are forwarded to [`unwound_path_sum_zero`].
pub fn unwound_path_sum(
    path: &[PathElement],
    partial_weights: &[f32],
    unique_depth: usize,
    unique_depth_partial_weights: usize,
    path_index: usize,
) -> Result<f32, PathError> {
    check_depth(unique_depth)?;
    check_depth(unique_depth_partial_weights)?;

    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    if one_fraction == 0.0 {
        return unwound_path_sum_zero(partial_weights, unique_depth, unique_depth_partial_weights, zero_fraction);
    }

    let depth = unique_depth;
    let frac = zero_fraction / one_fraction;
    let mut next_one_portion = partial_weights[unique_depth_partial_weights];
    let mut total = 0.0f32;
    for i in (0..unique_depth_partial_weights).rev() {
        let tmp = next_one_portion / (i + 1) as f32;
        total += tmp;
        next_one_portion = partial_weights[i] - tmp * frac * (depth - i) as f32;
    }
    Ok(total * (depth + 1) as f32 / one_fraction)
}

/// Total permutation weight if a cold decision with `zero_fraction` were
/// unwound.
///
/// Only meaningful while the weights buffer is strictly shorter than the
/// path (some cold decision exists); returns zero otherwise.
pub fn unwound_path_sum_zero(
    partial_weights: &[f32],
    unique_depth: usize,
    unique_depth_partial_weights: usize,
    zero_fraction: f32,
) -> Result<f32, PathError> {
    check_depth(unique_depth)?;
    check_depth(unique_depth_partial_weights)?;

    let depth = unique_depth;
    if depth <= unique_depth_partial_weights {
        return Ok(0.0);
    }

    let weights = &partial_weights[..=unique_depth_partial_weights];
    if zero_fraction == 0.0 {
        debug_assert!(
            weights.iter().all(|&w| w == 0.0),
            "decision with both fractions zero must carry no weight"
        );
        return Ok(0.0);
    }

    let total: f32 = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| w / (depth - i) as f32)
        .sum();
    Ok(total * (depth + 1) as f32 / zero_fraction)
}

// =============================================================================
// SplitPath
// =============================================================================

/// Owned split-buffer path with a fixed capacity.
#[derive(Debug, Clone)]
pub struct SplitPath {
    elements: Box<[PathElement]>,
    weights: Box<[f32]>,
    len: usize,
    weights_len: usize,
}

impl SplitPath {
    /// Active partial weights, one per hot decision.
    #[inline]
    pub fn partial_weights(&self) -> &[f32] {
        &self.weights[..self.weights_len]
    }

    #[inline]
    fn last_indices(&self) -> (usize, usize) {
        assert!(self.len > 0 && self.weights_len > 0, "path is empty");
        (self.len - 1, self.weights_len - 1)
    }
}

impl PathRecurrence for SplitPath {
    fn with_capacity(max_depth: usize) -> Self {
        Self {
            elements: vec![PathElement::default(); max_depth + 1].into_boxed_slice(),
            weights: vec![0.0; max_depth + 1].into_boxed_slice(),
            len: 0,
            weights_len: 0,
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
        self.weights_len = 0;
    }

    #[inline]
    fn copy_from(&mut self, other: &Self) {
        self.elements[..other.len].copy_from_slice(&other.elements[..other.len]);
        self.weights[..other.weights_len].copy_from_slice(&other.weights[..other.weights_len]);
        self.len = other.len;
        self.weights_len = other.weights_len;
    }

    #[inline]
    fn extend(&mut self, zero_fraction: f32, one_fraction: f32, feature_index: i32) -> Result<(), PathError> {
        extend_path(
            &mut self.elements,
            &mut self.weights,
            self.len,
            self.weights_len,
            zero_fraction,
            one_fraction,
            feature_index,
        )?;
        self.len += 1;
        if one_fraction != 0.0 {
            self.weights_len += 1;
        }
        Ok(())
    }

    #[inline]
    fn unwind(&mut self, path_index: usize) -> Result<(), PathError> {
        let (depth, depth_weights) = self.last_indices();
        let owns_slot = self.elements[path_index].one_fraction != 0.0;
        unwind_path(&mut self.elements, &mut self.weights, depth, depth_weights, path_index)?;
        self.len -= 1;
        if owns_slot {
            self.weights_len -= 1;
        }
        Ok(())
    }

    #[inline]
    fn unwound_sum(&self, path_index: usize) -> Result<f32, PathError> {
        let (depth, depth_weights) = self.last_indices();
        unwound_path_sum(&self.elements, &self.weights, depth, depth_weights, path_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainability::shap::full_path;
    use crate::explainability::shap::path::ROOT_FEATURE;
    use crate::explainability::shap::FullPath;
    use approx::assert_abs_diff_eq;

    fn assert_prefix_matches(split: &SplitPath, full: &FullPath) {
        assert_eq!(split.len(), full.len());
        for (s, f) in split.elements().iter().zip(full.elements()) {
            assert_eq!(s.feature_index, f.feature_index);
            assert_eq!(s.zero_fraction, f.zero_fraction);
            assert_eq!(s.one_fraction, f.one_fraction);
        }
        let weights = split.partial_weights();
        for (i, e) in full.elements().iter().enumerate() {
            let expected = weights.get(i).copied().unwrap_or(0.0);
            assert_abs_diff_eq!(e.partial_weight, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn extend_worked_example() {
        let mut path = vec![PathElement::new(0, 1.0, 1.0, 0.0), PathElement::default()];
        let mut weights = vec![1.0, 0.0];
        extend_path(&mut path, &mut weights, 1, 1, 0.5, 0.7, 1).unwrap();

        assert_abs_diff_eq!(weights[0], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(weights[1], 0.35, epsilon = 1e-6);
        assert_eq!(path[1], PathElement::new(1, 0.5, 0.7, 0.0));

        assert_abs_diff_eq!(unwound_path_sum(&path, &weights, 1, 1, 0).unwrap(), 0.7, epsilon = 1e-6);

        unwind_path(&mut path, &mut weights, 1, 1, 1).unwrap();
        assert_abs_diff_eq!(weights[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn cold_extension_keeps_weights_short() {
        let mut path = SplitPath::with_capacity(3);
        path.extend(1.0, 1.0, ROOT_FEATURE).unwrap();
        path.extend(0.4, 1.0, 0).unwrap();
        path.extend(0.25, 0.0, 1).unwrap();

        assert_eq!(path.len(), 3);
        assert_eq!(path.partial_weights().len(), 2);
    }

    #[test]
    fn cold_rescale_matches_single_buffer() {
        let mut full = vec![PathElement::default(); 3];
        full_path::extend_path(&mut full, 0, 1.0, 1.0, ROOT_FEATURE).unwrap();
        full_path::extend_path(&mut full, 1, 0.4, 1.0, 0).unwrap();
        full_path::extend_path(&mut full, 2, 0.25, 0.0, 1).unwrap();

        let mut path = vec![PathElement::default(); 3];
        let mut weights = vec![0.0; 3];
        extend_path(&mut path, &mut weights, 0, 0, 1.0, 1.0, ROOT_FEATURE).unwrap();
        extend_path(&mut path, &mut weights, 1, 1, 0.4, 1.0, 0).unwrap();
        extend_path(&mut path, &mut weights, 2, 2, 0.25, 0.0, 1).unwrap();

        assert_abs_diff_eq!(weights[0], full[0].partial_weight, epsilon = 1e-6);
        assert_abs_diff_eq!(weights[1], full[1].partial_weight, epsilon = 1e-6);
        assert_eq!(full[2].partial_weight, 0.0);

        let full_sum = full_path::unwound_path_sum(&full, 2, 2).unwrap();
        let zero_sum = unwound_path_sum_zero(&weights, 2, 1, 0.25).unwrap();
        assert_abs_diff_eq!(zero_sum, full_sum, epsilon = 1e-5);
    }

    #[test]
    fn unwound_sum_zero_without_cold_decisions() {
        let weights = [0.5, 0.5];
        assert_eq!(unwound_path_sum_zero(&weights, 1, 1, 0.3).unwrap(), 0.0);
    }

    #[test]
    fn unwound_sum_zero_degenerate_fraction() {
        let mut path = SplitPath::with_capacity(2);
        path.extend(1.0, 1.0, ROOT_FEATURE).unwrap();
        path.extend(0.0, 0.0, 3).unwrap();
        assert_eq!(path.unwound_sum(1).unwrap(), 0.0);
    }

    #[test]
    fn mixed_sequence_matches_single_buffer() {
        let steps: [(f32, f32, i32); 5] = [
            (1.0, 1.0, ROOT_FEATURE),
            (0.6, 1.0, 0),
            (0.3, 0.0, 1),
            (0.8, 1.0, 2),
            (0.45, 0.0, 3),
        ];

        let mut split = SplitPath::with_capacity(4);
        let mut full = FullPath::with_capacity(4);
        for &(z, o, f) in &steps {
            split.extend(z, o, f).unwrap();
            full.extend(z, o, f).unwrap();
            assert_prefix_matches(&split, &full);
        }

        for path_index in 1..full.len() {
            assert_abs_diff_eq!(
                split.unwound_sum(path_index).unwrap(),
                full.unwound_sum(path_index).unwrap(),
                epsilon = 1e-5
            );
        }

        // Retract a hot and a cold decision from the middle.
        for path_index in [1, 1] {
            split.unwind(path_index).unwrap();
            full.unwind(path_index).unwrap();
            assert_prefix_matches(&split, &full);
        }
        assert_eq!(split.partial_weights().len(), 2);
    }

    #[test]
    fn overflowing_weight_depth_is_rejected() {
        let mut path = vec![PathElement::default(); 2];
        let mut weights = vec![0.0; 2];
        let depth = i32::MAX as usize;
        assert_eq!(
            extend_path(&mut path, &mut weights, 1, depth, 1.0, 1.0, 0),
            Err(PathError::IndexOverflow { depth })
        );
        assert_eq!(
            unwound_path_sum_zero(&weights, depth, 0, 1.0),
            Err(PathError::IndexOverflow { depth })
        );
    }
}
