//! Tree ensembles with per-group outputs.

use crate::data::{SampleAccessor, SamplesView};
use crate::utils::Parallelism;

use super::{tree::TreeValidationError, LeafValue, ScalarLeaf, Tree, TreeView};

/// Reasons [`Forest::validate`] rejects a forest.
#[derive(Debug, Clone, PartialEq)]
pub enum ForestValidationError {
    BaseScoreLenMismatch { n_groups: u32, len: usize },
    TreeGroupsLenMismatch { n_trees: usize, len: usize },
    TreeGroupOutOfRange { tree_idx: usize, group: u32, n_groups: u32 },
    InvalidTree { tree_idx: usize, error: TreeValidationError },
}

/// Additive ensemble of trees.
///
/// Each tree feeds one output group; the raw output for group `g` is
/// `base_score[g]` plus the leaf values of every tree assigned to `g`.
#[derive(Debug, Clone)]
pub struct Forest<L: LeafValue = ScalarLeaf> {
    trees: Vec<Tree<L>>,
    tree_groups: Vec<u32>,
    n_groups: u32,
    base_score: Vec<f32>,
}

impl<L: LeafValue> Forest<L> {
    /// Empty forest with `n_groups` outputs and a zero base score.
    pub fn new(n_groups: u32) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            n_groups,
            base_score: vec![0.0; n_groups as usize],
        }
    }

    /// Empty single-output forest.
    pub fn for_regression() -> Self {
        Self::new(1)
    }

    /// Replace the per-group base score.
    pub fn with_base_score(mut self, base_score: Vec<f32>) -> Self {
        debug_assert_eq!(base_score.len(), self.n_groups as usize);
        self.base_score = base_score;
        self
    }

    /// Append a tree contributing to `group`.
    pub fn push_tree(&mut self, tree: Tree<L>, group: u32) {
        debug_assert!(group < self.n_groups, "group out of range");
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_groups(&self) -> u32 {
        self.n_groups
    }

    #[inline]
    pub fn base_score(&self) -> &[f32] {
        &self.base_score
    }

    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree<L> {
        &self.trees[idx]
    }

    /// Output group of each tree, in tree order.
    #[inline]
    pub fn tree_groups(&self) -> &[u32] {
        &self.tree_groups
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree<L>> {
        self.trees.iter()
    }

    /// Trees paired with the group they contribute to.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&Tree<L>, u32)> {
        self.trees.iter().zip(self.tree_groups.iter().copied())
    }

    /// Deepest tree in the forest, counted in splits.
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::max_depth).max().unwrap_or(0)
    }

    /// Minimum number of features a sample needs: the largest split
    /// feature index plus one.
    pub fn n_features(&self) -> usize {
        self.trees.iter().map(Tree::n_features_used).max().unwrap_or(0)
    }

    /// Check base score and group lengths, group ranges and every tree.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        let n_groups = self.n_groups;
        if self.base_score.len() != n_groups as usize {
            return Err(ForestValidationError::BaseScoreLenMismatch {
                n_groups,
                len: self.base_score.len(),
            });
        }
        if self.tree_groups.len() != self.trees.len() {
            return Err(ForestValidationError::TreeGroupsLenMismatch {
                n_trees: self.trees.len(),
                len: self.tree_groups.len(),
            });
        }

        let out_of_range = self.tree_groups.iter().enumerate().find(|&(_, &g)| g >= n_groups);
        if let Some((tree_idx, &group)) = out_of_range {
            return Err(ForestValidationError::TreeGroupOutOfRange { tree_idx, group, n_groups });
        }

        self.trees.iter().enumerate().try_for_each(|(tree_idx, tree)| {
            tree.validate()
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })
        })
    }
}

impl Forest<ScalarLeaf> {
    /// Raw output of every group for one row of features.
    pub fn predict_row(&self, features: &[f32]) -> Vec<f32> {
        self.predict_sample(features)
    }

    /// Raw output of every group for any sample accessor.
    pub fn predict_sample<S: SampleAccessor + ?Sized>(&self, sample: &S) -> Vec<f32> {
        let mut output: Vec<ScalarLeaf> = self.base_score.iter().map(|&b| ScalarLeaf(b)).collect();

        for (tree, group) in self.trees_with_groups() {
            let leaf = tree.traverse_to_leaf(sample);
            output[group as usize].accumulate(tree.leaf_value(leaf));
        }

        output.into_iter().map(f32::from).collect()
    }

    /// Raw outputs for a batch, written sample-major into `output`
    /// (`[sample][group]`). Existing contents are overwritten.
    ///
    /// # Panics
    /// Panics if `output.len() != samples.n_samples() * self.n_groups()`.
    pub fn predict_into(&self, samples: &SamplesView<'_>, output: &mut [f32], parallelism: Parallelism) {
        let n_groups = self.n_groups() as usize;
        assert_eq!(
            output.len(),
            samples.n_samples() * n_groups,
            "output buffer must have length n_samples * n_groups"
        );
        if n_groups == 0 {
            return;
        }

        parallelism.maybe_par_bridge_for_each(output.chunks_mut(n_groups).enumerate(), |(row, out)| {
            let prediction = self.predict_sample(&samples.sample(row));
            out.copy_from_slice(&prediction);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_simple_tree(left_val: f32, right_val: f32, threshold: f32) -> Tree<ScalarLeaf> {
        crate::scalar_tree! {
            0 => num(0, threshold, L) -> 1, 2,
            1 => leaf(left_val),
            2 => leaf(right_val),
        }
    }

    #[test]
    fn forest_single_tree_regression() {
        let mut forest = Forest::for_regression();
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5), 0);

        assert_eq!(forest.predict_row(&[0.3]), vec![1.0]);
        assert_eq!(forest.predict_row(&[0.7]), vec![2.0]);
    }

    #[test]
    fn forest_multiple_trees_sum() {
        let mut forest = Forest::for_regression();
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5), 0);
        forest.push_tree(build_simple_tree(0.5, 1.5, 0.5), 0);

        assert_eq!(forest.predict_row(&[0.3]), vec![1.5]);
        assert_eq!(forest.predict_row(&[0.7]), vec![3.5]);
    }

    #[test]
    fn forest_with_base_score() {
        let mut forest = Forest::for_regression().with_base_score(vec![0.5]);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5), 0);

        assert_eq!(forest.predict_row(&[0.3]), vec![1.5]);
    }

    #[test]
    fn forest_groups_accumulate_separately() {
        let mut forest = Forest::new(2).with_base_score(vec![0.0, 10.0]);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5), 0);
        forest.push_tree(build_simple_tree(-1.0, -2.0, 0.5), 1);
        forest.push_tree(build_simple_tree(0.25, 0.5, 0.5), 1);

        assert_eq!(forest.predict_row(&[0.7]), vec![2.0, 8.5]);
    }

    #[test]
    fn predict_into_matches_predict_row() {
        let mut forest = Forest::new(2).with_base_score(vec![0.1, -0.1]);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5), 0);
        forest.push_tree(build_simple_tree(0.5, 1.0, 0.5), 1);

        let data = [0.3f32, 0.7, 0.5];
        let view = SamplesView::from_slice(&data, 3, 1).unwrap();

        for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
            let mut output = vec![0.0; 6];
            forest.predict_into(&view, &mut output, parallelism);

            for (row, &x) in data.iter().enumerate() {
                assert_eq!(&output[row * 2..row * 2 + 2], forest.predict_row(&[x]).as_slice());
            }
        }
    }

    #[test]
    fn shape_summaries() {
        let mut forest = Forest::for_regression();
        assert_eq!(forest.max_depth(), 0);
        assert_eq!(forest.n_features(), 0);

        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5), 0);
        forest.push_tree(
            crate::scalar_tree! {
                0 => num(4, 0.5, L) -> 1, 2,
                1 => num(1, 0.5, L) -> 3, 4,
                2 => leaf(0.0),
                3 => leaf(1.0),
                4 => leaf(2.0),
            },
            0,
        );
        assert_eq!(forest.max_depth(), 2);
        assert_eq!(forest.n_features(), 5);
    }

    #[test]
    fn validate_reports_bad_groups_and_trees() {
        let mut forest = Forest::new(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5), 0);
        assert!(forest.validate().is_ok());

        let bad_covers = build_simple_tree(1.0, 2.0, 0.5).with_covers(vec![1.0]);
        forest.push_tree(bad_covers, 0);
        assert_eq!(
            forest.validate(),
            Err(ForestValidationError::InvalidTree {
                tree_idx: 1,
                error: TreeValidationError::CoversLenMismatch { covers_len: 1, n_nodes: 3 },
            })
        );

        let mut forest = Forest::<ScalarLeaf>::new(2);
        forest.tree_groups.push(0);
        assert_eq!(
            forest.validate(),
            Err(ForestValidationError::TreeGroupsLenMismatch { n_trees: 0, len: 1 })
        );
    }
}
