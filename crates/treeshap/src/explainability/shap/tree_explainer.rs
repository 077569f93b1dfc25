//! TreeSHAP explainer for tree ensembles.
//!
//! Implements the path-dependent TreeSHAP algorithm from Lundberg et al.
//! (2020): "From local explanations to global understanding with explainable
//! AI for trees". Attributions are exact Shapley values of the
//! cover-weighted conditional expectation of each tree.

use tracing::{debug, warn};

use crate::data::{SampleAccessor, SamplesView};
use crate::explainability::ExplainError;
use crate::repr::gbdt::{Forest, NodeId, ScalarLeaf, Tree, TreeView};
use crate::utils::{run_with_threads, Parallelism};

use super::path::check_depth;
use super::{
    AdditivityGap, FullPath, PathError, PathRecurrence, PathStack, ShapAlgorithm, ShapValues, SplitPath,
    TreeShapConfig, ROOT_FEATURE,
};

const MISSING_COVERS: &str = "cover statistics required for TreeSHAP";

/// TreeSHAP explainer for tree-based models.
///
/// Computes exact SHAP values for tree ensembles in polynomial time. Every
/// tree must carry covers.
///
/// # Example
///
/// ```
/// use treeshap::data::SamplesView;
/// use treeshap::explainability::shap::{TreeExplainer, TreeShapConfig};
/// use treeshap::repr::gbdt::Forest;
///
/// let tree = treeshap::scalar_tree! {
///     0 => num(0, 0.5, L) -> 1, 2,
///     1 => leaf(1.0),
///     2 => leaf(2.0);
///     covers = [10.0, 4.0, 6.0]
/// };
/// let mut forest = Forest::for_regression();
/// forest.push_tree(tree, 0);
///
/// let explainer = TreeExplainer::new(&forest, TreeShapConfig::default()).unwrap();
/// let data = [0.3f32];
/// let shap = explainer.shap_values(SamplesView::from_slice(&data, 1, 1).unwrap()).unwrap();
///
/// assert!((shap.base_value(0, 0) - 1.6).abs() < 1e-6);
/// assert!((shap.get(0, 0, 0) + 0.6).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct TreeExplainer<'a> {
    forest: &'a Forest<ScalarLeaf>,
    config: TreeShapConfig,
    /// Expected model output per group.
    base_values: Vec<f64>,
    max_depth: usize,
    n_features: usize,
}

impl<'a> TreeExplainer<'a> {
    /// Create a new TreeExplainer for the given forest.
    ///
    /// # Errors
    /// - [`ExplainError::InvalidForest`] if the forest fails validation
    /// - [`ExplainError::MissingNodeStats`] if any tree lacks covers
    /// - [`ExplainError::Path`] if the forest is too deep to index
    pub fn new(forest: &'a Forest<ScalarLeaf>, config: TreeShapConfig) -> Result<Self, ExplainError> {
        forest.validate()?;

        let mut base_values: Vec<f64> = forest.base_score().iter().map(|&b| f64::from(b)).collect();
        for (tree, group) in forest.trees_with_groups() {
            let expected = tree
                .expected_value()
                .ok_or(ExplainError::MissingNodeStats(MISSING_COVERS))?;
            base_values[group as usize] += expected;
        }

        let max_depth = forest.max_depth();
        check_depth(max_depth)?;

        debug!(
            n_trees = forest.n_trees(),
            n_groups = forest.n_groups(),
            max_depth,
            algorithm = ?config.algorithm,
            "created tree explainer"
        );

        Ok(Self {
            forest,
            config,
            base_values,
            max_depth,
            n_features: forest.n_features(),
        })
    }

    /// Expected model output for one output group.
    #[inline]
    pub fn base_value(&self, output: usize) -> f64 {
        self.base_values[output]
    }

    /// Expected model output for every group.
    pub fn base_values(&self) -> &[f64] {
        &self.base_values
    }

    pub fn config(&self) -> &TreeShapConfig {
        &self.config
    }

    /// Deepest tree in the forest, in splits.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compute SHAP values for a batch of samples.
    ///
    /// # Returns
    /// [`ShapValues`] with shape `[n_samples, n_features + 1, n_outputs]`,
    /// where `n_features` is the sample width.
    ///
    /// # Errors
    /// - [`ExplainError::FeatureCountMismatch`] if samples are narrower than
    ///   the features the forest splits on
    /// - [`ExplainError::AdditivityViolation`] if the additivity check is
    ///   enabled and fails
    pub fn shap_values(&self, samples: SamplesView<'_>) -> Result<ShapValues, ExplainError> {
        let n_features = samples.n_features();
        if n_features < self.n_features {
            return Err(ExplainError::FeatureCountMismatch {
                expected: self.n_features,
                actual: n_features,
            });
        }

        let n_outputs = self.forest.n_groups() as usize;
        let mut shap = ShapValues::zeros(samples.n_samples(), n_features, n_outputs);

        run_with_threads(self.config.n_threads, |parallelism| {
            debug!(
                n_samples = samples.n_samples(),
                parallel = parallelism.is_parallel(),
                n_threads = rayon::current_num_threads(),
                "computing SHAP values"
            );

            match self.config.algorithm {
                ShapAlgorithm::FullPath => self.fill_shap::<FullPath>(samples, &mut shap, parallelism)?,
                ShapAlgorithm::SplitWeights => self.fill_shap::<SplitPath>(samples, &mut shap, parallelism)?,
            }

            if self.config.check_additivity {
                self.check_additivity(samples, &shap, parallelism)?;
            }
            Ok::<(), ExplainError>(())
        })?;

        Ok(shap)
    }

    /// Fill every sample block of `shap`, one path stack per worker.
    fn fill_shap<P: PathRecurrence>(
        &self,
        samples: SamplesView<'_>,
        shap: &mut ShapValues,
        parallelism: Parallelism,
    ) -> Result<(), ExplainError> {
        let n_outputs = shap.n_outputs();
        let base_offset = shap.n_features() * n_outputs;

        parallelism.maybe_par_bridge_try_for_each_init(
            shap.samples_mut().enumerate(),
            || PathStack::<P>::new(self.max_depth),
            |stack, (sample_idx, phi)| -> Result<(), ExplainError> {
                let sample = samples.sample(sample_idx);
                for (tree, group) in self.forest.trees_with_groups() {
                    let covers = tree
                        .covers()
                        .ok_or(ExplainError::MissingNodeStats(MISSING_COVERS))?;
                    let walk = TreeWalk {
                        tree,
                        covers,
                        sample: &sample,
                        group: group as usize,
                        n_outputs,
                    };
                    walk.recurse(stack, phi, 0, 0, 1.0, 1.0, ROOT_FEATURE)?;
                }
                phi[base_offset..].copy_from_slice(&self.base_values);
                Ok(())
            },
        )
    }

    fn check_additivity(
        &self,
        samples: SamplesView<'_>,
        shap: &ShapValues,
        parallelism: Parallelism,
    ) -> Result<(), ExplainError> {
        let mut predictions = vec![0.0f32; shap.n_samples() * shap.n_outputs()];
        self.forest.predict_into(&samples, &mut predictions, parallelism);
        let predictions: Vec<f64> = predictions.into_iter().map(f64::from).collect();

        match shap.additivity_gap(&predictions, self.config.additivity_tolerance) {
            None => Ok(()),
            Some(AdditivityGap { sample, output, expected, actual }) => {
                warn!(sample, output, expected, actual, "SHAP values do not sum to the prediction");
                Err(ExplainError::AdditivityViolation { sample, output, expected, actual })
            }
        }
    }
}

// =============================================================================
// Traversal
// =============================================================================

/// One (tree, sample) pair being explained.
struct TreeWalk<'t, S: ?Sized> {
    tree: &'t Tree<ScalarLeaf>,
    covers: &'t [f32],
    sample: &'t S,
    group: usize,
    n_outputs: usize,
}

impl<S: SampleAccessor + ?Sized> TreeWalk<'_, S> {
    /// Visit `node` at tree depth `level`, having reached it through a
    /// decision with the given fractions on `feature_index`.
    ///
    /// Frame `level` of the stack holds this node's path; deeper frames are
    /// scratch for the children.
    #[allow(clippy::too_many_arguments)]
    fn recurse<P: PathRecurrence>(
        &self,
        stack: &mut PathStack<P>,
        phi: &mut [f64],
        node: NodeId,
        level: usize,
        zero_fraction: f32,
        one_fraction: f32,
        feature_index: i32,
    ) -> Result<(), PathError> {
        let path = stack.enter(level);
        path.extend(zero_fraction, one_fraction, feature_index)?;

        if self.tree.is_leaf(node) {
            let leaf_value = self.tree.leaf_value(node).0;
            for i in 1..path.len() {
                let weight = path.unwound_sum(i)?;
                let element = path.element(i);
                let contribution = weight * (element.one_fraction - element.zero_fraction) * leaf_value;
                phi[element.feature_index as usize * self.n_outputs + self.group] += f64::from(contribution);
            }
            return Ok(());
        }

        let split = self.tree.split_index(node);
        let left = self.tree.left_child(node);
        let right = self.tree.right_child(node);
        let hot = self.tree.child_for(node, self.sample.feature(split as usize));
        let cold = if hot == left { right } else { left };

        let cover = self.covers[node as usize];
        let hot_zero_fraction = self.covers[hot as usize] / cover;
        let cold_zero_fraction = self.covers[cold as usize] / cover;

        // A feature seen earlier on the path is retracted and re-split here
        // with the fractions it carried.
        debug_assert!(split <= i32::MAX as u32);
        let feature = split as i32;
        let (incoming_zero, incoming_one) = match path.find_feature(feature) {
            Some(index) => {
                let element = *path.element(index);
                path.unwind(index)?;
                (element.zero_fraction, element.one_fraction)
            }
            None => (1.0, 1.0),
        };

        let children = [
            (hot, hot_zero_fraction * incoming_zero, incoming_one),
            (cold, cold_zero_fraction * incoming_zero, 0.0),
        ];
        for (child, zero, one) in children {
            // No subset of observed features reaches this child.
            if zero == 0.0 && one == 0.0 {
                continue;
            }
            self.recurse(stack, phi, child, level + 1, zero, one, feature)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainability::shap::ConfigError;
    use crate::repr::gbdt::ForestValidationError;
    use crate::scalar_tree;
    use crate::testing::exact_shap_values;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    fn single_split_forest() -> Forest<ScalarLeaf> {
        let tree = scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => leaf(1.0),
            2 => leaf(2.0);
            covers = [10.0, 4.0, 6.0]
        };
        let mut forest = Forest::for_regression();
        forest.push_tree(tree, 0);
        forest
    }

    /// Depth-3 tree that splits on feature 0 twice along one branch.
    fn repeated_feature_forest() -> Forest<ScalarLeaf> {
        let tree = scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => num(1, 0.3, R) -> 3, 4,
            2 => num(2, 0.0, L) -> 5, 6,
            3 => leaf(-1.0),
            4 => num(0, 0.2, L) -> 7, 8,
            5 => leaf(3.0),
            6 => leaf(0.5),
            7 => leaf(2.0),
            8 => leaf(-2.5);
            covers = [20.0, 12.0, 8.0, 5.0, 7.0, 2.0, 6.0, 3.0, 4.0]
        };
        let mut forest = Forest::for_regression().with_base_score(vec![0.25]);
        forest.push_tree(tree, 0);
        forest
    }

    fn config(algorithm: ShapAlgorithm) -> TreeShapConfig {
        TreeShapConfig::builder()
            .algorithm(algorithm)
            .n_threads(1)
            .check_additivity(true)
            .build()
            .unwrap()
    }

    #[test]
    fn base_value_is_cover_weighted_mean() {
        let forest = single_split_forest();
        let explainer = TreeExplainer::new(&forest, TreeShapConfig::default()).unwrap();
        assert_abs_diff_eq!(explainer.base_value(0), 1.6, epsilon = 1e-9);
        assert_eq!(explainer.max_depth(), 1);
    }

    #[rstest]
    #[case(ShapAlgorithm::FullPath)]
    #[case(ShapAlgorithm::SplitWeights)]
    fn single_split_attribution(#[case] algorithm: ShapAlgorithm) {
        let forest = single_split_forest();
        let explainer = TreeExplainer::new(&forest, config(algorithm)).unwrap();

        let data = array![[0.3f32, 9.0], [0.7, -9.0]];
        let shap = explainer.shap_values(SamplesView::from_array(data.view())).unwrap();

        assert_eq!(shap.n_samples(), 2);
        assert_eq!(shap.n_features(), 2);
        assert_abs_diff_eq!(shap.get(0, 0, 0), -0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(shap.get(1, 0, 0), 0.4, epsilon = 1e-6);
        assert_eq!(shap.get(0, 1, 0), 0.0);
        assert_abs_diff_eq!(shap.base_value(1, 0), 1.6, epsilon = 1e-6);
    }

    #[rstest]
    #[case(ShapAlgorithm::FullPath)]
    #[case(ShapAlgorithm::SplitWeights)]
    fn repeated_feature_matches_exact(#[case] algorithm: ShapAlgorithm) {
        let forest = repeated_feature_forest();
        let explainer = TreeExplainer::new(&forest, config(algorithm)).unwrap();

        let rows = [
            [0.1f32, 0.5, 1.0],
            [0.3, 0.1, -1.0],
            [0.9, f32::NAN, -1.0],
            [f32::NAN, 0.4, 0.0],
        ];
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let view = SamplesView::from_slice(&flat, rows.len(), 3).unwrap();
        let shap = explainer.shap_values(view).unwrap();

        for (i, row) in rows.iter().enumerate() {
            let exact = exact_shap_values(&forest, row, 3);
            for (f, &expected) in exact.iter().enumerate() {
                assert_abs_diff_eq!(shap.sample(i)[f], expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn algorithms_agree_in_parallel() {
        let forest = repeated_feature_forest();
        let data = array![[0.1f32, 0.5, 1.0], [0.3, 0.1, -1.0], [0.9, 0.2, -1.0], [0.45, 0.35, 0.0]];
        let view = SamplesView::from_array(data.view());

        let explain = |algorithm: ShapAlgorithm| {
            let config = TreeShapConfig::builder().algorithm(algorithm).n_threads(2).build().unwrap();
            TreeExplainer::new(&forest, config).unwrap().shap_values(view).unwrap()
        };
        let full = explain(ShapAlgorithm::FullPath);
        let split = explain(ShapAlgorithm::SplitWeights);

        for (a, b) in full.values().iter().zip(split.values()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn multi_group_outputs() {
        let mut forest = Forest::new(2).with_base_score(vec![1.0, -1.0]);
        forest.push_tree(single_split_forest().tree(0).clone(), 1);
        forest.push_tree(repeated_feature_forest().tree(0).clone(), 0);

        let explainer = TreeExplainer::new(&forest, config(ShapAlgorithm::SplitWeights)).unwrap();
        assert_abs_diff_eq!(explainer.base_value(1), 0.6, epsilon = 1e-6);

        let data = array![[0.3f32, 0.1, 1.0]];
        let shap = explainer.shap_values(SamplesView::from_array(data.view())).unwrap();
        assert_eq!(shap.n_outputs(), 2);
        assert_abs_diff_eq!(shap.get(0, 0, 1), -0.6, epsilon = 1e-6);
        assert_eq!(shap.get(0, 1, 1), 0.0);

        let prediction = forest.predict_row(&[0.3, 0.1, 1.0]);
        for (output, &pred) in prediction.iter().enumerate() {
            assert_abs_diff_eq!(shap.total(0, output), f64::from(pred), epsilon = 1e-5);
        }
    }

    #[test]
    fn zero_cover_branch_contributes_nothing() {
        let tree = scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => num(0, 0.25, L) -> 3, 4,
            2 => leaf(5.0),
            3 => leaf(1.0),
            4 => leaf(-1.0);
            covers = [4.0, 4.0, 0.0, 3.0, 1.0]
        };
        let mut forest = Forest::for_regression();
        forest.push_tree(tree, 0);

        let explainer = TreeExplainer::new(&forest, config(ShapAlgorithm::SplitWeights)).unwrap();
        let data = [0.1f32, 0.9];
        let shap = explainer.shap_values(SamplesView::from_slice(&data, 2, 1).unwrap()).unwrap();

        // Expected value is 0.5; the right branch never saw training data.
        assert_abs_diff_eq!(shap.get(0, 0, 0), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(shap.get(1, 0, 0), 4.5, epsilon = 1e-6);
    }

    #[test]
    fn empty_batch() {
        let forest = single_split_forest();
        let explainer = TreeExplainer::new(&forest, TreeShapConfig::default()).unwrap();
        let shap = explainer.shap_values(SamplesView::from_slice(&[], 0, 1).unwrap()).unwrap();
        assert_eq!(shap.n_samples(), 0);
        assert!(shap.values().is_empty());
    }

    #[test]
    fn missing_covers_error() {
        let tree = scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => leaf(-1.0),
            2 => leaf(1.0),
        };
        let mut forest = Forest::for_regression();
        forest.push_tree(tree, 0);

        let explainer = TreeExplainer::new(&forest, TreeShapConfig::default());
        assert!(matches!(explainer, Err(ExplainError::MissingNodeStats(_))));
    }

    #[test]
    fn invalid_forest_error() {
        let tree = scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => leaf(-1.0),
            2 => leaf(1.0);
            covers = [1.0, 1.0]
        };
        let mut forest = Forest::for_regression();
        forest.push_tree(tree, 0);

        let explainer = TreeExplainer::new(&forest, TreeShapConfig::default());
        assert!(matches!(
            explainer,
            Err(ExplainError::InvalidForest(ForestValidationError::InvalidTree { tree_idx: 0, .. }))
        ));
    }

    #[test]
    fn narrow_samples_rejected() {
        let forest = repeated_feature_forest();
        let explainer = TreeExplainer::new(&forest, TreeShapConfig::default()).unwrap();
        let data = [0.1f32, 0.2];
        let result = explainer.shap_values(SamplesView::from_slice(&data, 1, 2).unwrap());
        assert_eq!(result.unwrap_err(), ExplainError::FeatureCountMismatch { expected: 3, actual: 2 });
    }

    #[test]
    fn additivity_violation_is_reported() {
        let tree = scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => leaf(1.0),
            2 => leaf(f32::NAN);
            covers = [10.0, 4.0, 6.0]
        };
        let mut forest = Forest::for_regression();
        forest.push_tree(tree, 0);

        let config = TreeShapConfig::builder().check_additivity(true).n_threads(1).build().unwrap();
        let explainer = TreeExplainer::new(&forest, config).unwrap();
        let data = [0.3f32];
        let result = explainer.shap_values(SamplesView::from_slice(&data, 1, 1).unwrap());
        assert!(matches!(result, Err(ExplainError::AdditivityViolation { sample: 0, output: 0, .. })));
    }

    #[test]
    fn config_error_is_distinct() {
        let err = TreeShapConfig::builder().additivity_tolerance(-1.0).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidTolerance(-1.0));
    }
}
