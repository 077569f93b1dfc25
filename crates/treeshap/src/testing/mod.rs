//! Testing utilities for treeshap.
//!
//! Helpers shared by unit tests, integration tests and benchmarks:
//!
//! - [`scalar_tree!`](crate::scalar_tree): literal trees in a compact notation
//! - [`exact_shap_values`]: brute-force Shapley values for small feature counts
//! - [`random_forest`], [`random_dense_f32`]: seeded synthetic models and data
//!
//! # Usage
//!
//! ```
//! use treeshap::repr::gbdt::Forest;
//! use treeshap::testing::exact_shap_values;
//!
//! let tree = treeshap::scalar_tree! {
//!     0 => num(0, 0.5, L) -> 1, 2,
//!     1 => leaf(1.0),
//!     2 => leaf(2.0);
//!     covers = [10.0, 4.0, 6.0]
//! };
//! let mut forest = Forest::for_regression();
//! forest.push_tree(tree, 0);
//!
//! // [phi_0, base]
//! let exact = exact_shap_values(&forest, &[0.3], 1);
//! assert!((exact[0] + 0.6).abs() < 1e-9);
//! assert!((exact[1] - 1.6).abs() < 1e-9);
//! ```

use rand::prelude::*;

use crate::repr::gbdt::{Forest, MutableTree, NodeId, ScalarLeaf, Tree, TreeView};

/// Build a [`Tree<ScalarLeaf>`](crate::repr::gbdt::Tree) from node literals.
///
/// Each entry is `id => num(feature, threshold, L|R) -> left, right` for a
/// split (the last argument is the default direction for missing values)
/// or `id => leaf(value)`. Ids must cover `0..n`. Covers can be appended
/// after a semicolon.
///
/// ```
/// let tree = treeshap::scalar_tree! {
///     0 => num(0, 0.5, L) -> 1, 2,
///     1 => leaf(-1.0),
///     2 => leaf(1.0);
///     covers = [2.0, 1.0, 1.0]
/// };
/// assert_eq!(tree.predict_row(&[0.7]).0, 1.0);
/// assert_eq!(tree.covers(), Some(&[2.0, 1.0, 1.0][..]));
/// ```
#[macro_export]
macro_rules! scalar_tree {
    (@node $tree:ident, $id:literal, num($feature:expr, $threshold:expr, L) -> $left:literal, $right:literal) => {
        $tree.set_numeric_split($id, $feature, $threshold, true, $left, $right);
    };
    (@node $tree:ident, $id:literal, num($feature:expr, $threshold:expr, R) -> $left:literal, $right:literal) => {
        $tree.set_numeric_split($id, $feature, $threshold, false, $left, $right);
    };
    (@node $tree:ident, $id:literal, leaf($value:expr)) => {
        $tree.make_leaf($id, $crate::repr::gbdt::ScalarLeaf($value));
    };
    (
        $( $id:literal => $kind:ident ( $($args:tt)* ) $( -> $left:literal, $right:literal )? ),+ $(,)?
        $( ; covers = [ $($cover:expr),* $(,)? ] )?
    ) => {{
        let n_nodes = [$($id),+].len();
        let mut tree = $crate::repr::gbdt::MutableTree::<$crate::repr::gbdt::ScalarLeaf>::with_capacity(n_nodes);
        tree.init_root_with_n_nodes(n_nodes);
        $( $crate::scalar_tree!(@node tree, $id, $kind($($args)*) $(-> $left, $right)?); )+
        let tree = tree.freeze();
        $( let tree = tree.with_covers(::std::vec![$($cover),*]); )?
        tree
    }};
}

/// Exact SHAP values by enumerating every feature subset.
///
/// The value of a subset `S` is the tree's output when the features in `S`
/// follow the sample and every other split averages its children by cover.
/// Returns one sample block in [`ShapValues`](crate::explainability::shap::ShapValues)
/// layout: `[(n_features + 1) * n_outputs]` with the base value last.
///
/// Cost is `O(2^n_features)` tree walks per tree; meant for small tests.
///
/// # Panics
/// Panics if a tree lacks covers, `n_features > 20`, or `sample` is narrower
/// than the features the forest splits on.
pub fn exact_shap_values(forest: &Forest<ScalarLeaf>, sample: &[f32], n_features: usize) -> Vec<f64> {
    assert!(n_features <= 20, "exact SHAP is exponential in the feature count");

    let n_outputs = forest.n_groups() as usize;
    let base_offset = n_features * n_outputs;
    let mut out = vec![0.0; (n_features + 1) * n_outputs];
    for (group, &base) in forest.base_score().iter().enumerate() {
        out[base_offset + group] = f64::from(base);
    }

    // Shapley weight |S|! (M - |S| - 1)! / M!, indexed by |S|.
    let weights: Vec<f64> = (0..n_features)
        .map(|size| factorial(size) * factorial(n_features - size - 1) / factorial(n_features))
        .collect();

    let n_subsets = 1usize << n_features;
    for (tree, group) in forest.trees_with_groups() {
        let covers = tree.covers().expect("exact SHAP needs tree covers");
        let group = group as usize;

        let values: Vec<f64> = (0..n_subsets)
            .map(|known| conditional_expectation(tree, covers, sample, known, 0))
            .collect();

        out[base_offset + group] += values[0];
        for feature in 0..n_features {
            let bit = 1usize << feature;
            let phi: f64 = (0..n_subsets)
                .filter(|subset| subset & bit == 0)
                .map(|subset| weights[subset.count_ones() as usize] * (values[subset | bit] - values[subset]))
                .sum();
            out[feature * n_outputs + group] += phi;
        }
    }

    out
}

fn conditional_expectation(tree: &Tree<ScalarLeaf>, covers: &[f32], sample: &[f32], known: usize, node: NodeId) -> f64 {
    if tree.is_leaf(node) {
        return f64::from(tree.leaf_value(node).0);
    }

    let feature = tree.split_index(node) as usize;
    if known & (1 << feature) != 0 {
        let child = tree.child_for(node, sample[feature]);
        return conditional_expectation(tree, covers, sample, known, child);
    }

    let left = tree.left_child(node);
    let right = tree.right_child(node);
    let left_value = f64::from(covers[left as usize]) * conditional_expectation(tree, covers, sample, known, left);
    let right_value = f64::from(covers[right as usize]) * conditional_expectation(tree, covers, sample, known, right);
    (left_value + right_value) / f64::from(covers[node as usize])
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Generate random dense features in sample-major order.
///
/// Values are uniform in `[min, max]`.
pub fn random_dense_f32(rows: usize, cols: usize, seed: u64, min: f32, max: f32) -> Vec<f32> {
    assert!(max >= min);
    let mut rng = StdRng::seed_from_u64(seed);
    let width = max - min;
    (0..rows * cols).map(|_| min + rng.gen::<f32>() * width).collect()
}

/// Generate a regression forest with covers.
///
/// Splits use features in `0..n_features` and thresholds in `[-1, 1]`;
/// branches stop early at random so leaves sit at mixed depths. Every
/// split hands 10% to 90% of its cover to the left child.
pub fn random_forest(n_trees: usize, max_depth: usize, n_features: usize, seed: u64) -> Forest<ScalarLeaf> {
    assert!(n_features > 0);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut forest = Forest::for_regression().with_base_score(vec![rng.gen_range(-1.0..1.0)]);

    for _ in 0..n_trees {
        let mut tree = MutableTree::<ScalarLeaf>::new();
        let root = tree.init_root();
        let mut grower = RandomGrower {
            rng: &mut rng,
            max_depth,
            n_features,
        };
        grower.grow(&mut tree, root, 0, 100.0);
        forest.push_tree(tree.freeze(), 0);
    }

    forest
}

struct RandomGrower<'r> {
    rng: &'r mut StdRng,
    max_depth: usize,
    n_features: usize,
}

impl RandomGrower<'_> {
    fn grow(&mut self, tree: &mut MutableTree<ScalarLeaf>, node: NodeId, depth: usize, cover: f32) {
        tree.set_cover(node, cover);
        if depth == self.max_depth || (depth > 0 && self.rng.gen_bool(0.2)) {
            tree.make_leaf(node, ScalarLeaf(self.rng.gen_range(-1.0..1.0)));
            return;
        }

        let feature = self.rng.gen_range(0..self.n_features) as u32;
        let threshold = self.rng.gen_range(-1.0..1.0);
        let default_left = self.rng.gen_bool(0.5);
        let (left, right) = tree.apply_numeric_split(node, feature, threshold, default_left);

        let left_share: f32 = self.rng.gen_range(0.1..0.9);
        self.grow(tree, left, depth + 1, cover * left_share);
        self.grow(tree, right, depth + 1, cover * (1.0 - left_share));
    }
}
