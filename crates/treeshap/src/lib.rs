//! treeshap: exact TreeSHAP attributions for gradient-boosted tree ensembles.
//!
//! Computes per-feature SHAP values for forests of regression trees with
//! the polynomial-time path recurrence of Lundberg et al. Two memory
//! layouts of the recurrence are available and produce the same values.
//!
//! # Key Types
//!
//! - [`TreeExplainer`] - Computes [`ShapValues`] for a [`Forest`]
//! - [`TreeShapConfig`] - Explainer configuration builder
//! - [`PathRecurrence`] - The extend / unwind / unwound-sum kernel, with
//!   [`FullPath`] and [`SplitPath`] layouts
//!
//! # Example
//!
//! ```
//! use treeshap::{Forest, SamplesView, TreeExplainer, TreeShapConfig};
//!
//! let tree = treeshap::scalar_tree! {
//!     0 => num(0, 0.5, L) -> 1, 2,
//!     1 => num(1, 1.0, R) -> 3, 4,
//!     2 => leaf(3.0),
//!     3 => leaf(-1.0),
//!     4 => leaf(1.0);
//!     covers = [8.0, 6.0, 2.0, 3.0, 3.0]
//! };
//! let mut forest = Forest::for_regression();
//! forest.push_tree(tree, 0);
//!
//! let config = TreeShapConfig::builder().check_additivity(true).build().unwrap();
//! let explainer = TreeExplainer::new(&forest, config).unwrap();
//!
//! let data = [0.2f32, 2.0];
//! let shap = explainer.shap_values(SamplesView::from_slice(&data, 1, 2).unwrap()).unwrap();
//! let prediction = forest.predict_row(&data)[0] as f64;
//! assert!((shap.total(0, 0) - prediction).abs() < 1e-5);
//! ```

// Re-export approx traits for users who want to compare attributions
pub use approx;

pub mod data;
pub mod explainability;
pub mod repr;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{SampleAccessor, SamplesView};
pub use explainability::shap::{
    ConfigError, FullPath, PathElement, PathError, PathRecurrence, ShapAlgorithm, ShapValues, SplitPath,
    TreeExplainer, TreeShapConfig,
};
pub use explainability::ExplainError;
pub use repr::gbdt::{Forest, MutableTree, ScalarLeaf, Tree, TreeView};
pub use utils::{run_with_threads, Parallelism};
