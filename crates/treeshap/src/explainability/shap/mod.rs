//! TreeSHAP explanations.
//!
//! - [`TreeExplainer`]: SHAP values for a [`Forest`](crate::repr::gbdt::Forest)
//! - [`ShapValues`]: attribution container
//! - [`full_path`] and [`split_path`]: the two layouts of the path recurrence

mod config;
pub mod full_path;
mod path;
pub mod split_path;
mod tree_explainer;
mod values;

pub use config::{ConfigError, ShapAlgorithm, TreeShapConfig};
pub use full_path::FullPath;
pub use path::{PathElement, PathError, PathRecurrence, PathStack, ROOT_FEATURE};
pub use split_path::SplitPath;
pub use tree_explainer::TreeExplainer;
pub use values::{AdditivityGap, ShapValues};
