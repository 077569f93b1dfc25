//! TreeSHAP explainer configuration with builder pattern.
//!
//! # Example
//!
//! ```
//! use treeshap::explainability::shap::{ShapAlgorithm, TreeShapConfig};
//!
//! // All defaults
//! let config = TreeShapConfig::builder().build().unwrap();
//! assert_eq!(config.algorithm, ShapAlgorithm::SplitWeights);
//!
//! let config = TreeShapConfig::builder()
//!     .algorithm(ShapAlgorithm::FullPath)
//!     .n_threads(4)
//!     .check_additivity(true)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.n_threads, 4);
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Additivity tolerance must be finite and positive.
    #[error("additivity_tolerance must be finite and positive, got {0}")]
    InvalidTolerance(f64),
}

// =============================================================================
// ShapAlgorithm
// =============================================================================

/// Memory layout of the unique path used during traversal.
///
/// Both produce the same attributions up to floating-point rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapAlgorithm {
    /// Weights stored inline in every path entry.
    FullPath,
    /// Weights kept in a separate buffer that only grows on the hot path.
    #[default]
    SplitWeights,
}

// =============================================================================
// TreeShapConfig
// =============================================================================

/// Configuration for [`TreeExplainer`](super::TreeExplainer).
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct TreeShapConfig {
    /// Path layout. Default: [`ShapAlgorithm::SplitWeights`].
    #[builder(default)]
    #[serde(default)]
    pub algorithm: ShapAlgorithm,

    /// Number of threads: 0 = auto, 1 = sequential, n = exactly n.
    #[builder(default)]
    #[serde(default)]
    pub n_threads: usize,

    /// Verify `base + Σ shap == prediction` for every sample. Default: false.
    #[builder(default)]
    #[serde(default)]
    pub check_additivity: bool,

    /// Absolute tolerance for the additivity check. Default: 1e-4.
    #[builder(default = 1e-4)]
    #[serde(default = "default_additivity_tolerance")]
    pub additivity_tolerance: f64,
}

fn default_additivity_tolerance() -> f64 {
    1e-4
}

impl Default for TreeShapConfig {
    fn default() -> Self {
        Self {
            algorithm: ShapAlgorithm::default(),
            n_threads: 0,
            check_additivity: false,
            additivity_tolerance: default_additivity_tolerance(),
        }
    }
}

/// Custom finishing function that validates the config.
impl<S: tree_shap_config_builder::IsComplete> TreeShapConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `additivity_tolerance` is not finite and
    /// positive.
    pub fn build(self) -> Result<TreeShapConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl TreeShapConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tol = self.additivity_tolerance;
        if !tol.is_finite() || tol <= 0.0 {
            return Err(ConfigError::InvalidTolerance(tol));
        }
        Ok(())
    }
}
