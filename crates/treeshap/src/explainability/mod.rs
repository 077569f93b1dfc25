//! Model explanations.
//!
//! - [`shap`]: exact TreeSHAP attributions for tree ensembles

pub mod shap;

use crate::repr::gbdt::ForestValidationError;
use shap::PathError;

/// Errors raised while building an explainer or computing attributions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplainError {
    /// Trees lack the node statistics the algorithm needs.
    #[error("missing node statistics: {0}")]
    MissingNodeStats(&'static str),

    /// The forest failed structural validation.
    #[error("invalid forest: {0:?}")]
    InvalidForest(ForestValidationError),

    /// Samples have fewer features than the forest splits on.
    #[error("samples have {actual} features but the forest needs at least {expected}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Path(#[from] PathError),

    /// Base value plus attributions do not reproduce the model output.
    #[error(
        "additivity check failed for sample {sample}, output {output}: \
         prediction {expected}, attributions sum to {actual}"
    )]
    AdditivityViolation {
        sample: usize,
        output: usize,
        expected: f64,
        actual: f64,
    },
}

impl From<ForestValidationError> for ExplainError {
    fn from(error: ForestValidationError) -> Self {
        Self::InvalidForest(error)
    }
}
