//! Input feature access for tree traversal.
//!
//! - [`SampleAccessor`]: feature values of a single sample
//! - [`SamplesView`]: sample-major batch of samples backed by ndarray

mod accessor;
mod views;

pub use accessor::SampleAccessor;
pub use views::SamplesView;
