//! Batch views over feature matrices.

use ndarray::{ArrayView1, ArrayView2};

/// Sample-major view `[n_samples, n_features]` over `f32` features.
#[derive(Debug, Clone, Copy)]
pub struct SamplesView<'a> {
    data: ArrayView2<'a, f32>,
}

impl<'a> SamplesView<'a> {
    /// Wrap an array with shape `[n_samples, n_features]`.
    pub fn from_array(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// Zero-copy view over a row-major slice.
    ///
    /// Returns `None` if `data.len() != n_samples * n_features`.
    pub fn from_slice(data: &'a [f32], n_samples: usize, n_features: usize) -> Option<Self> {
        ArrayView2::from_shape((n_samples, n_features), data)
            .ok()
            .map(|data| Self { data })
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Feature value at (sample, feature).
    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f32 {
        self.data[[sample, feature]]
    }

    /// Features of one sample.
    #[inline]
    pub fn sample(&self, sample: usize) -> ArrayView1<'_, f32> {
        self.data.row(sample)
    }

    /// Underlying array view.
    pub fn view(&self) -> ArrayView2<'a, f32> {
        self.data
    }
}
