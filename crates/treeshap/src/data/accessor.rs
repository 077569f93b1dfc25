//! Single-sample feature access.

/// Read-only access to the features of one sample.
///
/// Implemented directly by slices, so `&[f32]` can be handed to tree
/// traversal without a wrapper.
///
/// # Example
///
/// ```
/// use treeshap::data::SampleAccessor;
///
/// let features: &[f32] = &[0.5, 1.2, 3.4];
/// assert_eq!(features.feature(1), 1.2);
/// assert_eq!(features.n_features(), 3);
/// ```
pub trait SampleAccessor {
    /// Feature value at `index`. `f32::NAN` marks a missing value.
    fn feature(&self, index: usize) -> f32;

    /// Number of features in this sample.
    fn n_features(&self) -> usize;
}

impl SampleAccessor for [f32] {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.len()
    }
}

impl<const N: usize> SampleAccessor for [f32; N] {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        N
    }
}

impl<T: SampleAccessor + ?Sized> SampleAccessor for &T {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        (**self).feature(index)
    }

    #[inline]
    fn n_features(&self) -> usize {
        (**self).n_features()
    }
}

// May be strided when taken from a column-major array.
impl SampleAccessor for ndarray::ArrayView1<'_, f32> {
    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.len()
    }
}
