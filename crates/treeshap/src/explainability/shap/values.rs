//! SHAP values container.

use ndarray::Array3;

/// First sample/output whose attributions do not add up to the prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdditivityGap {
    pub sample: usize,
    pub output: usize,
    /// Model prediction.
    pub expected: f64,
    /// Base value plus the sum of attributions.
    pub actual: f64,
}

/// Per-sample, per-feature, per-output SHAP attributions.
///
/// Layout is `[samples × (features + 1) × outputs]`; the extra feature slot
/// holds the base value (expected model output).
#[derive(Clone, Debug)]
pub struct ShapValues {
    values: Vec<f64>,
    n_samples: usize,
    n_features: usize,
    n_outputs: usize,
}

impl ShapValues {
    /// Zero-initialized container.
    pub fn zeros(n_samples: usize, n_features: usize, n_outputs: usize) -> Self {
        let values = vec![0.0; n_samples * (n_features + 1) * n_outputs];
        Self { values, n_samples, n_features, n_outputs }
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of features, not counting the base value slot.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Length of one sample's block in the flat storage.
    #[inline]
    pub fn sample_len(&self) -> usize {
        (self.n_features + 1) * self.n_outputs
    }

    #[inline]
    fn index(&self, sample: usize, feature: usize, output: usize) -> usize {
        sample * self.sample_len() + feature * self.n_outputs + output
    }

    #[inline]
    pub fn get(&self, sample: usize, feature: usize, output: usize) -> f64 {
        self.values[self.index(sample, feature, output)]
    }

    #[inline]
    pub fn set(&mut self, sample: usize, feature: usize, output: usize, value: f64) {
        let idx = self.index(sample, feature, output);
        self.values[idx] = value;
    }

    #[inline]
    pub fn add(&mut self, sample: usize, feature: usize, output: usize, delta: f64) {
        let idx = self.index(sample, feature, output);
        self.values[idx] += delta;
    }

    /// Base value (expected output), stored at feature index `n_features`.
    #[inline]
    pub fn base_value(&self, sample: usize, output: usize) -> f64 {
        self.get(sample, self.n_features, output)
    }

    #[inline]
    pub fn set_base_value(&mut self, sample: usize, output: usize, value: f64) {
        self.set(sample, self.n_features, output, value);
    }

    /// All values for one sample, base value included.
    pub fn sample(&self, sample_idx: usize) -> &[f64] {
        let len = self.sample_len();
        &self.values[sample_idx * len..(sample_idx + 1) * len]
    }

    /// Mutable per-sample blocks, in sample order.
    ///
    /// Blocks are disjoint, so they can be filled from different threads.
    pub fn samples_mut(&mut self) -> std::slice::ChunksMut<'_, f64> {
        let len = self.sample_len().max(1);
        self.values.chunks_mut(len)
    }

    /// Feature attributions (base value excluded) for one sample and output.
    pub fn feature_shap(&self, sample_idx: usize, output: usize) -> Vec<f64> {
        (0..self.n_features)
            .map(|f| self.get(sample_idx, f, output))
            .collect()
    }

    /// Base value plus all feature attributions for one sample and output.
    pub fn total(&self, sample: usize, output: usize) -> f64 {
        (0..=self.n_features)
            .map(|f| self.get(sample, f, output))
            .sum()
    }

    /// Find the first sample/output where `total` deviates from the
    /// prediction by more than `tolerance`, or either is NaN.
    ///
    /// `predictions` is row-major `[sample][output]`.
    ///
    /// # Panics
    /// Panics if `predictions.len() != n_samples * n_outputs`.
    pub fn additivity_gap(&self, predictions: &[f64], tolerance: f64) -> Option<AdditivityGap> {
        assert_eq!(
            predictions.len(),
            self.n_samples * self.n_outputs,
            "predictions must have length n_samples * n_outputs"
        );

        for sample in 0..self.n_samples {
            for output in 0..self.n_outputs {
                let expected = predictions[sample * self.n_outputs + output];
                let actual = self.total(sample, output);
                let diff = (actual - expected).abs();
                if diff.is_nan() || diff > tolerance {
                    return Some(AdditivityGap { sample, output, expected, actual });
                }
            }
        }
        None
    }

    /// Whether every sample satisfies `base + Σ shap ≈ prediction`.
    pub fn verify(&self, predictions: &[f64], tolerance: f64) -> bool {
        predictions.len() == self.n_samples * self.n_outputs
            && self.additivity_gap(predictions, tolerance).is_none()
    }

    /// Raw flat storage.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Copy into an array of shape `(n_samples, n_features + 1, n_outputs)`.
    pub fn to_array(&self) -> Array3<f64> {
        Array3::from_shape_vec(
            (self.n_samples, self.n_features + 1, self.n_outputs),
            self.values.clone(),
        )
        .expect("storage length matches shape")
    }
}
