//! Scalar noise models applied to observation values.
//!
//! [`NoiseModel`] is a plain enum dispatched with `match`. Composition uses
//! the [`Chain`](NoiseModel::Chain) variant, which applies its children in
//! sequence. All variants are stateless: corruption is resampled on every
//! application.

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform as UniformDist};
use std::fmt;

// ---------------------------------------------------------------------------
// NoiseError
// ---------------------------------------------------------------------------

/// Validation errors for noise model parameters.
///
/// Implements [`Copy`] for cheap propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseError {
    /// Standard deviation was negative, NaN, or infinite.
    InvalidStdDev { value: f32 },
    /// Range bounds are invalid: `low >= high`, NaN, or infinite.
    InvalidRange { low: f32, high: f32 },
    /// Quantization step was `<= 0`, NaN, or infinite.
    InvalidStep { step: f32 },
}

impl fmt::Display for NoiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InvalidStdDev { value } => {
                write!(f, "std_dev must be finite and >= 0, got {value}")
            }
            Self::InvalidRange { low, high } => {
                write!(
                    f,
                    "range must satisfy low < high with finite bounds, got [{low}, {high})"
                )
            }
            Self::InvalidStep { step } => {
                write!(f, "quantization step must be finite and > 0, got {step}")
            }
        }
    }
}

impl std::error::Error for NoiseError {}

// ---------------------------------------------------------------------------
// NoiseModel
// ---------------------------------------------------------------------------

/// Scalar noise model.
///
/// # Composition
///
/// Use [`Chain`](Self::Chain) to combine models: each child is applied to the
/// running value in order, so an additive model followed by
/// [`Quantization`](Self::Quantization) yields noisy-then-quantized output.
#[derive(Clone, Debug)]
pub enum NoiseModel {
    /// Additive Gaussian: `N(mean, std²)`.
    Gaussian { mean: f32, std: f32 },
    /// Additive uniform random in `[low, high)`.
    Uniform { low: f32, high: f32 },
    /// Rounds a value to the nearest multiple of `step`.
    ///
    /// Use via [`apply`](Self::apply), not [`sample`](Self::sample).
    /// `sample()` returns `0.0` (additive identity).
    Quantization { step: f32 },
    /// Applies each child in sequence.
    Chain(Vec<Self>),
}

// ---------------------------------------------------------------------------
// Constructors (all validate parameters)
// ---------------------------------------------------------------------------

impl NoiseModel {
    /// Create a Gaussian noise model with the given mean and standard deviation.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidStdDev`] if `std` is negative, NaN, or
    /// infinite, or `mean` is not finite.
    pub fn gaussian(mean: f32, std: f32) -> Result<Self, NoiseError> {
        if !std.is_finite() || std < 0.0 {
            return Err(NoiseError::InvalidStdDev { value: std });
        }
        if !mean.is_finite() {
            return Err(NoiseError::InvalidStdDev { value: mean });
        }
        Ok(Self::Gaussian { mean, std })
    }

    /// Convenience constructor for zero-mean Gaussian noise.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidStdDev`] if `std` is negative, NaN, or
    /// infinite.
    pub fn gaussian_zero_mean(std: f32) -> Result<Self, NoiseError> {
        Self::gaussian(0.0, std)
    }

    /// Create a uniform noise model sampling from `[low, high)`.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidRange`] if `low >= high` or either bound
    /// is NaN/infinite.
    pub fn uniform(low: f32, high: f32) -> Result<Self, NoiseError> {
        if !low.is_finite() || !high.is_finite() || low >= high {
            return Err(NoiseError::InvalidRange { low, high });
        }
        Ok(Self::Uniform { low, high })
    }

    /// Convenience constructor for symmetric uniform noise
    /// `[-half_range, half_range)`.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidRange`] if `half_range` is non-positive,
    /// NaN, or infinite.
    pub fn uniform_symmetric(half_range: f32) -> Result<Self, NoiseError> {
        Self::uniform(-half_range, half_range)
    }

    /// Create a quantization noise model that rounds values to the nearest
    /// multiple of `step`.
    ///
    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidStep`] if `step` is non-positive, NaN, or
    /// infinite.
    pub fn quantization(step: f32) -> Result<Self, NoiseError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(NoiseError::InvalidStep { step });
        }
        Ok(Self::Quantization { step })
    }

    /// Create a chain that applies the given noise models in sequence.
    pub const fn chain(models: Vec<Self>) -> Self {
        Self::Chain(models)
    }
}

// ---------------------------------------------------------------------------
// Sampling and application
// ---------------------------------------------------------------------------

impl NoiseModel {
    /// Sample a single noise value.
    ///
    /// For [`Quantization`](Self::Quantization), returns `0.0` (use
    /// [`apply`](Self::apply) instead).
    #[allow(clippy::cast_possible_truncation)] // intentional f64→f32 for rand_distr
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        match self {
            Self::Gaussian { mean, std } => {
                if *std == 0.0 {
                    return *mean;
                }
                let dist = Normal::new(f64::from(*mean), f64::from(*std))
                    .expect("validated in constructor");
                dist.sample(rng) as f32
            }
            Self::Uniform { low, high } => {
                let dist = UniformDist::new(*low, *high);
                dist.sample(rng)
            }
            Self::Quantization { .. } => 0.0,
            Self::Chain(models) => models.iter().map(|model| model.sample(rng)).sum(),
        }
    }

    /// Apply noise to a clean value.
    ///
    /// For additive variants this is `value + sample()`.
    /// For [`Quantization`](Self::Quantization), this rounds `value` to the
    /// nearest multiple of `step`.
    /// For [`Chain`](Self::Chain), applies each child sequentially.
    pub fn apply<R: Rng + ?Sized>(&self, value: f32, rng: &mut R) -> f32 {
        match self {
            Self::Quantization { step } => (value / *step).round() * *step,
            Self::Chain(models) => {
                let mut v = value;
                for model in models {
                    v = model.apply(v, rng);
                }
                v
            }
            _ => value + self.sample(rng),
        }
    }

    /// Apply noise element-wise to a batch row-slice, drawing an independent
    /// sample per element.
    pub fn apply_slice<R: Rng + ?Sized>(&self, values: &mut [f32], rng: &mut R) {
        for v in values {
            *v = self.apply(*v, rng);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    // -- Constructor validation --

    #[test]
    fn gaussian_rejects_negative_std() {
        assert!(NoiseModel::gaussian(0.0, -1.0).is_err());
    }

    #[test]
    fn gaussian_rejects_nan_std() {
        assert!(NoiseModel::gaussian(0.0, f32::NAN).is_err());
    }

    #[test]
    fn gaussian_rejects_inf_std() {
        assert!(NoiseModel::gaussian(0.0, f32::INFINITY).is_err());
    }

    #[test]
    fn gaussian_rejects_nan_mean() {
        assert!(NoiseModel::gaussian(f32::NAN, 1.0).is_err());
    }

    #[test]
    fn gaussian_accepts_zero_std() {
        assert!(NoiseModel::gaussian(1.0, 0.0).is_ok());
    }

    #[test]
    fn uniform_rejects_low_gte_high() {
        assert!(NoiseModel::uniform(1.0, 1.0).is_err());
        assert!(NoiseModel::uniform(2.0, 1.0).is_err());
    }

    #[test]
    fn uniform_rejects_nan_bounds() {
        assert!(NoiseModel::uniform(f32::NAN, 1.0).is_err());
        assert!(NoiseModel::uniform(0.0, f32::NAN).is_err());
    }

    #[test]
    fn uniform_symmetric_bounds() {
        let m = NoiseModel::uniform_symmetric(0.5).unwrap();
        if let NoiseModel::Uniform { low, high } = m {
            assert!((low - (-0.5)).abs() < f32::EPSILON);
            assert!((high - 0.5).abs() < f32::EPSILON);
        } else {
            panic!("expected Uniform");
        }
    }

    #[test]
    fn quantization_rejects_zero_step() {
        assert!(NoiseModel::quantization(0.0).is_err());
    }

    #[test]
    fn quantization_rejects_negative_step() {
        assert!(NoiseModel::quantization(-0.1).is_err());
    }

    // -- Determinism --

    #[test]
    fn gaussian_is_deterministic_with_same_seed() {
        let samples_a: Vec<f32> = {
            let mut rng = test_rng();
            let m = NoiseModel::gaussian_zero_mean(1.0).unwrap();
            (0..100).map(|_| m.sample(&mut rng)).collect()
        };
        let samples_b: Vec<f32> = {
            let mut rng = test_rng();
            let m = NoiseModel::gaussian_zero_mean(1.0).unwrap();
            (0..100).map(|_| m.sample(&mut rng)).collect()
        };
        assert_eq!(samples_a, samples_b);
    }

    // -- Sampling behavior --

    #[test]
    fn gaussian_zero_std_returns_mean() {
        let mut rng = test_rng();
        let m = NoiseModel::gaussian(5.0, 0.0).unwrap();
        for _ in 0..10 {
            assert!((m.sample(&mut rng) - 5.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn uniform_samples_within_range() {
        let mut rng = test_rng();
        let m = NoiseModel::uniform(-1.0, 1.0).unwrap();
        for _ in 0..1000 {
            let s = m.sample(&mut rng);
            assert!((-1.0..1.0).contains(&s), "sample {s} out of range");
        }
    }

    #[test]
    fn quantization_sample_returns_zero() {
        let mut rng = test_rng();
        let m = NoiseModel::quantization(0.1).unwrap();
        assert!((m.sample(&mut rng)).abs() < f32::EPSILON);
    }

    #[test]
    fn quantization_apply_rounds_correctly() {
        let mut rng = test_rng();
        let m = NoiseModel::quantization(0.1).unwrap();
        assert!((m.apply(0.15, &mut rng) - 0.2).abs() < 1e-6);
        assert!((m.apply(0.14, &mut rng) - 0.1).abs() < 1e-6);
        // round() halves go away from zero: -3.5 steps becomes -4 steps
        assert!((m.apply(-0.35, &mut rng) - (-0.4)).abs() < 1e-6);
    }

    #[test]
    fn chain_applies_in_sequence() {
        let mut rng = test_rng();
        // Offset by exactly 0.06 (zero-std gaussian), then quantize to 0.1
        let chain = NoiseModel::chain(vec![
            NoiseModel::gaussian(0.06, 0.0).unwrap(),
            NoiseModel::quantization(0.1).unwrap(),
        ]);
        assert!((chain.apply(0.0, &mut rng) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn chain_sample_sums_children() {
        let mut rng = test_rng();
        let chain = NoiseModel::chain(vec![
            NoiseModel::gaussian(1.0, 0.0).unwrap(),
            NoiseModel::gaussian(2.0, 0.0).unwrap(),
        ]);
        assert!((chain.sample(&mut rng) - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn apply_slice_perturbs_each_element() {
        let mut rng = test_rng();
        let m = NoiseModel::uniform(0.1, 0.2).unwrap();
        let mut values = [0.0_f32; 8];
        m.apply_slice(&mut values, &mut rng);
        for v in values {
            assert!(v >= 0.1 && v < 0.2, "got {v}");
        }
    }

    #[test]
    fn apply_slice_draws_independent_samples() {
        let mut rng = test_rng();
        let m = NoiseModel::uniform(-1.0, 1.0).unwrap();
        let mut values = [0.0_f32; 4];
        m.apply_slice(&mut values, &mut rng);
        // With a wide range, four identical samples are practically impossible
        assert!(values.windows(2).any(|w| (w[0] - w[1]).abs() > f32::EPSILON));
    }

    // -- Error display --

    #[test]
    fn noise_error_display_messages() {
        assert_eq!(
            NoiseError::InvalidStdDev { value: -1.0 }.to_string(),
            "std_dev must be finite and >= 0, got -1"
        );
        assert_eq!(
            NoiseError::InvalidRange {
                low: 1.0,
                high: 0.0
            }
            .to_string(),
            "range must satisfy low < high with finite bounds, got [1, 0)"
        );
        assert_eq!(
            NoiseError::InvalidStep { step: -0.5 }.to_string(),
            "quantization step must be finite and > 0, got -0.5"
        );
    }

    // -- Send + Sync --

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn noise_model_is_send_sync() {
        assert_send_sync::<NoiseModel>();
        assert_send_sync::<NoiseError>();
    }
}
