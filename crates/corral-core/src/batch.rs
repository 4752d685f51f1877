//! Batched per-environment tensors.
//!
//! [`Batch`] stores one row of data per environment instance in a single
//! flat `Vec<f32>` with an explicit shape whose leading axis is the
//! environment count: `[num_envs, d]` for vector observations,
//! `[num_envs, h, w, c]` for images.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Row-major batched tensor with shape `[num_envs, ...]`.
///
/// # Example
///
/// ```
/// use corral_core::batch::Batch;
///
/// let mut batch = Batch::from_rows(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// assert_eq!(batch.row(1), &[4.0, 5.0, 6.0]);
/// batch.scale(2.0);
/// assert_eq!(batch.row(0), &[2.0, 4.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl Batch {
    /// Create a zeroed batch with the given shape (`shape[0]` = `num_envs`).
    ///
    /// # Panics
    ///
    /// Panics if `shape` is empty.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        assert!(!shape.is_empty(), "batch shape must have a leading axis");
        Self {
            data: vec![0.0; shape.iter().product()],
            shape: shape.to_vec(),
        }
    }

    /// Create a `[num_envs, width]` batch filled with `value`.
    #[must_use]
    pub fn splat(num_envs: usize, width: usize, value: f32) -> Self {
        Self {
            data: vec![value; num_envs * width],
            shape: vec![num_envs, width],
        }
    }

    /// Create a `[num_envs, width]` batch from flat row-major data.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != num_envs * width`.
    #[must_use]
    pub fn from_rows(num_envs: usize, width: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            num_envs * width,
            "batch data length mismatch: expected {}, got {}",
            num_envs * width,
            data.len()
        );
        Self {
            data,
            shape: vec![num_envs, width],
        }
    }

    /// Create a batch with an arbitrary shape from flat row-major data.
    ///
    /// # Panics
    ///
    /// Panics if `shape` is empty or `data.len()` does not match its product.
    #[must_use]
    pub fn from_shape(shape: &[usize], data: Vec<f32>) -> Self {
        assert!(!shape.is_empty(), "batch shape must have a leading axis");
        let expected: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "batch data length mismatch: expected {expected}, got {}",
            data.len()
        );
        Self {
            data,
            shape: shape.to_vec(),
        }
    }

    /// Full shape, leading axis first.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Leading (environment batch) dimension.
    #[must_use]
    pub fn num_envs(&self) -> usize {
        self.shape[0]
    }

    /// Size of the trailing axis.
    #[must_use]
    pub fn width(&self) -> usize {
        *self.shape.last().expect("shape is never empty")
    }

    /// Elements per environment (product of all non-leading axes).
    #[must_use]
    pub fn row_width(&self) -> usize {
        self.shape[1..].iter().product()
    }

    /// Raw flat buffer in row-major order.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw flat buffer.
    pub fn as_flat_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// All elements belonging to environment `env_idx`.
    ///
    /// # Panics
    ///
    /// Panics if `env_idx >= num_envs`.
    #[must_use]
    pub fn row(&self, env_idx: usize) -> &[f32] {
        assert!(env_idx < self.num_envs(), "env_idx out of bounds");
        let w = self.row_width();
        &self.data[env_idx * w..(env_idx + 1) * w]
    }

    /// Mutable view of environment `env_idx`'s elements.
    ///
    /// # Panics
    ///
    /// Panics if `env_idx >= num_envs`.
    pub fn row_mut(&mut self, env_idx: usize) -> &mut [f32] {
        assert!(env_idx < self.num_envs(), "env_idx out of bounds");
        let w = self.row_width();
        &mut self.data[env_idx * w..(env_idx + 1) * w]
    }

    /// Multiply every element by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// Clamp every element into `[min, max]`.
    pub fn clamp(&mut self, min: f32, max: f32) {
        for v in &mut self.data {
            *v = v.clamp(min, max);
        }
    }

    /// Whether this batch can participate in trailing-axis concatenation:
    /// exactly one free axis beyond the environment batch axis.
    #[must_use]
    pub fn is_concat_compatible(&self) -> bool {
        self.ndim() == 2
    }

    /// Concatenate 2-D batches along the trailing axis, in order.
    ///
    /// # Panics
    ///
    /// Panics if `parts` is empty, any part is not 2-D, or leading
    /// dimensions differ.
    #[must_use]
    pub fn concat_width(parts: &[Self]) -> Self {
        assert!(!parts.is_empty(), "cannot concatenate zero batches");
        let num_envs = parts[0].num_envs();
        for part in parts {
            assert!(part.is_concat_compatible(), "concat requires 2-D batches");
            assert_eq!(part.num_envs(), num_envs, "leading dimension mismatch");
        }
        let total_width: usize = parts.iter().map(Self::width).sum();
        let mut data = Vec::with_capacity(num_envs * total_width);
        for env_idx in 0..num_envs {
            for part in parts {
                data.extend_from_slice(part.row(env_idx));
            }
        }
        Self {
            data,
            shape: vec![num_envs, total_width],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
