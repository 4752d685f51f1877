//! Scalar noise models for observation corruption.
//!
//! Observation terms may carry a [`NoiseModel`]; the observation manager
//! samples it element-wise when a group enables corruption. Sampling always
//! goes through a caller-supplied `Rng`, so corrupted observations are
//! reproducible from the manager's seed.

pub mod model;

pub use model::{NoiseError, NoiseModel};
