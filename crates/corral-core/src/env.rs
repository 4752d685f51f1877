//! Environment handle consumed by the manager engine.
//!
//! [`SimEnv`] wraps the scene/object-state accessor (a Bevy ECS [`World`])
//! together with the environment-instance count and a compute [`Device`]
//! identifier. Managers pull per-environment state out of the world; event
//! terms mutate it in place.

use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// Compute device/context identifier for the numeric runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(index) => write!(f, "cuda:{index}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SimEnv
// ---------------------------------------------------------------------------

/// Handle to the simulated environment batch.
///
/// One `SimEnv` represents N parallel environment replicas sharing a single
/// scene. Per-replica state lives in world resources/components as batched
/// buffers with one row per environment instance.
///
/// # Example
///
/// ```
/// use corral_core::env::{Device, SimEnv};
///
/// let env = SimEnv::new(8).with_device(Device::Cuda(0));
/// assert_eq!(env.num_envs(), 8);
/// assert_eq!(env.device().to_string(), "cuda:0");
/// ```
pub struct SimEnv {
    world: World,
    num_envs: usize,
    device: Device,
}

impl SimEnv {
    /// Create a handle for `num_envs` parallel environment instances.
    ///
    /// # Panics
    ///
    /// Panics if `num_envs` is zero.
    #[must_use]
    pub fn new(num_envs: usize) -> Self {
        assert!(num_envs > 0, "need at least one environment");
        Self {
            world: World::new(),
            num_envs,
            device: Device::Cpu,
        }
    }

    /// Builder: set the compute device identifier.
    #[must_use]
    pub const fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Number of parallel environment instances.
    #[must_use]
    pub const fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Compute device identifier.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// Scene/object-state accessor (read).
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Scene/object-state accessor (write).
    pub const fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Clone, Debug, PartialEq)]
    struct RootHeights(Vec<f32>);

    #[test]
    fn new_sets_count_and_default_device() {
        let env = SimEnv::new(4);
        assert_eq!(env.num_envs(), 4);
        assert_eq!(env.device(), Device::Cpu);
    }

    #[test]
    #[should_panic(expected = "need at least one environment")]
    fn zero_envs_panics() {
        let _ = SimEnv::new(0);
    }

    #[test]
    fn with_device_builder() {
        let env = SimEnv::new(2).with_device(Device::Cuda(1));
        assert_eq!(env.device(), Device::Cuda(1));
    }

    #[test]
    fn world_holds_batched_state() {
        let mut env = SimEnv::new(3);
        env.world_mut().insert_resource(RootHeights(vec![0.5; 3]));
        let heights = env.world().resource::<RootHeights>();
        assert_eq!(heights.0.len(), 3);
    }

    #[test]
    fn device_display() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda(0).to_string(), "cuda:0");
        assert_eq!(Device::Cuda(3).to_string(), "cuda:3");
    }

    #[test]
    fn device_serialize_roundtrip() {
        let device = Device::Cuda(2);
        let json = serde_json::to_string(&device).unwrap();
        let device2: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(device, device2);
    }
}
