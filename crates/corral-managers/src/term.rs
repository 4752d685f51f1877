//! Term callables: function types, stateful-term traits, and definitions.
//!
//! Every manager kind has a fixed calling convention: the environment handle
//! first, then either the environment-index subset or the kind's extra
//! arguments, then the validated parameter mapping. A term definition
//! couples a callable with its declared [`TermSignature`]; descriptors
//! reference definitions either inline or by registered string key.
//!
//! Stateful terms (callables carrying per-environment state such as elapsed
//! time) are expressed as trait objects built once by a factory at manager
//! preparation time; the manager routes selective resets to the instance
//! for the rest of its lifetime.

use std::fmt;
use std::sync::Arc;

use corral_core::batch::Batch;
use corral_core::env::SimEnv;
use corral_core::subset::EnvIds;

use crate::params::{TermParams, TermSignature};

// ---------------------------------------------------------------------------
// Function types
// ---------------------------------------------------------------------------

/// Stateless observation term: reads the environment, returns one batch.
pub type ObservationFn = Arc<dyn Fn(&SimEnv, &TermParams) -> Batch + Send + Sync>;

/// Stateless event term: mutates the environment for the given subset.
pub type EventFn = Arc<dyn Fn(&mut SimEnv, &EnvIds, &TermParams) + Send + Sync>;

/// Reward term: one value per environment instance.
pub type RewardFn = Arc<dyn Fn(&SimEnv, &TermParams) -> Vec<f32> + Send + Sync>;

/// Termination term: one flag per environment instance.
pub type TerminationFn = Arc<dyn Fn(&SimEnv, &TermParams) -> Vec<bool> + Send + Sync>;

/// Curriculum term: mutates difficulty state at reset points, optionally
/// reporting a scalar state value for telemetry.
pub type CurriculumFn =
    Arc<dyn Fn(&mut SimEnv, &EnvIds, &TermParams) -> Option<f32> + Send + Sync>;

// ---------------------------------------------------------------------------
// Stateful term traits
// ---------------------------------------------------------------------------

/// An observation term carrying per-environment state.
pub trait ObservationTermState: Send + Sync {
    /// Compute this term's batch, updating internal state.
    fn invoke(&mut self, env: &SimEnv, params: &TermParams) -> Batch;

    /// Reset internal state for the selected environments only.
    fn reset(&mut self, env_ids: &EnvIds);
}

/// An event term carrying per-environment state.
pub trait EventTermState: Send + Sync {
    /// Apply this term's side effects for the selected environments.
    fn invoke(&mut self, env: &mut SimEnv, env_ids: &EnvIds, params: &TermParams);

    /// Reset internal state for the selected environments only.
    fn reset(&mut self, env_ids: &EnvIds);
}

/// Builds a stateful observation term instance at preparation time.
pub type ObservationStateFactory =
    Arc<dyn Fn(&TermParams, &SimEnv) -> Box<dyn ObservationTermState> + Send + Sync>;

/// Builds a stateful event term instance at preparation time.
pub type EventStateFactory =
    Arc<dyn Fn(&TermParams, &SimEnv) -> Box<dyn EventTermState> + Send + Sync>;

// ---------------------------------------------------------------------------
// Observation term definition
// ---------------------------------------------------------------------------

/// The callable behind an observation term: a shared function, or a factory
/// producing a stateful instance.
#[derive(Clone)]
pub enum ObservationTermFunc {
    Func(ObservationFn),
    Factory(ObservationStateFactory),
}

/// An observation callable plus its declared signature.
#[derive(Clone)]
pub struct ObservationTermDef {
    func: ObservationTermFunc,
    signature: TermSignature,
}

impl ObservationTermDef {
    /// Define a stateless observation term.
    pub fn function(
        f: impl Fn(&SimEnv, &TermParams) -> Batch + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: ObservationTermFunc::Func(Arc::new(f)),
            signature: TermSignature::new(),
        }
    }

    /// Define a stateful observation term via its factory.
    pub fn stateful(
        factory: impl Fn(&TermParams, &SimEnv) -> Box<dyn ObservationTermState>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            func: ObservationTermFunc::Factory(Arc::new(factory)),
            signature: TermSignature::new(),
        }
    }

    /// Builder: declare required parameter keys.
    #[must_use]
    pub fn with_required(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_required(keys);
        self
    }

    /// Builder: declare optional parameter keys.
    #[must_use]
    pub fn with_optional(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_optional(keys);
        self
    }

    /// The callable variant.
    #[must_use]
    pub const fn func(&self) -> &ObservationTermFunc {
        &self.func
    }

    /// The declared signature.
    #[must_use]
    pub const fn signature(&self) -> &TermSignature {
        &self.signature
    }
}

impl fmt::Debug for ObservationTermDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationTermDef")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Reference to an observation term callable: inline or registered by key.
#[derive(Clone)]
pub enum ObservationFunc {
    Def(ObservationTermDef),
    Registered(String),
}

impl From<ObservationTermDef> for ObservationFunc {
    fn from(def: ObservationTermDef) -> Self {
        Self::Def(def)
    }
}

impl From<&str> for ObservationFunc {
    fn from(key: &str) -> Self {
        Self::Registered(key.to_string())
    }
}

impl From<String> for ObservationFunc {
    fn from(key: String) -> Self {
        Self::Registered(key)
    }
}

// ---------------------------------------------------------------------------
// Event term definition
// ---------------------------------------------------------------------------

/// The callable behind an event term.
#[derive(Clone)]
pub enum EventTermFunc {
    Func(EventFn),
    Factory(EventStateFactory),
}

/// An event callable plus its declared signature.
#[derive(Clone)]
pub struct EventTermDef {
    func: EventTermFunc,
    signature: TermSignature,
}

impl EventTermDef {
    /// Define a stateless event term.
    pub fn function(
        f: impl Fn(&mut SimEnv, &EnvIds, &TermParams) + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: EventTermFunc::Func(Arc::new(f)),
            signature: TermSignature::new(),
        }
    }

    /// Define a stateful event term via its factory.
    pub fn stateful(
        factory: impl Fn(&TermParams, &SimEnv) -> Box<dyn EventTermState> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: EventTermFunc::Factory(Arc::new(factory)),
            signature: TermSignature::new(),
        }
    }

    /// Builder: declare required parameter keys.
    #[must_use]
    pub fn with_required(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_required(keys);
        self
    }

    /// Builder: declare optional parameter keys.
    #[must_use]
    pub fn with_optional(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_optional(keys);
        self
    }

    /// The callable variant.
    #[must_use]
    pub const fn func(&self) -> &EventTermFunc {
        &self.func
    }

    /// The declared signature.
    #[must_use]
    pub const fn signature(&self) -> &TermSignature {
        &self.signature
    }
}

/// Reference to an event term callable: inline or registered by key.
#[derive(Clone)]
pub enum EventFunc {
    Def(EventTermDef),
    Registered(String),
}

impl From<EventTermDef> for EventFunc {
    fn from(def: EventTermDef) -> Self {
        Self::Def(def)
    }
}

impl From<&str> for EventFunc {
    fn from(key: &str) -> Self {
        Self::Registered(key.to_string())
    }
}

impl From<String> for EventFunc {
    fn from(key: String) -> Self {
        Self::Registered(key)
    }
}

// ---------------------------------------------------------------------------
// Reward / termination / curriculum definitions
// ---------------------------------------------------------------------------
//
// These kinds hold their per-episode state in the manager's own buffers, so
// their callables are plain functions.

/// A reward callable plus its declared signature.
#[derive(Clone)]
pub struct RewardTermDef {
    func: RewardFn,
    signature: TermSignature,
}

impl RewardTermDef {
    /// Define a reward term.
    pub fn function(
        f: impl Fn(&SimEnv, &TermParams) -> Vec<f32> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Arc::new(f),
            signature: TermSignature::new(),
        }
    }

    /// Builder: declare required parameter keys.
    #[must_use]
    pub fn with_required(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_required(keys);
        self
    }

    /// Builder: declare optional parameter keys.
    #[must_use]
    pub fn with_optional(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_optional(keys);
        self
    }

    /// The callable.
    #[must_use]
    pub const fn func(&self) -> &RewardFn {
        &self.func
    }

    /// The declared signature.
    #[must_use]
    pub const fn signature(&self) -> &TermSignature {
        &self.signature
    }
}

/// Reference to a reward term callable: inline or registered by key.
#[derive(Clone)]
pub enum RewardFunc {
    Def(RewardTermDef),
    Registered(String),
}

impl From<RewardTermDef> for RewardFunc {
    fn from(def: RewardTermDef) -> Self {
        Self::Def(def)
    }
}

impl From<&str> for RewardFunc {
    fn from(key: &str) -> Self {
        Self::Registered(key.to_string())
    }
}

impl From<String> for RewardFunc {
    fn from(key: String) -> Self {
        Self::Registered(key)
    }
}

/// A termination callable plus its declared signature.
#[derive(Clone)]
pub struct TerminationTermDef {
    func: TerminationFn,
    signature: TermSignature,
}

impl TerminationTermDef {
    /// Define a termination term.
    pub fn function(
        f: impl Fn(&SimEnv, &TermParams) -> Vec<bool> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Arc::new(f),
            signature: TermSignature::new(),
        }
    }

    /// Builder: declare required parameter keys.
    #[must_use]
    pub fn with_required(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_required(keys);
        self
    }

    /// Builder: declare optional parameter keys.
    #[must_use]
    pub fn with_optional(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_optional(keys);
        self
    }

    /// The callable.
    #[must_use]
    pub const fn func(&self) -> &TerminationFn {
        &self.func
    }

    /// The declared signature.
    #[must_use]
    pub const fn signature(&self) -> &TermSignature {
        &self.signature
    }
}

/// Reference to a termination term callable: inline or registered by key.
#[derive(Clone)]
pub enum TerminationFunc {
    Def(TerminationTermDef),
    Registered(String),
}

impl From<TerminationTermDef> for TerminationFunc {
    fn from(def: TerminationTermDef) -> Self {
        Self::Def(def)
    }
}

impl From<&str> for TerminationFunc {
    fn from(key: &str) -> Self {
        Self::Registered(key.to_string())
    }
}

impl From<String> for TerminationFunc {
    fn from(key: String) -> Self {
        Self::Registered(key)
    }
}

/// A curriculum callable plus its declared signature.
#[derive(Clone)]
pub struct CurriculumTermDef {
    func: CurriculumFn,
    signature: TermSignature,
}

impl CurriculumTermDef {
    /// Define a curriculum term.
    pub fn function(
        f: impl Fn(&mut SimEnv, &EnvIds, &TermParams) -> Option<f32> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Arc::new(f),
            signature: TermSignature::new(),
        }
    }

    /// Builder: declare required parameter keys.
    #[must_use]
    pub fn with_required(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_required(keys);
        self
    }

    /// Builder: declare optional parameter keys.
    #[must_use]
    pub fn with_optional(mut self, keys: &[&str]) -> Self {
        self.signature = self.signature.with_optional(keys);
        self
    }

    /// The callable.
    #[must_use]
    pub const fn func(&self) -> &CurriculumFn {
        &self.func
    }

    /// The declared signature.
    #[must_use]
    pub const fn signature(&self) -> &TermSignature {
        &self.signature
    }
}

/// Reference to a curriculum term callable: inline or registered by key.
#[derive(Clone)]
pub enum CurriculumFunc {
    Def(CurriculumTermDef),
    Registered(String),
}

impl From<CurriculumTermDef> for CurriculumFunc {
    fn from(def: CurriculumTermDef) -> Self {
        Self::Def(def)
    }
}

impl From<&str> for CurriculumFunc {
    fn from(key: &str) -> Self {
        Self::Registered(key.to_string())
    }
}

impl From<String> for CurriculumFunc {
    fn from(key: String) -> Self {
        Self::Registered(key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
