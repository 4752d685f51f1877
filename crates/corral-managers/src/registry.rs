//! String-key registry for term callables.
//!
//! Cross-module terms are referenced by stable string keys. The registry is
//! populated once at process startup; resolution of an unknown key fails
//! fast with [`ConfigError::UnregisteredFunc`] rather than any reflective
//! lookup.

use std::collections::HashMap;

use corral_core::error::ConfigError;

use crate::term::{
    CurriculumTermDef, EventTermDef, ObservationTermDef, RewardTermDef, TerminationTermDef,
};

// ---------------------------------------------------------------------------
// TermRegistry
// ---------------------------------------------------------------------------

/// Per-kind tables mapping stable string keys to term definitions.
///
/// # Example
///
/// ```
/// use corral_core::batch::Batch;
/// use corral_managers::registry::TermRegistry;
/// use corral_managers::term::ObservationTermDef;
///
/// let mut registry = TermRegistry::new();
/// registry
///     .register_observation(
///         "ones",
///         ObservationTermDef::function(|env, _| Batch::splat(env.num_envs(), 4, 1.0)),
///     )
///     .unwrap();
/// assert!(registry.observation("ones").is_ok());
/// assert!(registry.observation("missing").is_err());
/// ```
#[derive(Default)]
pub struct TermRegistry {
    observation: HashMap<String, ObservationTermDef>,
    event: HashMap<String, EventTermDef>,
    reward: HashMap<String, RewardTermDef>,
    termination: HashMap<String, TerminationTermDef>,
    curriculum: HashMap<String, CurriculumTermDef>,
}

impl TermRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observation term definition under `key`.
    pub fn register_observation(
        &mut self,
        key: impl Into<String>,
        def: ObservationTermDef,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        if self.observation.contains_key(&key) {
            return Err(ConfigError::DuplicateRegistration {
                kind: "observation",
                key,
            });
        }
        self.observation.insert(key, def);
        Ok(())
    }

    /// Register an event term definition under `key`.
    pub fn register_event(
        &mut self,
        key: impl Into<String>,
        def: EventTermDef,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        if self.event.contains_key(&key) {
            return Err(ConfigError::DuplicateRegistration { kind: "event", key });
        }
        self.event.insert(key, def);
        Ok(())
    }

    /// Register a reward term definition under `key`.
    pub fn register_reward(
        &mut self,
        key: impl Into<String>,
        def: RewardTermDef,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        if self.reward.contains_key(&key) {
            return Err(ConfigError::DuplicateRegistration {
                kind: "reward",
                key,
            });
        }
        self.reward.insert(key, def);
        Ok(())
    }

    /// Register a termination term definition under `key`.
    pub fn register_termination(
        &mut self,
        key: impl Into<String>,
        def: TerminationTermDef,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        if self.termination.contains_key(&key) {
            return Err(ConfigError::DuplicateRegistration {
                kind: "termination",
                key,
            });
        }
        self.termination.insert(key, def);
        Ok(())
    }

    /// Register a curriculum term definition under `key`.
    pub fn register_curriculum(
        &mut self,
        key: impl Into<String>,
        def: CurriculumTermDef,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        if self.curriculum.contains_key(&key) {
            return Err(ConfigError::DuplicateRegistration {
                kind: "curriculum",
                key,
            });
        }
        self.curriculum.insert(key, def);
        Ok(())
    }

    /// Look up an observation term definition.
    pub fn observation(&self, key: &str) -> Result<&ObservationTermDef, ConfigError> {
        self.observation
            .get(key)
            .ok_or_else(|| ConfigError::UnregisteredFunc {
                kind: "observation",
                key: key.to_string(),
            })
    }

    /// Look up an event term definition.
    pub fn event(&self, key: &str) -> Result<&EventTermDef, ConfigError> {
        self.event
            .get(key)
            .ok_or_else(|| ConfigError::UnregisteredFunc {
                kind: "event",
                key: key.to_string(),
            })
    }

    /// Look up a reward term definition.
    pub fn reward(&self, key: &str) -> Result<&RewardTermDef, ConfigError> {
        self.reward
            .get(key)
            .ok_or_else(|| ConfigError::UnregisteredFunc {
                kind: "reward",
                key: key.to_string(),
            })
    }

    /// Look up a termination term definition.
    pub fn termination(&self, key: &str) -> Result<&TerminationTermDef, ConfigError> {
        self.termination
            .get(key)
            .ok_or_else(|| ConfigError::UnregisteredFunc {
                kind: "termination",
                key: key.to_string(),
            })
    }

    /// Look up a curriculum term definition.
    pub fn curriculum(&self, key: &str) -> Result<&CurriculumTermDef, ConfigError> {
        self.curriculum
            .get(key)
            .ok_or_else(|| ConfigError::UnregisteredFunc {
                kind: "curriculum",
                key: key.to_string(),
            })
    }

    /// Total number of registered definitions across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observation.len()
            + self.event.len()
            + self.reward.len()
            + self.termination.len()
            + self.curriculum.len()
    }

    /// Whether the registry has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
