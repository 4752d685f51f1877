//! Term resolution: from descriptor to executable binding.
//!
//! Resolution happens once, at manager preparation time: registered string
//! keys are looked up in the [`TermRegistry`], the descriptor's parameter
//! mapping is checked against the definition's declared signature, and
//! stateful factories are instantiated. Everything a term can get wrong in
//! its configuration surfaces here as a [`ConfigError`], never at call time.

use std::fmt;

use corral_core::batch::Batch;
use corral_core::env::SimEnv;
use corral_core::error::ConfigError;
use corral_core::subset::EnvIds;

use crate::params::TermParams;
use crate::registry::TermRegistry;
use crate::term::{
    CurriculumFn, CurriculumFunc, EventFunc, EventTermFunc, EventTermState, ObservationFunc,
    ObservationTermFunc, ObservationTermState, RewardFn, RewardFunc, TerminationFn,
    TerminationFunc,
};

// ---------------------------------------------------------------------------
// Observation binding
// ---------------------------------------------------------------------------

/// Resolved observation callable: a shared function or a live stateful
/// instance. The manager holds one binding per term and dispatches through
/// it uniformly.
pub(crate) enum ObservationBinding {
    Func(crate::term::ObservationFn),
    Stateful(Box<dyn ObservationTermState>),
}

impl fmt::Debug for ObservationBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(_) => f.write_str("ObservationBinding::Func"),
            Self::Stateful(_) => f.write_str("ObservationBinding::Stateful"),
        }
    }
}

impl ObservationBinding {
    pub(crate) fn invoke(&mut self, env: &SimEnv, params: &TermParams) -> Batch {
        match self {
            Self::Func(f) => f(env, params),
            Self::Stateful(state) => state.invoke(env, params),
        }
    }

    pub(crate) fn reset(&mut self, env_ids: &EnvIds) {
        if let Self::Stateful(state) = self {
            state.reset(env_ids);
        }
    }
}

/// Resolve an observation term descriptor into a binding.
pub(crate) fn resolve_observation(
    name: &str,
    func: &ObservationFunc,
    params: &TermParams,
    registry: &TermRegistry,
    env: &SimEnv,
) -> Result<ObservationBinding, ConfigError> {
    let def = match func {
        ObservationFunc::Def(def) => def.clone(),
        ObservationFunc::Registered(key) => registry.observation(key)?.clone(),
    };
    def.signature().validate(name, params)?;
    Ok(match def.func() {
        ObservationTermFunc::Func(f) => ObservationBinding::Func(f.clone()),
        ObservationTermFunc::Factory(factory) => {
            ObservationBinding::Stateful(factory(params, env))
        }
    })
}

// ---------------------------------------------------------------------------
// Event binding
// ---------------------------------------------------------------------------

/// Resolved event callable.
pub(crate) enum EventBinding {
    Func(crate::term::EventFn),
    Stateful(Box<dyn EventTermState>),
}

impl EventBinding {
    pub(crate) fn invoke(&mut self, env: &mut SimEnv, env_ids: &EnvIds, params: &TermParams) {
        match self {
            Self::Func(f) => f(env, env_ids, params),
            Self::Stateful(state) => state.invoke(env, env_ids, params),
        }
    }

    pub(crate) fn reset(&mut self, env_ids: &EnvIds) {
        if let Self::Stateful(state) = self {
            state.reset(env_ids);
        }
    }
}

/// Resolve an event term descriptor into a binding.
pub(crate) fn resolve_event(
    name: &str,
    func: &EventFunc,
    params: &TermParams,
    registry: &TermRegistry,
    env: &SimEnv,
) -> Result<EventBinding, ConfigError> {
    let def = match func {
        EventFunc::Def(def) => def.clone(),
        EventFunc::Registered(key) => registry.event(key)?.clone(),
    };
    def.signature().validate(name, params)?;
    Ok(match def.func() {
        EventTermFunc::Func(f) => EventBinding::Func(f.clone()),
        EventTermFunc::Factory(factory) => EventBinding::Stateful(factory(params, env)),
    })
}

// ---------------------------------------------------------------------------
// Function-only kinds
// ---------------------------------------------------------------------------

/// Resolve a reward term descriptor into its function.
pub(crate) fn resolve_reward(
    name: &str,
    func: &RewardFunc,
    params: &TermParams,
    registry: &TermRegistry,
) -> Result<RewardFn, ConfigError> {
    let def = match func {
        RewardFunc::Def(def) => def.clone(),
        RewardFunc::Registered(key) => registry.reward(key)?.clone(),
    };
    def.signature().validate(name, params)?;
    Ok(def.func().clone())
}

/// Resolve a termination term descriptor into its function.
pub(crate) fn resolve_termination(
    name: &str,
    func: &TerminationFunc,
    params: &TermParams,
    registry: &TermRegistry,
) -> Result<TerminationFn, ConfigError> {
    let def = match func {
        TerminationFunc::Def(def) => def.clone(),
        TerminationFunc::Registered(key) => registry.termination(key)?.clone(),
    };
    def.signature().validate(name, params)?;
    Ok(def.func().clone())
}

/// Resolve a curriculum term descriptor into its function.
pub(crate) fn resolve_curriculum(
    name: &str,
    func: &CurriculumFunc,
    params: &TermParams,
    registry: &TermRegistry,
) -> Result<CurriculumFn, ConfigError> {
    let def = match func {
        CurriculumFunc::Def(def) => def.clone(),
        CurriculumFunc::Registered(key) => registry.curriculum(key)?.clone(),
    };
    def.signature().validate(name, params)?;
    Ok(def.func().clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{EventTermDef, ObservationTermDef};

    fn ones_def() -> ObservationTermDef {
        ObservationTermDef::function(|env, _| Batch::splat(env.num_envs(), 2, 1.0))
            .with_required(&["gain"])
    }

    #[test]
    fn inline_def_resolves_and_invokes() {
        let env = SimEnv::new(3);
        let params = TermParams::new().with("gain", 2.0_f32);
        let registry = TermRegistry::new();
        let mut binding = resolve_observation(
            "ones",
            &ObservationFunc::Def(ones_def()),
            &params,
            &registry,
            &env,
        )
        .unwrap();
        let batch = binding.invoke(&env, &params);
        assert_eq!(batch.shape(), &[3, 2]);
    }

    #[test]
    fn registered_key_resolves() {
        let env = SimEnv::new(2);
        let mut registry = TermRegistry::new();
        registry.register_observation("ones", ones_def()).unwrap();
        let params = TermParams::new().with("gain", 1.0_f32);
        let binding = resolve_observation(
            "my_term",
            &ObservationFunc::Registered("ones".into()),
            &params,
            &registry,
            &env,
        );
        assert!(binding.is_ok());
    }

    #[test]
    fn unregistered_key_fails() {
        let env = SimEnv::new(2);
        let registry = TermRegistry::new();
        let err = resolve_observation(
            "my_term",
            &ObservationFunc::Registered("missing".into()),
            &TermParams::new(),
            &registry,
            &env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnregisteredFunc { .. }));
    }

    #[test]
    fn missing_required_param_fails() {
        let env = SimEnv::new(2);
        let registry = TermRegistry::new();
        let err = resolve_observation(
            "ones",
            &ObservationFunc::Def(ones_def()),
            &TermParams::new(),
            &registry,
            &env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingParam { .. }));
    }

    #[test]
    fn unknown_param_fails() {
        let env = SimEnv::new(2);
        let registry = TermRegistry::new();
        let params = TermParams::new().with("gain", 1.0_f32).with("extra", true);
        let err = resolve_observation(
            "ones",
            &ObservationFunc::Def(ones_def()),
            &params,
            &registry,
            &env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParam { .. }));
    }

    #[test]
    fn stateful_factory_instantiated_once() {
        struct Counter {
            calls: Vec<f32>,
        }
        impl ObservationTermState for Counter {
            fn invoke(&mut self, _env: &SimEnv, _params: &TermParams) -> Batch {
                for c in &mut self.calls {
                    *c += 1.0;
                }
                Batch::from_rows(self.calls.len(), 1, self.calls.clone())
            }
            fn reset(&mut self, env_ids: &EnvIds) {
                for i in env_ids.indices(self.calls.len()) {
                    self.calls[i] = 0.0;
                }
            }
        }

        let env = SimEnv::new(2);
        let def = ObservationTermDef::stateful(|_, env| {
            Box::new(Counter {
                calls: vec![0.0; env.num_envs()],
            })
        });
        let registry = TermRegistry::new();
        let mut binding = resolve_observation(
            "counter",
            &ObservationFunc::Def(def),
            &TermParams::new(),
            &registry,
            &env,
        )
        .unwrap();

        let first = binding.invoke(&env, &TermParams::new());
        let second = binding.invoke(&env, &TermParams::new());
        assert_eq!(first.row(0), &[1.0]);
        assert_eq!(second.row(0), &[2.0]);

        binding.reset(&EnvIds::from(vec![0]));
        let third = binding.invoke(&env, &TermParams::new());
        assert_eq!(third.row(0), &[1.0]);
        assert_eq!(third.row(1), &[3.0]);
    }

    #[test]
    fn stateless_binding_reset_is_noop() {
        let env = SimEnv::new(2);
        let registry = TermRegistry::new();
        let params = TermParams::new().with("gain", 1.0_f32);
        let mut binding = resolve_observation(
            "ones",
            &ObservationFunc::Def(ones_def()),
            &params,
            &registry,
            &env,
        )
        .unwrap();
        binding.reset(&EnvIds::All); // nothing to reset
        let batch = binding.invoke(&env, &params);
        assert_eq!(batch.row(0), &[1.0, 1.0]);
    }

    #[test]
    fn event_binding_invokes() {
        use bevy::prelude::*;

        #[derive(Resource, Default)]
        struct PushCount(u32);

        let mut env = SimEnv::new(2);
        env.world_mut().init_resource::<PushCount>();

        let def = EventTermDef::function(|env, _ids, _params| {
            env.world_mut().resource_mut::<PushCount>().0 += 1;
        });
        let registry = TermRegistry::new();
        let mut binding = resolve_event(
            "push",
            &EventFunc::Def(def),
            &TermParams::new(),
            &registry,
            &env,
        )
        .unwrap();
        binding.invoke(&mut env, &EnvIds::All, &TermParams::new());
        assert_eq!(env.world().resource::<PushCount>().0, 1);
    }

    #[test]
    fn reward_and_termination_resolution() {
        let registry = TermRegistry::new();
        let reward = resolve_reward(
            "alive",
            &RewardFunc::Def(crate::term::RewardTermDef::function(|env, _| {
                vec![1.0; env.num_envs()]
            })),
            &TermParams::new(),
            &registry,
        );
        assert!(reward.is_ok());

        let termination = resolve_termination(
            "fell",
            &TerminationFunc::Def(crate::term::TerminationTermDef::function(|env, _| {
                vec![false; env.num_envs()]
            })),
            &TermParams::new(),
            &registry,
        );
        assert!(termination.is_ok());

        let curriculum = resolve_curriculum(
            "terrain_level",
            &CurriculumFunc::Def(crate::term::CurriculumTermDef::function(|_, _, _| None)),
            &TermParams::new(),
            &registry,
        );
        assert!(curriculum.is_ok());
    }
}
