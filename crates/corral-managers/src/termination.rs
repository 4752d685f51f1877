//! Termination manager: OR-composition of episode-ending conditions.
//!
//! Each term produces one flag per environment instance. Terms marked
//! `time_out` contribute to truncation (time limits); the rest contribute
//! to task termination (success/failure). The manager keeps per-term flags
//! so reset telemetry can attribute episode endings to their cause.

use std::fmt;

use corral_core::env::SimEnv;
use corral_core::error::{ConfigError, CorralError, TermNotFound};
use corral_core::subset::EnvIds;

use crate::manager::{Manager, ResetMetrics, TermTable};
use crate::params::TermParams;
use crate::registry::TermRegistry;
use crate::resolver::resolve_termination;
use crate::term::{TerminationFn, TerminationFunc};

// ---------------------------------------------------------------------------
// TerminationTermCfg
// ---------------------------------------------------------------------------

/// Descriptor for one termination term.
#[derive(Clone)]
pub struct TerminationTermCfg {
    func: TerminationFunc,
    time_out: bool,
    params: TermParams,
}

impl TerminationTermCfg {
    /// Create a descriptor for the given callable reference.
    pub fn new(func: impl Into<TerminationFunc>) -> Self {
        Self {
            func: func.into(),
            time_out: false,
            params: TermParams::new(),
        }
    }

    /// Builder: mark this term as a time limit (truncation) rather than a
    /// task termination.
    #[must_use]
    pub const fn with_time_out(mut self, time_out: bool) -> Self {
        self.time_out = time_out;
        self
    }

    /// Builder: set the parameter mapping.
    #[must_use]
    pub fn with_params(mut self, params: TermParams) -> Self {
        self.params = params;
        self
    }

    /// The callable reference.
    #[must_use]
    pub const fn func(&self) -> &TerminationFunc {
        &self.func
    }

    /// Whether this term signals a time limit.
    #[must_use]
    pub const fn time_out(&self) -> bool {
        self.time_out
    }

    /// The parameter mapping.
    #[must_use]
    pub const fn params(&self) -> &TermParams {
        &self.params
    }
}

impl fmt::Debug for TerminationTermCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationTermCfg")
            .field("time_out", &self.time_out)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Configuration of a termination manager: ordered named terms.
#[derive(Clone, Default)]
pub struct TerminationManagerCfg {
    terms: Vec<(String, Option<TerminationTermCfg>)>,
}

impl TerminationManagerCfg {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a term.
    #[must_use]
    pub fn term(mut self, name: impl Into<String>, cfg: TerminationTermCfg) -> Self {
        self.terms.push((name.into(), Some(cfg)));
        self
    }

    /// Builder: append a disabled term (skipped silently at preparation).
    #[must_use]
    pub fn disabled_term(mut self, name: impl Into<String>) -> Self {
        self.terms.push((name.into(), None));
        self
    }
}

// ---------------------------------------------------------------------------
// TerminationManager
// ---------------------------------------------------------------------------

struct PreparedTerm {
    name: String,
    cfg: TerminationTermCfg,
    func: TerminationFn,
    fired: Vec<bool>,
}

/// Evaluates termination terms and splits them into terminated/time-out.
pub struct TerminationManager {
    terms: Vec<PreparedTerm>,
    terminated: Vec<bool>,
    time_outs: Vec<bool>,
    dones: Vec<bool>,
    num_envs: usize,
}

impl TerminationManager {
    /// Prepare the manager from its configuration.
    pub fn new(
        cfg: TerminationManagerCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<Self, ConfigError> {
        let num_envs = env.num_envs();
        let mut terms: Vec<PreparedTerm> = Vec::new();
        for (name, term_cfg) in cfg.terms {
            let Some(term_cfg) = term_cfg else {
                continue; // disabled
            };
            if terms.iter().any(|t| t.name == name) {
                return Err(ConfigError::DuplicateTerm { name });
            }
            let func = resolve_termination(&name, &term_cfg.func, &term_cfg.params, registry)?;
            let probe = func(env, &term_cfg.params);
            if probe.len() != num_envs {
                return Err(ConfigError::BatchDimMismatch {
                    term: name,
                    expected: num_envs,
                    got: probe.len(),
                });
            }
            terms.push(PreparedTerm {
                name,
                cfg: term_cfg,
                func,
                fired: vec![false; num_envs],
            });
        }
        Ok(Self {
            terms,
            terminated: vec![false; num_envs],
            time_outs: vec![false; num_envs],
            dones: vec![false; num_envs],
            num_envs,
        })
    }

    /// Evaluate all terms against the current environment state.
    ///
    /// Returns the combined done flags (terminated OR time-out).
    ///
    /// # Panics
    ///
    /// Panics if `env` has a different environment count than the manager
    /// was prepared for.
    pub fn compute(&mut self, env: &SimEnv) -> &[bool] {
        assert_eq!(
            env.num_envs(),
            self.num_envs,
            "manager prepared for {} environments, got {}",
            self.num_envs,
            env.num_envs()
        );
        self.terminated.fill(false);
        self.time_outs.fill(false);
        for term in &mut self.terms {
            let values = (term.func)(env, &term.cfg.params);
            assert_eq!(
                values.len(),
                self.num_envs,
                "termination term '{}' returned {} flags for {} environments",
                term.name,
                values.len(),
                self.num_envs
            );
            let target = if term.cfg.time_out {
                &mut self.time_outs
            } else {
                &mut self.terminated
            };
            for (i, &flag) in values.iter().enumerate() {
                if flag {
                    target[i] = true;
                    term.fired[i] = true;
                }
            }
        }
        for i in 0..self.num_envs {
            self.dones[i] = self.terminated[i] || self.time_outs[i];
        }
        &self.dones
    }

    /// Active term names, in declaration order.
    #[must_use]
    pub fn active_terms(&self) -> Vec<&str> {
        self.terms.iter().map(|t| t.name.as_str()).collect()
    }

    /// Task-termination flags from the last `compute()`.
    #[must_use]
    pub fn terminated(&self) -> &[bool] {
        &self.terminated
    }

    /// Time-limit flags from the last `compute()`.
    #[must_use]
    pub fn time_outs(&self) -> &[bool] {
        &self.time_outs
    }

    /// Combined done flags from the last `compute()`.
    #[must_use]
    pub fn dones(&self) -> &[bool] {
        &self.dones
    }

    /// Per-environment flags recording whether `name` fired this episode.
    pub fn term_fired(&self, name: &str) -> Result<&[bool], TermNotFound> {
        self.terms
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.fired.as_slice())
            .ok_or_else(|| TermNotFound(name.to_string()))
    }

    /// Get a term's descriptor by name.
    pub fn get_term_cfg(&self, name: &str) -> Result<&TerminationTermCfg, TermNotFound> {
        self.terms
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.cfg)
            .ok_or_else(|| TermNotFound(name.to_string()))
    }

    /// Replace a term's descriptor by name, re-validating only that term.
    pub fn set_term_cfg(
        &mut self,
        name: &str,
        cfg: TerminationTermCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<(), CorralError> {
        let num_envs = self.num_envs;
        let Some(term) = self.terms.iter_mut().find(|t| t.name == name) else {
            return Err(TermNotFound(name.to_string()).into());
        };
        let func = resolve_termination(name, &cfg.func, &cfg.params, registry)?;
        let probe = func(env, &cfg.params);
        if probe.len() != num_envs {
            return Err(ConfigError::BatchDimMismatch {
                term: name.to_string(),
                expected: num_envs,
                got: probe.len(),
            }
            .into());
        }
        term.cfg = cfg;
        term.func = func;
        Ok(())
    }
}

impl Manager for TerminationManager {
    fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Report, per term, how many of the resetting environments it ended,
    /// then clear those episode flags.
    fn reset(&mut self, env_ids: &EnvIds) -> ResetMetrics {
        let indices = env_ids.indices(self.num_envs);
        let mut metrics = ResetMetrics::new();
        for term in &mut self.terms {
            let count = indices.iter().filter(|&&i| term.fired[i]).count();
            metrics.insert(format!("episode_termination/{}", term.name), count as f32);
            for &i in &indices {
                term.fired[i] = false;
            }
        }
        metrics
    }
}

impl fmt::Debug for TerminationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationManager")
            .field("num_terms", &self.terms.len())
            .field("num_envs", &self.num_envs)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TerminationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "<TerminationManager> contains {} active terms.",
            self.terms.len()
        )?;
        let mut table =
            TermTable::new("Active Termination Terms", &["Index", "Name", "Time-out"]);
        for (index, term) in self.terms.iter().enumerate() {
            table.row(vec![
                index.to_string(),
                term.name.clone(),
                term.cfg.time_out.to_string(),
            ]);
        }
        write!(f, "{}", table.render())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TerminationTermDef;
    use bevy::prelude::*;

    #[derive(Resource, Clone)]
    struct Heights(Vec<f32>);

    #[derive(Resource, Clone)]
    struct StepCounts(Vec<u32>);

    fn test_env(heights: Vec<f32>, steps: Vec<u32>) -> SimEnv {
        let mut env = SimEnv::new(heights.len());
        env.world_mut().insert_resource(Heights(heights));
        env.world_mut().insert_resource(StepCounts(steps));
        env
    }

    fn fell_def() -> TerminationTermDef {
        TerminationTermDef::function(|env, params| {
            let min = params.float("min_height");
            env.world()
                .resource::<Heights>()
                .0
                .iter()
                .map(|&h| h < min)
                .collect()
        })
        .with_required(&["min_height"])
    }

    fn timeout_def() -> TerminationTermDef {
        TerminationTermDef::function(|env, params| {
            let max = params.int("max_steps");
            env.world()
                .resource::<StepCounts>()
                .0
                .iter()
                .map(|&s| i64::from(s) >= max)
                .collect()
        })
        .with_required(&["max_steps"])
    }

    fn build(
        env: &SimEnv,
        cfg: TerminationManagerCfg,
    ) -> Result<TerminationManager, ConfigError> {
        TerminationManager::new(cfg, &TermRegistry::new(), env)
    }

    fn standard_cfg() -> TerminationManagerCfg {
        TerminationManagerCfg::new()
            .term(
                "fell",
                TerminationTermCfg::new(fell_def())
                    .with_params(TermParams::new().with("min_height", 0.2_f32)),
            )
            .term(
                "time_limit",
                TerminationTermCfg::new(timeout_def())
                    .with_time_out(true)
                    .with_params(TermParams::new().with("max_steps", 100_i64)),
            )
    }

    #[test]
    fn splits_terminated_and_time_outs() {
        let env = test_env(vec![0.1, 0.5, 0.5], vec![10, 100, 10]);
        let mut manager = build(&env, standard_cfg()).unwrap();
        let dones = manager.compute(&env);
        assert_eq!(dones, &[true, true, false]);
        assert_eq!(manager.terminated(), &[true, false, false]);
        assert_eq!(manager.time_outs(), &[false, true, false]);
    }

    #[test]
    fn or_composition_across_terms() {
        let env = test_env(vec![0.1, 0.5], vec![100, 100]);
        let mut manager = build(&env, standard_cfg()).unwrap();
        let dones = manager.compute(&env);
        assert_eq!(dones, &[true, true]);
        // env 0 ended for both reasons
        assert_eq!(manager.terminated(), &[true, false]);
        assert_eq!(manager.time_outs(), &[true, true]);
    }

    #[test]
    fn compute_clears_previous_step_flags() {
        let mut env = test_env(vec![0.1, 0.5], vec![0, 0]);
        let mut manager = build(&env, standard_cfg()).unwrap();
        assert_eq!(manager.compute(&env), &[true, false]);

        env.world_mut().resource_mut::<Heights>().0[0] = 0.5;
        assert_eq!(manager.compute(&env), &[false, false]);
    }

    #[test]
    fn per_term_fired_flags_accumulate_over_episode() {
        let mut env = test_env(vec![0.1, 0.5], vec![0, 0]);
        let mut manager = build(&env, standard_cfg()).unwrap();
        manager.compute(&env);
        env.world_mut().resource_mut::<Heights>().0[0] = 0.5;
        manager.compute(&env);
        // Step flags cleared, episode attribution retained.
        assert_eq!(manager.term_fired("fell").unwrap(), &[true, false]);
    }

    #[test]
    fn reset_reports_counts_and_clears_subset() {
        let env = test_env(vec![0.1, 0.1, 0.5], vec![0, 0, 0]);
        let mut manager = build(&env, standard_cfg()).unwrap();
        manager.compute(&env);

        let metrics = manager.reset(&EnvIds::from(vec![0, 2]));
        assert!((metrics["episode_termination/fell"] - 1.0).abs() < f32::EPSILON);
        assert!((metrics["episode_termination/time_limit"] - 0.0).abs() < f32::EPSILON);

        // Env 1 still carries its flag; envs 0 and 2 were cleared.
        assert_eq!(manager.term_fired("fell").unwrap(), &[false, true, false]);
    }

    #[test]
    fn disabled_terms_contribute_nothing() {
        let env = test_env(vec![0.1], vec![0]);
        let cfg = TerminationManagerCfg::new()
            .disabled_term("fell")
            .term(
                "time_limit",
                TerminationTermCfg::new(timeout_def())
                    .with_time_out(true)
                    .with_params(TermParams::new().with("max_steps", 100_i64)),
            );
        let mut manager = build(&env, cfg).unwrap();
        assert_eq!(manager.active_terms(), vec!["time_limit"]);
        assert_eq!(manager.compute(&env), &[false]);
    }

    #[test]
    fn wrong_flag_count_rejected_at_construction() {
        let env = test_env(vec![0.5, 0.5], vec![0, 0]);
        let bad = TerminationTermDef::function(|_, _| vec![false; 5]);
        let cfg = TerminationManagerCfg::new().term("bad", TerminationTermCfg::new(bad));
        let err = build(&env, cfg).unwrap_err();
        assert!(matches!(err, ConfigError::BatchDimMismatch { .. }));
    }

    #[test]
    fn get_set_term_cfg_roundtrip() {
        let env = test_env(vec![0.5], vec![0]);
        let mut manager = build(&env, standard_cfg()).unwrap();
        assert!(!manager.get_term_cfg("fell").unwrap().time_out());
        assert!(manager.get_term_cfg("time_limit").unwrap().time_out());

        let replacement = TerminationTermCfg::new(fell_def())
            .with_params(TermParams::new().with("min_height", 0.6_f32));
        manager
            .set_term_cfg("fell", replacement, &TermRegistry::new(), &env)
            .unwrap();
        let got = manager.get_term_cfg("fell").unwrap();
        assert!((got.params().float("min_height") - 0.6).abs() < f32::EPSILON);

        // Height 0.5 is now below the raised threshold.
        assert_eq!(manager.compute(&env), &[true]);

        assert_eq!(
            manager.get_term_cfg("nope").unwrap_err(),
            TermNotFound("nope".into())
        );
    }

    #[test]
    fn display_lists_time_out_flags() {
        let env = test_env(vec![0.5], vec![0]);
        let manager = build(&env, standard_cfg()).unwrap();
        let text = manager.to_string();
        assert!(text.contains("<TerminationManager> contains 2 active terms."));
        assert!(text.contains("time_limit"));
        assert!(text.contains("true"));
    }
}
