//! Reward manager: weighted per-term reward accumulation.
//!
//! Each term produces one value per environment instance; the manager sums
//! `value * weight * dt` into the step reward and tracks per-term episodic
//! sums, reported (and zeroed) per environment subset on reset.

use std::fmt;

use corral_core::env::SimEnv;
use corral_core::error::{ConfigError, CorralError, TermNotFound};
use corral_core::subset::EnvIds;

use crate::manager::{Manager, ResetMetrics, TermTable};
use crate::params::TermParams;
use crate::registry::TermRegistry;
use crate::resolver::resolve_reward;
use crate::term::{RewardFn, RewardFunc};

// ---------------------------------------------------------------------------
// RewardTermCfg
// ---------------------------------------------------------------------------

/// Descriptor for one reward term.
#[derive(Clone)]
pub struct RewardTermCfg {
    func: RewardFunc,
    weight: f32,
    params: TermParams,
}

impl RewardTermCfg {
    /// Create a descriptor with the given callable reference and weight.
    pub fn new(func: impl Into<RewardFunc>, weight: f32) -> Self {
        Self {
            func: func.into(),
            weight,
            params: TermParams::new(),
        }
    }

    /// Builder: set the parameter mapping.
    #[must_use]
    pub fn with_params(mut self, params: TermParams) -> Self {
        self.params = params;
        self
    }

    /// The callable reference.
    #[must_use]
    pub const fn func(&self) -> &RewardFunc {
        &self.func
    }

    /// The weight multiplied into this term's contribution.
    #[must_use]
    pub const fn weight(&self) -> f32 {
        self.weight
    }

    /// The parameter mapping.
    #[must_use]
    pub const fn params(&self) -> &TermParams {
        &self.params
    }
}

impl fmt::Debug for RewardTermCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardTermCfg")
            .field("weight", &self.weight)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Configuration of a reward manager: ordered named terms.
#[derive(Clone, Default)]
pub struct RewardManagerCfg {
    terms: Vec<(String, Option<RewardTermCfg>)>,
}

impl RewardManagerCfg {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a term.
    #[must_use]
    pub fn term(mut self, name: impl Into<String>, cfg: RewardTermCfg) -> Self {
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
// RewardManager
// ---------------------------------------------------------------------------

struct PreparedTerm {
    name: String,
    cfg: RewardTermCfg,
    func: RewardFn,
    episodic_sum: Vec<f32>,
}

/// Accumulates weighted reward terms into a per-environment step reward.
pub struct RewardManager {
    terms: Vec<PreparedTerm>,
    step_reward: Vec<f32>,
    num_envs: usize,
}

impl RewardManager {
    /// Prepare the manager from its configuration.
    ///
    /// Each term is probed once against the live environment to confirm it
    /// produces one value per environment instance.
    pub fn new(
        cfg: RewardManagerCfg,
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
            let func = resolve_reward(&name, &term_cfg.func, &term_cfg.params, registry)?;
            probe_row_len(&name, &func, &term_cfg.params, env)?;
            terms.push(PreparedTerm {
                name,
                cfg: term_cfg,
                func,
                episodic_sum: vec![0.0; num_envs],
            });
        }
        Ok(Self {
            terms,
            step_reward: vec![0.0; num_envs],
            num_envs,
        })
    }

    /// Compute the step reward for the current environment state.
    ///
    /// Zero-weight terms are skipped. Returns one reward per environment.
    ///
    /// # Panics
    ///
    /// Panics if `env` has a different environment count than the manager
    /// was prepared for.
    pub fn compute(&mut self, env: &SimEnv, dt: f32) -> &[f32] {
        assert_eq!(
            env.num_envs(),
            self.num_envs,
            "manager prepared for {} environments, got {}",
            self.num_envs,
            env.num_envs()
        );
        self.step_reward.fill(0.0);
        for term in &mut self.terms {
            if term.cfg.weight == 0.0 {
                continue;
            }
            let values = (term.func)(env, &term.cfg.params);
            assert_eq!(
                values.len(),
                self.num_envs,
                "reward term '{}' returned {} values for {} environments",
                term.name,
                values.len(),
                self.num_envs
            );
            for (i, value) in values.iter().enumerate() {
                let weighted = value * term.cfg.weight * dt;
                self.step_reward[i] += weighted;
                term.episodic_sum[i] += weighted;
            }
        }
        &self.step_reward
    }

    /// Active term names, in declaration order.
    #[must_use]
    pub fn active_terms(&self) -> Vec<&str> {
        self.terms.iter().map(|t| t.name.as_str()).collect()
    }

    /// The most recently computed step reward.
    #[must_use]
    pub fn step_reward(&self) -> &[f32] {
        &self.step_reward
    }

    /// Get a term's descriptor by name.
    pub fn get_term_cfg(&self, name: &str) -> Result<&RewardTermCfg, TermNotFound> {
        self.terms
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.cfg)
            .ok_or_else(|| TermNotFound(name.to_string()))
    }

    /// Replace a term's descriptor by name, re-validating only that term.
    ///
    /// Episodic sums are preserved so online weight tuning does not skew
    /// the current episode's telemetry.
    pub fn set_term_cfg(
        &mut self,
        name: &str,
        cfg: RewardTermCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<(), CorralError> {
        let Some(term) = self.terms.iter_mut().find(|t| t.name == name) else {
            return Err(TermNotFound(name.to_string()).into());
        };
        let func = resolve_reward(name, &cfg.func, &cfg.params, registry)?;
        probe_row_len(name, &func, &cfg.params, env)?;
        term.cfg = cfg;
        term.func = func;
        Ok(())
    }
}

fn probe_row_len(
    name: &str,
    func: &RewardFn,
    params: &TermParams,
    env: &SimEnv,
) -> Result<(), ConfigError> {
    let probe = func(env, params);
    if probe.len() != env.num_envs() {
        return Err(ConfigError::BatchDimMismatch {
            term: name.to_string(),
            expected: env.num_envs(),
            got: probe.len(),
        });
    }
    Ok(())
}

impl Manager for RewardManager {
    fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Report mean episodic sums over the resetting subset, then zero them.
    fn reset(&mut self, env_ids: &EnvIds) -> ResetMetrics {
        let indices = env_ids.indices(self.num_envs);
        let mut metrics = ResetMetrics::new();
        for term in &mut self.terms {
            let mean = if indices.is_empty() {
                0.0
            } else {
                indices.iter().map(|&i| term.episodic_sum[i]).sum::<f32>()
                    / indices.len() as f32
            };
            metrics.insert(format!("episode_reward/{}", term.name), mean);
            for &i in &indices {
                term.episodic_sum[i] = 0.0;
            }
        }
        metrics
    }
}

impl fmt::Debug for RewardManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardManager")
            .field("num_terms", &self.terms.len())
            .field("num_envs", &self.num_envs)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RewardManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "<RewardManager> contains {} active terms.",
            self.terms.len()
        )?;
        let mut table = TermTable::new("Active Reward Terms", &["Index", "Name", "Weight"]);
        for (index, term) in self.terms.iter().enumerate() {
            table.row(vec![
                index.to_string(),
                term.name.clone(),
                term.cfg.weight.to_string(),
            ]);
        }
        write!(f, "{}", table.render())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
