//! Curriculum manager: difficulty scheduling at reset points.
//!
//! Curriculum terms are invoked by the owning environment at reset points
//! (after the episode's outcome is known). Each term may mutate difficulty
//! state held in the environment and report an optional scalar state value,
//! retained per term for telemetry.

use std::fmt;

use corral_core::env::SimEnv;
use corral_core::error::{ConfigError, CorralError, TermNotFound};
use corral_core::subset::EnvIds;

use crate::manager::{Manager, ResetMetrics, TermTable};
use crate::params::TermParams;
use crate::registry::TermRegistry;
use crate::resolver::resolve_curriculum;
use crate::term::{CurriculumFn, CurriculumFunc};

// ---------------------------------------------------------------------------
// CurriculumTermCfg
// ---------------------------------------------------------------------------

/// Descriptor for one curriculum term.
#[derive(Clone)]
pub struct CurriculumTermCfg {
    func: CurriculumFunc,
    params: TermParams,
}

impl CurriculumTermCfg {
    /// Create a descriptor for the given callable reference.
    pub fn new(func: impl Into<CurriculumFunc>) -> Self {
        Self {
            func: func.into(),
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
    pub const fn func(&self) -> &CurriculumFunc {
        &self.func
    }

    /// The parameter mapping.
    #[must_use]
    pub const fn params(&self) -> &TermParams {
        &self.params
    }
}

impl fmt::Debug for CurriculumTermCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurriculumTermCfg")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Configuration of a curriculum manager: ordered named terms.
#[derive(Clone, Default)]
pub struct CurriculumManagerCfg {
    terms: Vec<(String, Option<CurriculumTermCfg>)>,
}

impl CurriculumManagerCfg {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a term.
    #[must_use]
    pub fn term(mut self, name: impl Into<String>, cfg: CurriculumTermCfg) -> Self {
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
// CurriculumManager
// ---------------------------------------------------------------------------

struct PreparedTerm {
    name: String,
    cfg: CurriculumTermCfg,
    func: CurriculumFn,
    state: Option<f32>,
}

/// Drives curriculum terms at reset points.
pub struct CurriculumManager {
    terms: Vec<PreparedTerm>,
    num_envs: usize,
}

impl CurriculumManager {
    /// Prepare the manager from its configuration.
    pub fn new(
        cfg: CurriculumManagerCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<Self, ConfigError> {
        let mut terms: Vec<PreparedTerm> = Vec::new();
        for (name, term_cfg) in cfg.terms {
            let Some(term_cfg) = term_cfg else {
                continue; // disabled
            };
            if terms.iter().any(|t| t.name == name) {
                return Err(ConfigError::DuplicateTerm { name });
            }
            let func = resolve_curriculum(&name, &term_cfg.func, &term_cfg.params, registry)?;
            terms.push(PreparedTerm {
                name,
                cfg: term_cfg,
                func,
                state: None,
            });
        }
        Ok(Self {
            terms,
            num_envs: env.num_envs(),
        })
    }

    /// Invoke every term for the resetting environments, retaining any
    /// reported state.
    ///
    /// # Panics
    ///
    /// Panics if `env` has a different environment count than the manager
    /// was prepared for.
    pub fn compute(&mut self, env: &mut SimEnv, env_ids: &EnvIds) {
        assert_eq!(
            env.num_envs(),
            self.num_envs,
            "manager prepared for {} environments, got {}",
            self.num_envs,
            env.num_envs()
        );
        for term in &mut self.terms {
            if let Some(state) = (term.func)(env, env_ids, &term.cfg.params) {
                term.state = Some(state);
            }
        }
    }

    /// Active term names, in declaration order.
    #[must_use]
    pub fn active_terms(&self) -> Vec<&str> {
        self.terms.iter().map(|t| t.name.as_str()).collect()
    }

    /// The latest state reported by `name`, if any.
    pub fn term_state(&self, name: &str) -> Result<Option<f32>, TermNotFound> {
        self.terms
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.state)
            .ok_or_else(|| TermNotFound(name.to_string()))
    }

    /// Get a term's descriptor by name.
    pub fn get_term_cfg(&self, name: &str) -> Result<&CurriculumTermCfg, TermNotFound> {
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
        cfg: CurriculumTermCfg,
        registry: &TermRegistry,
    ) -> Result<(), CorralError> {
        let Some(term) = self.terms.iter_mut().find(|t| t.name == name) else {
            return Err(TermNotFound(name.to_string()).into());
        };
        let func = resolve_curriculum(name, &cfg.func, &cfg.params, registry)?;
        term.cfg = cfg;
        term.func = func;
        Ok(())
    }
}

impl Manager for CurriculumManager {
    fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Report the latest curriculum state per term.
    fn reset(&mut self, _env_ids: &EnvIds) -> ResetMetrics {
        let mut metrics = ResetMetrics::new();
        for term in &self.terms {
            if let Some(state) = term.state {
                metrics.insert(format!("curriculum/{}", term.name), state);
            }
        }
        metrics
    }
}

impl fmt::Debug for CurriculumManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurriculumManager")
            .field("num_terms", &self.terms.len())
            .field("num_envs", &self.num_envs)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CurriculumManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "<CurriculumManager> contains {} active terms.",
            self.terms.len()
        )?;
        let mut table = TermTable::new("Active Curriculum Terms", &["Index", "Name"]);
        for (index, term) in self.terms.iter().enumerate() {
            table.row(vec![index.to_string(), term.name.clone()]);
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
    use crate::term::CurriculumTermDef;
    use bevy::prelude::*;

    /// Per-env terrain difficulty level, promoted on successful episodes.
    #[derive(Resource, Clone)]
    struct TerrainLevels(Vec<f32>);

    fn test_env(num_envs: usize) -> SimEnv {
        let mut env = SimEnv::new(num_envs);
        env.world_mut()
            .insert_resource(TerrainLevels(vec![0.0; num_envs]));
        env
    }

    fn promote_def() -> CurriculumTermDef {
        CurriculumTermDef::function(|env, ids, params| {
            let step = params.float("step");
            let num_envs = env.num_envs();
            let mut levels = env.world_mut().resource_mut::<TerrainLevels>();
            for i in ids.indices(num_envs) {
                levels.0[i] += step;
            }
            let mean = levels.0.iter().sum::<f32>() / levels.0.len() as f32;
            Some(mean)
        })
        .with_required(&["step"])
    }

    fn build(env: &SimEnv, cfg: CurriculumManagerCfg) -> Result<CurriculumManager, ConfigError> {
        CurriculumManager::new(cfg, &TermRegistry::new(), env)
    }

    fn promote_cfg() -> CurriculumManagerCfg {
        CurriculumManagerCfg::new().term(
            "terrain_levels",
            CurriculumTermCfg::new(promote_def())
                .with_params(TermParams::new().with("step", 1.0_f32)),
        )
    }

    #[test]
    fn compute_mutates_difficulty_for_subset() {
        let mut env = test_env(4);
        let mut manager = build(&env, promote_cfg()).unwrap();

        manager.compute(&mut env, &EnvIds::from(vec![0, 2]));
        let levels = env.world().resource::<TerrainLevels>();
        assert_eq!(levels.0, vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn state_retained_and_reported_on_reset() {
        let mut env = test_env(2);
        let mut manager = build(&env, promote_cfg()).unwrap();

        assert_eq!(manager.term_state("terrain_levels").unwrap(), None);
        assert!(manager.reset(&EnvIds::All).is_empty());

        manager.compute(&mut env, &EnvIds::All);
        assert_eq!(manager.term_state("terrain_levels").unwrap(), Some(1.0));

        let metrics = manager.reset(&EnvIds::All);
        assert!((metrics["curriculum/terrain_levels"] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn silent_terms_keep_previous_state() {
        let mut env = test_env(2);
        let silent = CurriculumTermDef::function(|_, _, _| None);
        let cfg = CurriculumManagerCfg::new()
            .term("silent", CurriculumTermCfg::new(silent));
        let mut manager = build(&env, cfg).unwrap();
        manager.compute(&mut env, &EnvIds::All);
        assert_eq!(manager.term_state("silent").unwrap(), None);
        assert!(manager.reset(&EnvIds::All).is_empty());
    }

    #[test]
    fn disabled_terms_are_skipped_silently() {
        let env = test_env(2);
        let cfg = promote_cfg().disabled_term("unused");
        let manager = build(&env, cfg).unwrap();
        assert_eq!(manager.active_terms(), vec!["terrain_levels"]);
        assert_eq!(manager.num_terms(), 1);
    }

    #[test]
    fn duplicate_term_names_rejected() {
        let env = test_env(2);
        let cfg = promote_cfg().term(
            "terrain_levels",
            CurriculumTermCfg::new(CurriculumTermDef::function(|_, _, _| None)),
        );
        let err = build(&env, cfg).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTerm { .. }));
    }

    #[test]
    fn get_set_term_cfg_roundtrip() {
        let mut env = test_env(2);
        let mut manager = build(&env, promote_cfg()).unwrap();
        let got = manager.get_term_cfg("terrain_levels").unwrap();
        assert!((got.params().float("step") - 1.0).abs() < f32::EPSILON);

        let replacement = CurriculumTermCfg::new(promote_def())
            .with_params(TermParams::new().with("step", 2.0_f32));
        manager
            .set_term_cfg("terrain_levels", replacement, &TermRegistry::new())
            .unwrap();
        manager.compute(&mut env, &EnvIds::All);
        assert_eq!(env.world().resource::<TerrainLevels>().0, vec![2.0, 2.0]);

        assert_eq!(
            manager.get_term_cfg("nope").unwrap_err(),
            TermNotFound("nope".into())
        );
    }

    #[test]
    fn unknown_param_rejected_at_construction() {
        let env = test_env(2);
        let cfg = CurriculumManagerCfg::new().term(
            "terrain_levels",
            CurriculumTermCfg::new(promote_def())
                .with_params(TermParams::new().with("step", 1.0_f32).with("rate", 2.0_f32)),
        );
        let err = build(&env, cfg).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParam { .. }));
    }

    #[test]
    fn display_lists_terms() {
        let env = test_env(2);
        let manager = build(&env, promote_cfg()).unwrap();
        let text = manager.to_string();
        assert!(text.contains("<CurriculumManager> contains 1 active terms."));
        assert!(text.contains("terrain_levels"));
    }
}
