//! Observation manager: grouped term computation with scale/noise/clip.
//!
//! Terms are grouped by named output group. Each group either concatenates
//! its term outputs along the trailing axis (requiring every term to be
//! concatenation-compatible, checked once at preparation) or returns a
//! per-term mapping. Scale, optional noise corruption, and optional value
//! clipping are applied per term before assembly.

use std::fmt;

use corral_core::batch::Batch;
use corral_core::env::SimEnv;
use corral_core::error::{ConfigError, CorralError, TermNotFound};
use corral_core::subset::EnvIds;
use corral_noise::NoiseModel;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::manager::{Manager, ResetMetrics, TermTable};
use crate::params::TermParams;
use crate::registry::TermRegistry;
use crate::resolver::{resolve_observation, ObservationBinding};
use crate::term::ObservationFunc;

// ---------------------------------------------------------------------------
// ObservationTermCfg
// ---------------------------------------------------------------------------

/// Descriptor for one observation term.
///
/// Immutable once handed to the manager; replace it by name via
/// [`ObservationManager::set_term_cfg`] for online tuning.
#[derive(Clone)]
pub struct ObservationTermCfg {
    func: ObservationFunc,
    params: TermParams,
    scale: f32,
    noise: Option<NoiseModel>,
    clip: Option<(f32, f32)>,
}

impl ObservationTermCfg {
    /// Create a descriptor for the given callable reference.
    pub fn new(func: impl Into<ObservationFunc>) -> Self {
        Self {
            func: func.into(),
            params: TermParams::new(),
            scale: 1.0,
            noise: None,
            clip: None,
        }
    }

    /// Builder: set the parameter mapping.
    #[must_use]
    pub fn with_params(mut self, params: TermParams) -> Self {
        self.params = params;
        self
    }

    /// Builder: set the scale factor applied to the raw output.
    #[must_use]
    pub const fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Builder: set the noise model used when the group enables corruption.
    #[must_use]
    pub fn with_noise(mut self, noise: NoiseModel) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Builder: clamp the (post scale/noise) output into `[min, max]`.
    #[must_use]
    pub const fn with_clip(mut self, min: f32, max: f32) -> Self {
        self.clip = Some((min, max));
        self
    }

    /// The callable reference.
    #[must_use]
    pub const fn func(&self) -> &ObservationFunc {
        &self.func
    }

    /// The parameter mapping.
    #[must_use]
    pub const fn params(&self) -> &TermParams {
        &self.params
    }

    /// The scale factor.
    #[must_use]
    pub const fn scale(&self) -> f32 {
        self.scale
    }

    /// The noise model, if any.
    #[must_use]
    pub const fn noise(&self) -> Option<&NoiseModel> {
        self.noise.as_ref()
    }

    /// The clip range, if any.
    #[must_use]
    pub const fn clip(&self) -> Option<(f32, f32)> {
        self.clip
    }
}

impl fmt::Debug for ObservationTermCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationTermCfg")
            .field("params", &self.params)
            .field("scale", &self.scale)
            .field("noise", &self.noise)
            .field("clip", &self.clip)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ObservationGroupCfg
// ---------------------------------------------------------------------------

/// Configuration of one named observation group.
#[derive(Clone, Default)]
pub struct ObservationGroupCfg {
    terms: Vec<(String, Option<ObservationTermCfg>)>,
    concatenate_terms: bool,
    enable_corruption: bool,
}

impl ObservationGroupCfg {
    /// Create a group that concatenates its terms, without corruption.
    #[must_use]
    pub fn new() -> Self {
        Self {
            terms: Vec::new(),
            concatenate_terms: true,
            enable_corruption: false,
        }
    }

    /// Builder: append a term.
    #[must_use]
    pub fn term(mut self, name: impl Into<String>, cfg: ObservationTermCfg) -> Self {
        self.terms.push((name.into(), Some(cfg)));
        self
    }

    /// Builder: append a disabled term (skipped silently at preparation).
    #[must_use]
    pub fn disabled_term(mut self, name: impl Into<String>) -> Self {
        self.terms.push((name.into(), None));
        self
    }

    /// Builder: enable/disable trailing-axis concatenation.
    #[must_use]
    pub const fn with_concatenate(mut self, concatenate: bool) -> Self {
        self.concatenate_terms = concatenate;
        self
    }

    /// Builder: enable/disable noise corruption for this group.
    #[must_use]
    pub const fn with_corruption(mut self, enable: bool) -> Self {
        self.enable_corruption = enable;
        self
    }
}

/// Configuration of an observation manager: ordered named groups.
#[derive(Clone, Default)]
pub struct ObservationManagerCfg {
    groups: Vec<(String, ObservationGroupCfg)>,
    seed: u64,
}

impl ObservationManagerCfg {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a named group.
    #[must_use]
    pub fn group(mut self, name: impl Into<String>, cfg: ObservationGroupCfg) -> Self {
        self.groups.push((name.into(), cfg));
        self
    }

    /// Builder: seed for the corruption RNG.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ---------------------------------------------------------------------------
// Observations (compute output)
// ---------------------------------------------------------------------------

/// Output of one group: a single concatenated batch, or per-term batches.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupObservations {
    Concatenated(Batch),
    Terms(Vec<(String, Batch)>),
}

impl GroupObservations {
    /// The concatenated batch, if this group concatenates.
    #[must_use]
    pub const fn as_batch(&self) -> Option<&Batch> {
        match self {
            Self::Concatenated(batch) => Some(batch),
            Self::Terms(_) => None,
        }
    }

    /// Look up a term's batch in a non-concatenated group.
    #[must_use]
    pub fn term(&self, name: &str) -> Option<&Batch> {
        match self {
            Self::Concatenated(_) => None,
            Self::Terms(terms) => terms.iter().find(|(n, _)| n == name).map(|(_, b)| b),
        }
    }
}

/// All group outputs of one `compute()` call, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Observations {
    groups: Vec<(String, GroupObservations)>,
}

impl Observations {
    /// Look up a group's output.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupObservations> {
        self.groups.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    /// Shortcut: the concatenated batch of a group.
    #[must_use]
    pub fn batch(&self, name: &str) -> Option<&Batch> {
        self.group(name).and_then(GroupObservations::as_batch)
    }

    /// Iterate groups in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupObservations)> {
        self.groups.iter().map(|(n, g)| (n.as_str(), g))
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ObservationManager
// ---------------------------------------------------------------------------

struct PreparedTerm {
    name: String,
    cfg: ObservationTermCfg,
    binding: ObservationBinding,
    /// Output shape without the leading batch axis, recorded at preparation.
    shape: Vec<usize>,
}

struct PreparedGroup {
    name: String,
    concatenate: bool,
    corruption: bool,
    terms: Vec<PreparedTerm>,
}

/// Computes grouped observation batches each control step.
pub struct ObservationManager {
    groups: Vec<PreparedGroup>,
    num_envs: usize,
    rng: ChaCha8Rng,
}

impl ObservationManager {
    /// Prepare the manager from its configuration.
    ///
    /// Each term is resolved, validated against its declared signature, and
    /// probed once against the live environment to record its output shape.
    /// Shape incompatibilities with a requested concatenation are rejected
    /// here, not at `compute()` time. Stateful term instances are reset
    /// after probing so the probe leaves no trace.
    pub fn new(
        cfg: ObservationManagerCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<Self, ConfigError> {
        let mut groups = Vec::new();
        for (group_name, group_cfg) in cfg.groups {
            let mut terms: Vec<PreparedTerm> = Vec::new();
            for (term_name, term_cfg) in group_cfg.terms {
                let Some(term_cfg) = term_cfg else {
                    continue; // disabled
                };
                if terms.iter().any(|t| t.name == term_name) {
                    return Err(ConfigError::DuplicateTerm { name: term_name });
                }
                let mut binding = resolve_observation(
                    &term_name,
                    &term_cfg.func,
                    &term_cfg.params,
                    registry,
                    env,
                )?;
                let shape = probe_term_shape(
                    &group_name,
                    &term_name,
                    &mut binding,
                    &term_cfg,
                    group_cfg.concatenate_terms,
                    env,
                )?;
                terms.push(PreparedTerm {
                    name: term_name,
                    cfg: term_cfg,
                    binding,
                    shape,
                });
            }
            groups.push(PreparedGroup {
                name: group_name,
                concatenate: group_cfg.concatenate_terms,
                corruption: group_cfg.enable_corruption,
                terms,
            });
        }

        // The shape probe may have advanced stateful terms; undo that.
        for group in &mut groups {
            for term in &mut group.terms {
                term.binding.reset(&EnvIds::All);
            }
        }

        Ok(Self {
            groups,
            num_envs: env.num_envs(),
            rng: ChaCha8Rng::seed_from_u64(cfg.seed),
        })
    }

    /// Compute all groups' observations for the current environment state.
    ///
    /// # Panics
    ///
    /// Panics if `env` has a different environment count than the manager
    /// was prepared for.
    pub fn compute(&mut self, env: &SimEnv) -> Observations {
        assert_eq!(
            env.num_envs(),
            self.num_envs,
            "manager prepared for {} environments, got {}",
            self.num_envs,
            env.num_envs()
        );

        let mut out = Vec::with_capacity(self.groups.len());
        for group in &mut self.groups {
            let mut batches = Vec::with_capacity(group.terms.len());
            for term in &mut group.terms {
                let mut batch = term.binding.invoke(env, &term.cfg.params);
                batch.scale(term.cfg.scale);
                if group.corruption {
                    if let Some(noise) = &term.cfg.noise {
                        noise.apply_slice(batch.as_flat_mut(), &mut self.rng);
                    }
                }
                if let Some((min, max)) = term.cfg.clip {
                    batch.clamp(min, max);
                }
                batches.push(batch);
            }
            let group_obs = if group.concatenate {
                let joined = if batches.is_empty() {
                    Batch::zeros(&[self.num_envs, 0])
                } else {
                    Batch::concat_width(&batches)
                };
                GroupObservations::Concatenated(joined)
            } else {
                GroupObservations::Terms(
                    group
                        .terms
                        .iter()
                        .map(|t| t.name.clone())
                        .zip(batches)
                        .collect(),
                )
            };
            out.push((group.name.clone(), group_obs));
        }
        Observations { groups: out }
    }

    /// Names of this manager's groups, in declaration order.
    #[must_use]
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Active term names of a group, in declaration order.
    #[must_use]
    pub fn active_terms(&self, group: &str) -> Option<Vec<&str>> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| g.terms.iter().map(|t| t.name.as_str()).collect())
    }

    /// Total trailing width of a concatenated group. `None` for unknown or
    /// non-concatenated groups.
    #[must_use]
    pub fn group_dim(&self, group: &str) -> Option<usize> {
        let group = self.groups.iter().find(|g| g.name == group)?;
        if !group.concatenate {
            return None;
        }
        Some(
            group
                .terms
                .iter()
                .map(|t| t.shape.iter().product::<usize>())
                .sum(),
        )
    }

    /// Per-term output shapes of a group (without the batch axis), needed by
    /// consumers that slice a concatenated batch back into terms.
    #[must_use]
    pub fn group_term_dims(&self, group: &str) -> Option<Vec<(&str, &[usize])>> {
        self.groups.iter().find(|g| g.name == group).map(|g| {
            g.terms
                .iter()
                .map(|t| (t.name.as_str(), t.shape.as_slice()))
                .collect()
        })
    }

    /// Get a term's descriptor, searching all groups for the first match.
    pub fn get_term_cfg(&self, name: &str) -> Result<&ObservationTermCfg, TermNotFound> {
        self.groups
            .iter()
            .flat_map(|g| g.terms.iter())
            .find(|t| t.name == name)
            .map(|t| &t.cfg)
            .ok_or_else(|| TermNotFound(name.to_string()))
    }

    /// Replace a term's descriptor by name, re-validating only that term.
    ///
    /// The replacement is resolved and probed like at construction; a shape
    /// incompatible with the group's concatenation setting is rejected.
    pub fn set_term_cfg(
        &mut self,
        name: &str,
        cfg: ObservationTermCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<(), CorralError> {
        for group in &mut self.groups {
            let concatenate = group.concatenate;
            let group_name = group.name.clone();
            if let Some(term) = group.terms.iter_mut().find(|t| t.name == name) {
                let mut binding =
                    resolve_observation(name, &cfg.func, &cfg.params, registry, env)?;
                let shape = probe_term_shape(
                    &group_name,
                    name,
                    &mut binding,
                    &cfg,
                    concatenate,
                    env,
                )?;
                binding.reset(&EnvIds::All);
                term.cfg = cfg;
                term.binding = binding;
                term.shape = shape;
                return Ok(());
            }
        }
        Err(TermNotFound(name.to_string()).into())
    }
}

/// Invoke a term once to learn its output shape, validating the batch axis
/// and concatenation compatibility.
fn probe_term_shape(
    group: &str,
    term: &str,
    binding: &mut ObservationBinding,
    cfg: &ObservationTermCfg,
    concatenate: bool,
    env: &SimEnv,
) -> Result<Vec<usize>, ConfigError> {
    let probe = binding.invoke(env, &cfg.params);
    if probe.num_envs() != env.num_envs() {
        return Err(ConfigError::BatchDimMismatch {
            term: term.to_string(),
            expected: env.num_envs(),
            got: probe.num_envs(),
        });
    }
    if concatenate && !probe.is_concat_compatible() {
        return Err(ConfigError::NotConcatenable {
            group: group.to_string(),
            term: term.to_string(),
            shape: probe.shape().to_vec(),
        });
    }
    Ok(probe.shape()[1..].to_vec())
}

impl Manager for ObservationManager {
    fn num_terms(&self) -> usize {
        self.groups.iter().map(|g| g.terms.len()).sum()
    }

    fn reset(&mut self, env_ids: &EnvIds) -> ResetMetrics {
        for group in &mut self.groups {
            for term in &mut group.terms {
                term.binding.reset(env_ids);
            }
        }
        ResetMetrics::new()
    }
}

impl fmt::Debug for ObservationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationManager")
            .field("num_groups", &self.groups.len())
            .field("num_envs", &self.num_envs)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ObservationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "<ObservationManager> contains {} groups.",
            self.groups.len()
        )?;
        for group in &self.groups {
            let mut table = TermTable::new(
                format!("Active Observation Terms in Group: '{}'", group.name),
                &["Index", "Name", "Shape"],
            );
            for (index, term) in group.terms.iter().enumerate() {
                table.row(vec![
                    index.to_string(),
                    term.name.clone(),
                    format!("{:?}", term.shape),
                ]);
            }
            write!(f, "{}", table.render())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
