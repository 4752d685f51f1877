//! Event manager: mode-bucketed term application with interval sampling and
//! reset-frequency gating.
//!
//! Event terms are grouped by a user-defined mode string. The driving
//! environment loop triggers a mode by calling [`EventManager::apply`]; two
//! built-in modes carry timing logic ([`modes::INTERVAL`] and
//! [`modes::RESET`]), every other mode fires its terms unconditionally.
//! Applying a mode no term was configured for is a warn-and-skip no-op,
//! since modes are user-extensible.

use std::fmt;

use corral_core::env::SimEnv;
use corral_core::error::{ApplyError, ConfigError, CorralError, TermNotFound};
use corral_core::subset::EnvIds;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::manager::{Manager, ResetMetrics, TermTable};
use crate::params::TermParams;
use crate::registry::TermRegistry;
use crate::resolver::{resolve_event, EventBinding};
use crate::term::EventFunc;

/// Built-in event modes recognized by the manager.
///
/// Any other string is a valid user-defined mode that fires unconditionally
/// when triggered by the environment loop.
pub mod modes {
    /// Applied once at the beginning of training, by convention.
    pub const STARTUP: &str = "startup";
    /// Applied at environment resets, gated by a minimum step count.
    pub const RESET: &str = "reset";
    /// Applied at randomly sampled time intervals.
    pub const INTERVAL: &str = "interval";
}

// ---------------------------------------------------------------------------
// EventTermCfg
// ---------------------------------------------------------------------------

/// Descriptor for one event term.
#[derive(Clone)]
pub struct EventTermCfg {
    func: EventFunc,
    mode: String,
    params: TermParams,
    interval_range_s: Option<(f32, f32)>,
    is_global_time: bool,
    min_step_count_between_reset: u32,
}

impl EventTermCfg {
    /// Create a descriptor for the given callable reference and mode.
    pub fn new(func: impl Into<EventFunc>, mode: impl Into<String>) -> Self {
        Self {
            func: func.into(),
            mode: mode.into(),
            params: TermParams::new(),
            interval_range_s: None,
            is_global_time: false,
            min_step_count_between_reset: 0,
        }
    }

    /// Builder: set the parameter mapping.
    #[must_use]
    pub fn with_params(mut self, params: TermParams) -> Self {
        self.params = params;
        self
    }

    /// Builder: set the interval sampling range in seconds (required for
    /// mode [`modes::INTERVAL`]).
    #[must_use]
    pub const fn with_interval_range(mut self, lower: f32, upper: f32) -> Self {
        self.interval_range_s = Some((lower, upper));
        self
    }

    /// Builder: use one shared interval timer instead of one per environment.
    #[must_use]
    pub const fn with_global_time(mut self, global: bool) -> Self {
        self.is_global_time = global;
        self
    }

    /// Builder: minimum environment steps between triggers in mode
    /// [`modes::RESET`]. Zero disables the gate.
    #[must_use]
    pub const fn with_min_step_count(mut self, steps: u32) -> Self {
        self.min_step_count_between_reset = steps;
        self
    }

    /// The callable reference.
    #[must_use]
    pub const fn func(&self) -> &EventFunc {
        &self.func
    }

    /// The mode this term belongs to.
    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// The parameter mapping.
    #[must_use]
    pub const fn params(&self) -> &TermParams {
        &self.params
    }

    /// The interval sampling range, if any.
    #[must_use]
    pub const fn interval_range_s(&self) -> Option<(f32, f32)> {
        self.interval_range_s
    }

    /// Whether interval timing is shared across the batch.
    #[must_use]
    pub const fn is_global_time(&self) -> bool {
        self.is_global_time
    }

    /// The reset-gate threshold.
    #[must_use]
    pub const fn min_step_count_between_reset(&self) -> u32 {
        self.min_step_count_between_reset
    }
}

impl fmt::Debug for EventTermCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTermCfg")
            .field("mode", &self.mode)
            .field("params", &self.params)
            .field("interval_range_s", &self.interval_range_s)
            .field("is_global_time", &self.is_global_time)
            .field("min_step_count_between_reset", &self.min_step_count_between_reset)
            .finish_non_exhaustive()
    }
}

/// Configuration of an event manager: ordered named terms.
#[derive(Clone, Default)]
pub struct EventManagerCfg {
    terms: Vec<(String, Option<EventTermCfg>)>,
    seed: u64,
}

impl EventManagerCfg {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a term.
    #[must_use]
    pub fn term(mut self, name: impl Into<String>, cfg: EventTermCfg) -> Self {
        self.terms.push((name.into(), Some(cfg)));
        self
    }

    /// Builder: append a disabled term (skipped silently at preparation).
    #[must_use]
    pub fn disabled_term(mut self, name: impl Into<String>) -> Self {
        self.terms.push((name.into(), None));
        self
    }

    /// Builder: seed for interval resampling.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ---------------------------------------------------------------------------
// EventManager
// ---------------------------------------------------------------------------

/// Remaining time until an interval term's next trigger.
enum IntervalTimer {
    /// One shared scalar: the term triggers for the whole batch at once.
    Global { time_left: f32, range: (f32, f32) },
    /// One scalar per environment: uncorrelated trigger cadences.
    PerEnv {
        time_left: Vec<f32>,
        range: (f32, f32),
    },
}

struct PreparedTerm {
    name: String,
    cfg: EventTermCfg,
    binding: EventBinding,
    interval: Option<IntervalTimer>,
    /// Step at which this term last fired, per environment (reset mode).
    last_triggered_step: Vec<u64>,
}

struct ModeBucket {
    mode: String,
    terms: Vec<PreparedTerm>,
}

/// Applies event terms when their mode is triggered by the environment loop.
pub struct EventManager {
    modes: Vec<ModeBucket>,
    num_envs: usize,
    rng: ChaCha8Rng,
}

impl EventManager {
    /// Prepare the manager from its configuration.
    pub fn new(
        cfg: EventManagerCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<Self, ConfigError> {
        let num_envs = env.num_envs();
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut buckets: Vec<ModeBucket> = Vec::new();

        for (term_name, term_cfg) in cfg.terms {
            let Some(term_cfg) = term_cfg else {
                continue; // disabled
            };
            if term_cfg.mode != modes::RESET && term_cfg.min_step_count_between_reset != 0 {
                warn!(
                    term = term_name.as_str(),
                    mode = term_cfg.mode.as_str(),
                    "min_step_count_between_reset set on a non-reset term, ignoring"
                );
            }

            let binding =
                resolve_event(&term_name, &term_cfg.func, &term_cfg.params, registry, env)?;
            let prepared = Self::prepare_term(term_name, term_cfg, binding, num_envs, &mut rng)?;

            let mode = prepared.cfg.mode.clone();
            let index = match buckets.iter().position(|b| b.mode == mode) {
                Some(index) => index,
                None => {
                    buckets.push(ModeBucket {
                        mode,
                        terms: Vec::new(),
                    });
                    buckets.len() - 1
                }
            };
            let bucket = &mut buckets[index];
            if bucket.terms.iter().any(|t| t.name == prepared.name) {
                return Err(ConfigError::DuplicateTerm {
                    name: prepared.name,
                });
            }
            bucket.terms.push(prepared);
        }

        Ok(Self {
            modes: buckets,
            num_envs,
            rng,
        })
    }

    fn prepare_term(
        name: String,
        cfg: EventTermCfg,
        binding: EventBinding,
        num_envs: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<PreparedTerm, ConfigError> {
        let mut interval = None;
        let mut last_triggered_step = Vec::new();

        if cfg.mode == modes::INTERVAL {
            let Some((lower, upper)) = cfg.interval_range_s else {
                return Err(ConfigError::MissingIntervalRange { term: name });
            };
            if !lower.is_finite() || !upper.is_finite() || lower < 0.0 || lower > upper {
                return Err(ConfigError::InvalidIntervalRange {
                    term: name,
                    lower,
                    upper,
                });
            }
            let range = (lower, upper);
            interval = Some(if cfg.is_global_time {
                IntervalTimer::Global {
                    time_left: sample_interval(range, rng),
                    range,
                }
            } else {
                IntervalTimer::PerEnv {
                    time_left: (0..num_envs).map(|_| sample_interval(range, rng)).collect(),
                    range,
                }
            });
        } else if cfg.mode == modes::RESET {
            last_triggered_step = vec![0; num_envs];
        }

        Ok(PreparedTerm {
            name,
            cfg,
            binding,
            interval,
            last_triggered_step,
        })
    }

    /// Apply every term configured for `mode`.
    ///
    /// `dt` is required for mode [`modes::INTERVAL`]; `global_step_count` is
    /// required for mode [`modes::RESET`]. A mode no term was configured for
    /// is logged and skipped.
    ///
    /// # Panics
    ///
    /// Panics if `env` has a different environment count than the manager
    /// was prepared for.
    pub fn apply(
        &mut self,
        env: &mut SimEnv,
        mode: &str,
        env_ids: &EnvIds,
        dt: Option<f32>,
        global_step_count: Option<u64>,
    ) -> Result<(), ApplyError> {
        assert_eq!(
            env.num_envs(),
            self.num_envs,
            "manager prepared for {} environments, got {}",
            self.num_envs,
            env.num_envs()
        );

        let num_envs = self.num_envs;
        let Some(bucket) = self.modes.iter_mut().find(|b| b.mode == mode) else {
            warn!(mode, "event mode is not defined, skipping");
            return Ok(());
        };

        match mode {
            modes::INTERVAL => {
                let dt = dt.ok_or(ApplyError::MissingDt)?;
                apply_interval(bucket, env, env_ids, dt, num_envs, &mut self.rng);
            }
            modes::RESET => {
                let step = global_step_count.ok_or(ApplyError::MissingStepCount)?;
                apply_reset(bucket, env, env_ids, step, num_envs);
            }
            _ => {
                for term in &mut bucket.terms {
                    term.binding.invoke(env, env_ids, &term.cfg.params);
                }
            }
        }
        Ok(())
    }

    /// Active term names per mode, in declaration order.
    #[must_use]
    pub fn active_terms(&self) -> Vec<(&str, Vec<&str>)> {
        self.modes
            .iter()
            .map(|b| {
                (
                    b.mode.as_str(),
                    b.terms.iter().map(|t| t.name.as_str()).collect(),
                )
            })
            .collect()
    }

    /// Modes with at least one configured term.
    #[must_use]
    pub fn available_modes(&self) -> Vec<&str> {
        self.modes.iter().map(|b| b.mode.as_str()).collect()
    }

    /// Get a term's descriptor, searching all modes for the first match.
    pub fn get_term_cfg(&self, name: &str) -> Result<&EventTermCfg, TermNotFound> {
        self.modes
            .iter()
            .flat_map(|b| b.terms.iter())
            .find(|t| t.name == name)
            .map(|t| &t.cfg)
            .ok_or_else(|| TermNotFound(name.to_string()))
    }

    /// Replace a term's descriptor by name, re-validating only that term.
    ///
    /// The replacement must keep the term's mode; its auxiliary state
    /// (interval timer, last-triggered step) is re-initialized.
    pub fn set_term_cfg(
        &mut self,
        name: &str,
        cfg: EventTermCfg,
        registry: &TermRegistry,
        env: &SimEnv,
    ) -> Result<(), CorralError> {
        let num_envs = self.num_envs;
        for bucket in &mut self.modes {
            if let Some(index) = bucket.terms.iter().position(|t| t.name == name) {
                if cfg.mode != bucket.mode {
                    return Err(ConfigError::ModeMismatch {
                        term: name.to_string(),
                        expected: bucket.mode.clone(),
                        got: cfg.mode,
                    }
                    .into());
                }
                let binding = resolve_event(name, &cfg.func, &cfg.params, registry, env)?;
                let prepared = Self::prepare_term(
                    name.to_string(),
                    cfg,
                    binding,
                    num_envs,
                    &mut self.rng,
                )?;
                bucket.terms[index] = prepared;
                return Ok(());
            }
        }
        Err(TermNotFound(name.to_string()).into())
    }
}

fn sample_interval(range: (f32, f32), rng: &mut ChaCha8Rng) -> f32 {
    rng.gen_range(range.0..=range.1)
}

fn apply_interval(
    bucket: &mut ModeBucket,
    env: &mut SimEnv,
    env_ids: &EnvIds,
    dt: f32,
    num_envs: usize,
    rng: &mut ChaCha8Rng,
) {
    for term in &mut bucket.terms {
        let Some(timer) = &mut term.interval else {
            continue;
        };
        match timer {
            IntervalTimer::Global { time_left, range } => {
                *time_left -= dt;
                if *time_left > 0.0 {
                    continue;
                }
                *time_left = sample_interval(*range, rng);
                term.binding.invoke(env, env_ids, &term.cfg.params);
            }
            IntervalTimer::PerEnv { time_left, range } => {
                for t in time_left.iter_mut() {
                    *t -= dt;
                }
                // Fire exactly the selected environments whose interval
                // elapsed; each gets an independently resampled duration.
                let fired: Vec<usize> = (0..num_envs)
                    .filter(|&i| time_left[i] <= 0.0 && env_ids.contains(i))
                    .collect();
                if fired.is_empty() {
                    continue;
                }
                for &i in &fired {
                    time_left[i] = sample_interval(*range, rng);
                }
                let subset = EnvIds::Subset(fired);
                term.binding.invoke(env, &subset, &term.cfg.params);
            }
        }
    }
}

fn apply_reset(
    bucket: &mut ModeBucket,
    env: &mut SimEnv,
    env_ids: &EnvIds,
    global_step_count: u64,
    num_envs: usize,
) {
    for term in &mut bucket.terms {
        let min_steps = u64::from(term.cfg.min_step_count_between_reset);
        if min_steps == 0 {
            for i in env_ids.indices(num_envs) {
                term.last_triggered_step[i] = global_step_count;
            }
            term.binding.invoke(env, env_ids, &term.cfg.params);
        } else {
            let fired: Vec<usize> = env_ids
                .indices(num_envs)
                .into_iter()
                .filter(|&i| {
                    global_step_count.saturating_sub(term.last_triggered_step[i]) >= min_steps
                })
                .collect();
            if fired.is_empty() {
                continue;
            }
            for &i in &fired {
                term.last_triggered_step[i] = global_step_count;
            }
            let subset = EnvIds::Subset(fired);
            term.binding.invoke(env, &subset, &term.cfg.params);
        }
    }
}

impl Manager for EventManager {
    fn num_terms(&self) -> usize {
        self.modes.iter().map(|b| b.terms.len()).sum()
    }

    fn reset(&mut self, env_ids: &EnvIds) -> ResetMetrics {
        for bucket in &mut self.modes {
            for term in &mut bucket.terms {
                term.binding.reset(env_ids);
            }
        }
        ResetMetrics::new()
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("num_modes", &self.modes.len())
            .field("num_envs", &self.num_envs)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<EventManager> contains {} modes.", self.modes.len())?;
        for bucket in &self.modes {
            let title = format!("Active Event Terms in Mode: '{}'", bucket.mode);
            if bucket.mode == modes::INTERVAL {
                let mut table = TermTable::new(title, &["Index", "Name", "Interval range (s)"]);
                for (index, term) in bucket.terms.iter().enumerate() {
                    let range = term
                        .cfg
                        .interval_range_s
                        .map_or_else(String::new, |(lo, hi)| format!("({lo}, {hi})"));
                    table.row(vec![index.to_string(), term.name.clone(), range]);
                }
                write!(f, "{}", table.render())?;
            } else {
                let mut table = TermTable::new(title, &["Index", "Name"]);
                for (index, term) in bucket.terms.iter().enumerate() {
                    table.row(vec![index.to_string(), term.name.clone()]);
                }
                write!(f, "{}", table.render())?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
