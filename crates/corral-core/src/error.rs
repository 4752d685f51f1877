use thiserror::Error;

/// Top-level error type for the Corral manager engine.
#[derive(Debug, Error)]
pub enum CorralError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lookup error: {0}")]
    TermNotFound(#[from] TermNotFound),

    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),
}

/// Preparation-time configuration errors.
///
/// All variants are raised while a manager is being constructed (or while a
/// single term is replaced via `set_term_cfg`), never during `compute`/`apply`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {kind} term function registered under key '{key}'")]
    UnregisteredFunc { kind: &'static str, key: String },

    #[error("{kind} term function '{key}' is already registered")]
    DuplicateRegistration { kind: &'static str, key: String },

    #[error("duplicate term name '{name}'")]
    DuplicateTerm { name: String },

    #[error("term '{term}' is missing required parameter '{param}'")]
    MissingParam { term: String, param: String },

    #[error("term '{term}' received unknown parameter '{param}'")]
    UnknownParam { term: String, param: String },

    #[error("term '{term}' has mode 'interval' but no interval range")]
    MissingIntervalRange { term: String },

    #[error("term '{term}' has invalid interval range [{lower}, {upper}]")]
    InvalidIntervalRange { term: String, lower: f32, upper: f32 },

    #[error("term '{term}' is configured for mode '{expected}', cannot move it to mode '{got}'")]
    ModeMismatch {
        term: String,
        expected: String,
        got: String,
    },

    #[error(
        "group '{group}': term '{term}' output shape {shape:?} cannot be concatenated \
         (more than one free axis)"
    )]
    NotConcatenable {
        group: String,
        term: String,
        shape: Vec<usize>,
    },

    #[error("term '{term}' produced batch dimension {got}, expected {expected} environments")]
    BatchDimMismatch {
        term: String,
        expected: usize,
        got: usize,
    },
}

/// A `get_term_cfg`/`set_term_cfg` lookup did not match any configured term.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("term '{0}' not found")]
pub struct TermNotFound(pub String);

/// Caller-contract violations on `EventManager::apply`.
///
/// These indicate a programming error in the driving loop, not a data error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("event mode 'interval' requires the environment time-step")]
    MissingDt,

    #[error("event mode 'reset' requires the global environment step count")]
    MissingStepCount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corral_error_from_config_error() {
        let err = ConfigError::DuplicateTerm {
            name: "push_robot".into(),
        };
        let corral_err: CorralError = err.into();
        assert!(matches!(corral_err, CorralError::Config(_)));
        assert!(corral_err.to_string().contains("push_robot"));
    }

    #[test]
    fn corral_error_from_term_not_found() {
        let err = TermNotFound("joint_pos".into());
        let corral_err: CorralError = err.into();
        assert!(matches!(corral_err, CorralError::TermNotFound(_)));
        assert!(corral_err.to_string().contains("joint_pos"));
    }

    #[test]
    fn corral_error_from_apply_error() {
        let err = ApplyError::MissingDt;
        let corral_err: CorralError = err.into();
        assert!(matches!(corral_err, CorralError::Apply(_)));
        assert!(corral_err.to_string().contains("time-step"));
    }

    #[test]
    fn apply_error_is_copy() {
        let err = ApplyError::MissingStepCount;
        let err2 = err; // Copy
        assert_eq!(err, err2);
    }

    #[test]
    fn config_error_display_messages() {
        assert_eq!(
            ConfigError::UnregisteredFunc {
                kind: "observation",
                key: "joint_pos".into()
            }
            .to_string(),
            "no observation term function registered under key 'joint_pos'"
        );
        assert_eq!(
            ConfigError::DuplicateRegistration {
                kind: "event",
                key: "push".into()
            }
            .to_string(),
            "event term function 'push' is already registered"
        );
        assert_eq!(
            ConfigError::DuplicateTerm {
                name: "base_vel".into()
            }
            .to_string(),
            "duplicate term name 'base_vel'"
        );
        assert_eq!(
            ConfigError::MissingParam {
                term: "push".into(),
                param: "magnitude".into()
            }
            .to_string(),
            "term 'push' is missing required parameter 'magnitude'"
        );
        assert_eq!(
            ConfigError::UnknownParam {
                term: "push".into(),
                param: "magnitudo".into()
            }
            .to_string(),
            "term 'push' received unknown parameter 'magnitudo'"
        );
        assert_eq!(
            ConfigError::MissingIntervalRange {
                term: "gravity_shift".into()
            }
            .to_string(),
            "term 'gravity_shift' has mode 'interval' but no interval range"
        );
        assert_eq!(
            ConfigError::InvalidIntervalRange {
                term: "gravity_shift".into(),
                lower: 2.0,
                upper: 1.0
            }
            .to_string(),
            "term 'gravity_shift' has invalid interval range [2, 1]"
        );
        assert_eq!(
            ConfigError::ModeMismatch {
                term: "push".into(),
                expected: "interval".into(),
                got: "reset".into()
            }
            .to_string(),
            "term 'push' is configured for mode 'interval', cannot move it to mode 'reset'"
        );
        assert_eq!(
            ConfigError::BatchDimMismatch {
                term: "joint_pos".into(),
                expected: 16,
                got: 4
            }
            .to_string(),
            "term 'joint_pos' produced batch dimension 4, expected 16 environments"
        );
    }

    #[test]
    fn not_concatenable_display_includes_shape() {
        let msg = ConfigError::NotConcatenable {
            group: "policy".into(),
            term: "camera".into(),
            shape: vec![4, 128, 256, 3],
        }
        .to_string();
        assert!(msg.contains("policy"));
        assert!(msg.contains("camera"));
        assert!(msg.contains("[4, 128, 256, 3]"));
    }

    #[test]
    fn term_not_found_display() {
        assert_eq!(
            TermNotFound("nonexistent".into()).to_string(),
            "term 'nonexistent' not found"
        );
    }

    #[test]
    fn apply_error_display_messages() {
        assert_eq!(
            ApplyError::MissingDt.to_string(),
            "event mode 'interval' requires the environment time-step"
        );
        assert_eq!(
            ApplyError::MissingStepCount.to_string(),
            "event mode 'reset' requires the global environment step count"
        );
    }
}
