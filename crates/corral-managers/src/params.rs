//! Term parameter values, mappings, and declared signatures.
//!
//! A term descriptor carries a [`TermParams`] mapping that is validated once
//! against the callable's declared [`TermSignature`] when the owning manager
//! is constructed. Call-time access can therefore rely on declared required
//! parameters being present.

use corral_core::error::ConfigError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

/// A single term parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Str(String),
    Floats(Vec<f32>),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<f32>> for ParamValue {
    fn from(v: Vec<f32>) -> Self {
        Self::Floats(v)
    }
}

// ---------------------------------------------------------------------------
// TermParams
// ---------------------------------------------------------------------------

/// Insertion-ordered parameter mapping for a term descriptor.
///
/// # Example
///
/// ```
/// use corral_managers::params::TermParams;
///
/// let params = TermParams::new()
///     .with("magnitude", 2.5_f32)
///     .with("additive", true);
/// assert!((params.float("magnitude") - 2.5).abs() < f32::EPSILON);
/// assert!(params.bool("additive"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermParams {
    entries: Vec<(String, ParamValue)>,
}

impl TermParams {
    /// Create an empty parameter mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builder: set a parameter, replacing any previous value under the key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
        self
    }

    /// Look up a parameter by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Parameter keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -- Typed accessors for declared (validated) parameters --
    //
    // These panic on missing/mistyped access: parameters are validated at
    // manager preparation time, so a failure here is a programming error in
    // the term body, not a data error.

    /// Required boolean parameter.
    ///
    /// # Panics
    ///
    /// Panics if the key is absent or not a `Bool`.
    #[must_use]
    pub fn bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(ParamValue::Bool(v)) => *v,
            _ => panic!("parameter '{key}' missing or not a bool"),
        }
    }

    /// Required integer parameter.
    ///
    /// # Panics
    ///
    /// Panics if the key is absent or not an `Int`.
    #[must_use]
    pub fn int(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(ParamValue::Int(v)) => *v,
            _ => panic!("parameter '{key}' missing or not an int"),
        }
    }

    /// Required float parameter.
    ///
    /// # Panics
    ///
    /// Panics if the key is absent or not a `Float`.
    #[must_use]
    pub fn float(&self, key: &str) -> f32 {
        match self.get(key) {
            Some(ParamValue::Float(v)) => *v,
            _ => panic!("parameter '{key}' missing or not a float"),
        }
    }

    /// Required string parameter.
    ///
    /// # Panics
    ///
    /// Panics if the key is absent or not a `Str`.
    #[must_use]
    pub fn str(&self, key: &str) -> &str {
        match self.get(key) {
            Some(ParamValue::Str(v)) => v,
            _ => panic!("parameter '{key}' missing or not a string"),
        }
    }

    /// Required float-list parameter.
    ///
    /// # Panics
    ///
    /// Panics if the key is absent or not a `Floats`.
    #[must_use]
    pub fn floats(&self, key: &str) -> &[f32] {
        match self.get(key) {
            Some(ParamValue::Floats(v)) => v,
            _ => panic!("parameter '{key}' missing or not a float list"),
        }
    }

    /// Optional boolean parameter.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Optional integer parameter.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Optional float parameter.
    #[must_use]
    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.get(key) {
            Some(ParamValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Optional string parameter.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(ParamValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Optional float-list parameter.
    #[must_use]
    pub fn get_floats(&self, key: &str) -> Option<&[f32]> {
        match self.get(key) {
            Some(ParamValue::Floats(v)) => Some(v.as_slice()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TermSignature
// ---------------------------------------------------------------------------

/// Declared parameter list of a term callable.
///
/// Replaces reflective callable introspection: every registered or inline
/// term definition states the parameter keys it accepts beyond the fixed
/// leading arguments, and the resolver checks the descriptor's mapping
/// against this declaration at preparation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermSignature {
    required: Vec<String>,
    optional: Vec<String>,
}

impl TermSignature {
    /// A signature accepting no parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            required: Vec::new(),
            optional: Vec::new(),
        }
    }

    /// Builder: declare required parameter keys.
    #[must_use]
    pub fn with_required(mut self, keys: &[&str]) -> Self {
        self.required
            .extend(keys.iter().map(ToString::to_string));
        self
    }

    /// Builder: declare optional parameter keys.
    #[must_use]
    pub fn with_optional(mut self, keys: &[&str]) -> Self {
        self.optional
            .extend(keys.iter().map(ToString::to_string));
        self
    }

    /// Declared required keys.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Declared optional keys.
    #[must_use]
    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// Check a descriptor's parameter mapping against this signature.
    ///
    /// Every required key must be supplied, and every supplied key must be
    /// declared (required or optional).
    pub fn validate(&self, term: &str, params: &TermParams) -> Result<(), ConfigError> {
        for key in &self.required {
            if params.get(key).is_none() {
                return Err(ConfigError::MissingParam {
                    term: term.to_string(),
                    param: key.clone(),
                });
            }
        }
        for key in params.keys() {
            if !self.required.iter().any(|k| k == key)
                && !self.optional.iter().any(|k| k == key)
            {
                return Err(ConfigError::UnknownParam {
                    term: term.to_string(),
                    param: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
