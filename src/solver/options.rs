//! Solver options: a string-keyed dictionary with typed schemas.
//!
//! Every plugin declares the options it understands as a static list of
//! [`OptionSpec`]s. User options are checked against the generic and plugin
//! schemas at construction: unknown keys and wrong types are rejected, and
//! defaults are filled in.
//!
//! ```
//! use dlesolve::solver::Options;
//!
//! let opts = Options::new().with("iter", 20).with("freq_doubling", true);
//! assert_eq!(opts.get("iter").and_then(|v| v.as_int()), Some(20));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DleError, Result};

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Real number.
    Float(f64),
    /// String.
    Str(String),
    /// Nested dictionary (e.g. options for a nested solver).
    Dict(Options),
}

impl OptionValue {
    /// Type of this value.
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Float(_) => OptionKind::Float,
            OptionValue::Str(_) => OptionKind::Str,
            OptionValue::Dict(_) => OptionKind::Dict,
        }
    }

    /// Get as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as a real number (integers are widened).
    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(f) => Some(*f),
            OptionValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a nested dictionary.
    pub fn as_dict(&self) -> Option<&Options> {
        match self {
            OptionValue::Dict(d) => Some(d),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<usize> for OptionValue {
    fn from(v: usize) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl From<Options> for OptionValue {
    fn from(v: Options) -> Self {
        OptionValue::Dict(v)
    }
}

/// Type tag of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Float,
    Str,
    Dict,
}

impl OptionKind {
    fn accepts(self, value: &OptionValue) -> bool {
        value.kind() == self || (self == OptionKind::Float && value.kind() == OptionKind::Int)
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKind::Bool => "boolean",
            OptionKind::Int => "integer",
            OptionKind::Float => "real",
            OptionKind::Str => "string",
            OptionKind::Dict => "dictionary",
        };
        f.write_str(name)
    }
}

/// Default value of an option, expressible in a `static` schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
    /// Empty dictionary.
    EmptyDict,
}

impl OptionDefault {
    fn to_value(self) -> OptionValue {
        match self {
            OptionDefault::Bool(b) => OptionValue::Bool(b),
            OptionDefault::Int(i) => OptionValue::Int(i),
            OptionDefault::Float(f) => OptionValue::Float(f),
            OptionDefault::Str(s) => OptionValue::Str(s.to_string()),
            OptionDefault::EmptyDict => OptionValue::Dict(Options::new()),
        }
    }
}

/// Declaration of one option a solver understands.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Key in the options dictionary.
    pub name: &'static str,
    /// Expected type.
    pub kind: OptionKind,
    /// Value used when the option is not set.
    pub default: OptionDefault,
    /// Human-readable description.
    pub description: &'static str,
}

/// Options understood by every DLE and LR-DLE solver.
pub const GENERIC_OPTIONS: &[OptionSpec] = &[OptionSpec {
    name: "pos_def",
    kind: OptionKind::Bool,
    default: OptionDefault::Bool(false),
    description: "Assume P positive definite",
}];

/// String-keyed option dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Options(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace an option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up an option.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Whether an option is set.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of options set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no option is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse options from a TOML table.
    ///
    /// ```
    /// use dlesolve::solver::Options;
    ///
    /// let opts = Options::from_toml_str("iter = 50\nfreq_doubling = true").unwrap();
    /// assert_eq!(opts.get("iter").and_then(|v| v.as_int()), Some(50));
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Options> {
        toml::from_str(s).map_err(|e| DleError::OptionParse(e.to_string()))
    }

    /// Check these options against `schemas` and fill in defaults.
    ///
    /// # Errors
    ///
    /// `InvalidOption` for keys no schema declares and for values of the wrong type.
    pub fn resolve(&self, schemas: &[&[OptionSpec]]) -> Result<Options> {
        let specs = || schemas.iter().flat_map(|s| s.iter());

        for (key, value) in self.iter() {
            let spec = specs().find(|s| s.name == key).ok_or_else(|| {
                let known: Vec<&str> = specs().map(|s| s.name).collect();
                DleError::invalid_option(key, format!("unknown option; known: {}", known.join(", ")))
            })?;
            if !spec.kind.accepts(value) {
                return Err(DleError::invalid_option(
                    key,
                    format!("expected {}, got {}", spec.kind, value.kind()),
                ));
            }
        }

        let mut resolved = self.clone();
        for spec in specs() {
            if !resolved.contains(spec.name) {
                resolved.set(spec.name, spec.default.to_value());
            }
        }
        Ok(resolved)
    }

    /// Boolean option that `resolve` guarantees to be present.
    pub(crate) fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(OptionValue::as_bool).unwrap_or(default)
    }

    /// Non-negative integer option.
    pub(crate) fn count(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => {
                let i = v
                    .as_int()
                    .ok_or_else(|| DleError::invalid_option(key, "expected integer"))?;
                usize::try_from(i)
                    .map_err(|_| DleError::invalid_option(key, format!("must be >= 0, got {}", i)))
            }
        }
    }
}

impl FromIterator<(String, OptionValue)> for Options {
    fn from_iter<T: IntoIterator<Item = (String, OptionValue)>>(iter: T) -> Self {
        Options(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[OptionSpec] = &[
        OptionSpec {
            name: "iter",
            kind: OptionKind::Int,
            default: OptionDefault::Int(100),
            description: "Number of iterations",
        },
        OptionSpec {
            name: "tol",
            kind: OptionKind::Float,
            default: OptionDefault::Float(1e-8),
            description: "Tolerance",
        },
    ];

    #[test]
    fn test_resolve_fills_defaults() {
        let opts = Options::new().resolve(&[GENERIC_OPTIONS, SPECS]).unwrap();
        assert_eq!(opts.get("iter"), Some(&OptionValue::Int(100)));
        assert_eq!(opts.get("pos_def"), Some(&OptionValue::Bool(false)));
        assert_eq!(opts.get("tol").and_then(|v| v.as_float()), Some(1e-8));
    }

    #[test]
    fn test_resolve_keeps_user_values() {
        let opts = Options::new()
            .with("iter", 7)
            .with("tol", 1)
            .resolve(&[SPECS])
            .unwrap();
        assert_eq!(opts.get("iter").and_then(|v| v.as_int()), Some(7));
        // integers are accepted for real options
        assert_eq!(opts.get("tol").and_then(|v| v.as_float()), Some(1.0));
    }

    #[test]
    fn test_unknown_option() {
        let err = Options::new().with("itr", 5).resolve(&[SPECS]).unwrap_err();
        assert!(matches!(err, DleError::InvalidOption { ref name, .. } if name == "itr"));
    }

    #[test]
    fn test_wrong_type() {
        let err = Options::new().with("iter", true).resolve(&[SPECS]).unwrap_err();
        assert!(matches!(err, DleError::InvalidOption { ref name, .. } if name == "iter"));
    }

    #[test]
    fn test_count() {
        let opts = Options::new().with("iter", -1);
        assert!(opts.count("iter", 100).is_err());
        assert_eq!(Options::new().count("iter", 100), Ok(100));
        assert_eq!(Options::new().with("iter", 3).count("iter", 100), Ok(3));
    }

    #[test]
    fn test_from_toml() {
        let opts = Options::from_toml_str(
            r#"
            lr_dle_solver = "fixed_smith"
            pos_def = false

            [lr_dle_solver_options]
            iter = 12
            "#,
        )
        .unwrap();
        assert_eq!(
            opts.get("lr_dle_solver").and_then(|v| v.as_str()),
            Some("fixed_smith")
        );
        let nested = opts.get("lr_dle_solver_options").and_then(|v| v.as_dict()).unwrap();
        assert_eq!(nested.get("iter").and_then(|v| v.as_int()), Some(12));
    }

    #[test]
    fn test_from_toml_error() {
        assert!(matches!(
            Options::from_toml_str("iter = "),
            Err(DleError::OptionParse(_))
        ));
    }
}
