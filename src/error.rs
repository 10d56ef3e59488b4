//! Error types for dlesolve.

use thiserror::Error;

/// Error type for dlesolve operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DleError {
    /// Unsupported problem variant or solver configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An option is unknown, has the wrong type, or an invalid value.
    #[error("Invalid option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    /// Options could not be parsed.
    #[error("Could not parse options: {0}")]
    OptionParse(String),

    /// No plugin registered under this name.
    #[error("Unknown solver: {0}")]
    UnknownSolver(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Function inputs or outputs are malformed.
    #[error("Invalid function: {0}")]
    InvalidFunction(String),

    /// An output depends on a symbol that is not a declared input.
    #[error("Free symbol '{0}' is not an input of the function")]
    FreeSymbol(String),

    /// A named input was not supplied.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// A supplied name does not match any input.
    #[error("Unknown input: {0}")]
    UnknownInput(String),

    /// A runtime assertion embedded in the graph failed.
    #[error("Assertion error: {0}")]
    AssertionFailed(String),

    /// A linear system embedded in the graph has a singular matrix.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),
}

impl DleError {
    pub(crate) fn shape_mismatch(expected: impl ToString, got: impl ToString) -> Self {
        DleError::ShapeMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub(crate) fn invalid_option(name: &str, reason: impl Into<String>) -> Self {
        DleError::InvalidOption {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for dlesolve operations.
pub type Result<T> = std::result::Result<T, DleError>;
