//! Error types for kernel operations.

use std::path::Path;

/// Errors raised while parsing and validating a scenario suite.
///
/// Every variant is fatal for the whole suite: parsing never yields a
/// partially-validated result.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The suite (or a nested scenario) is not a JSON object.
    #[error("{context} must be a JSON object")]
    NotAnObject { context: String },

    /// A required field is absent or has the wrong JSON type.
    #[error("{context}: missing or invalid required field `{field}`")]
    MissingField { context: String, field: String },

    /// A field is present but carries an unusable value.
    #[error("{context}: invalid value for `{field}`: {reason}")]
    InvalidField {
        context: String,
        field: String,
        reason: String,
    },

    /// A check declares a `type` outside the closed set.
    #[error("{context}: unsupported check type `{value}`")]
    UnsupportedCheckType { context: String, value: String },

    /// A check declares a `severity` outside the closed set.
    #[error("{context}: unsupported check severity `{value}`")]
    UnsupportedSeverity { context: String, value: String },

    /// A step declares a `kind` outside `user|tool|wait`.
    #[error("{context}: unsupported step kind `{value}`")]
    UnsupportedStepKind { context: String, value: String },

    /// The scenario ID cannot be normalized to `^[A-Z][A-Z0-9_]*$`.
    #[error("scenario id `{raw}` cannot be normalized to an upper-snake identifier")]
    InvalidScenarioId { raw: String },

    /// The scenario declares no success-signature tokens.
    #[error("scenario {scenario_id}: expectations.success_signature must contain at least one token")]
    EmptySuccessSignature { scenario_id: String },

    /// Two or more scenarios normalize to the same ID.
    #[error("duplicate scenario ids after normalization: {}", ids.join(", "))]
    DuplicateScenarioIds { ids: Vec<String> },
}

/// Errors raised while loading a comparator profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read comparator profile {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse comparator profile {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid comparator profile: {0}")]
    Invalid(String),
}

/// Errors raised by stable-JSON encoding or writing.
#[derive(Debug, thiserror::Error)]
pub enum StableJsonError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },
}

impl StableJsonError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
