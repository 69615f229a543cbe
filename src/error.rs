//! Error types for mixlora-config.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, MixLoraError>;

/// Errors that can occur while importing, validating, or exporting adapter
/// configurations.
///
/// All errors are raised eagerly at the point of detection; nothing is
/// retried or recovered internally.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MixLoraError {
    /// A required key is absent from the persisted dictionary.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A key is present but has the wrong shape or type.
    #[error("malformed field `{field}`: {message}")]
    MalformedField {
        /// Name of the offending key
        field: &'static str,
        /// What was wrong with the value
        message: String,
    },

    /// The dictionary's `peft_type` does not identify this adapter family.
    #[error("adapter type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The `peft_type` this schema accepts
        expected: &'static str,
        /// The `peft_type` found in the input
        actual: String,
    },

    /// The routing strategy is outside the supported set.
    #[error("unsupported routing strategy: {0}")]
    UnsupportedStrategy(String),

    /// A field value violates its constraint.
    #[error("invalid configuration: {field} {message}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        /// The violated constraint
        message: &'static str,
    },
}
