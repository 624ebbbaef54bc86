//! Custom error types for the sequence engine.
//!
//! This module defines `SequenceError`, the single error type returned by
//! sequence construction, enumeration, event building and (de)serialization.
//! Using the `thiserror` crate, it keeps error reporting consistent and lets
//! callers propagate everything with the `?` operator.
//!
//! ## Error Hierarchy
//!
//! - **Construction** (`DuplicateAxisKeys`, `DuplicateAxisOrder`,
//!   `MissingOverrideValue`, `InvalidAxis`, `LegacyAndAxes`): raised when a
//!   sequence is built or deserialized, never halfway through an enumeration
//!   (except `MissingOverrideValue` for custom axes that only reveal their
//!   nested sequences while iterating).
//! - **Merge** (`ConflictingField`): two axes contributed different values for
//!   the same non-position event field.
//! - **Consumer misuse** (`Unbounded`): a definite size was requested from a
//!   sequence containing an axis without an end.
//! - **I/O** (`Io`, `Json`, `Yaml`, `TomlDe`, `TomlSer`, `UnsupportedFormat`):
//!   reading and writing serialized sequences.

use thiserror::Error;

/// Convenience alias for results using the engine error type.
pub type AppResult<T> = std::result::Result<T, SequenceError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Duplicate axis keys in sequence: {}", .0.join(", "))]
    DuplicateAxisKeys(Vec<String>),

    #[error("axis_order contains duplicate keys: {}", .0.join(", "))]
    DuplicateAxisOrder(Vec<String>),

    #[error("Nested sequence yielded by axis '{axis}' has no value")]
    MissingOverrideValue { axis: String },

    #[error("Conflicting values for event field '{field}' (contributed by axis '{axis}')")]
    ConflictingField { field: &'static str, axis: String },

    #[error("Cannot determine {what}: axis '{axis}' is unbounded")]
    Unbounded { what: &'static str, axis: String },

    #[error("Invalid axis '{axis}': {reason}")]
    InvalidAxis { axis: String, reason: String },

    #[error("Sequence declares both 'axes' and legacy plan fields: {0}")]
    LegacyAndAxes(String),

    #[error("Unsupported sequence file format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl SequenceError {
    /// Shorthand for [`SequenceError::InvalidAxis`].
    pub fn invalid_axis(axis: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAxis {
            axis: axis.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised while validating a sequence definition.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateAxisKeys(_)
                | Self::DuplicateAxisOrder(_)
                | Self::MissingOverrideValue { .. }
                | Self::InvalidAxis { .. }
                | Self::LegacyAndAxes(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_keys_message_lists_keys() {
        let err = SequenceError::DuplicateAxisKeys(vec!["t".into(), "c".into()]);
        assert_eq!(err.to_string(), "Duplicate axis keys in sequence: t, c");
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_unbounded_is_not_construction_error() {
        let err = SequenceError::Unbounded {
            what: "sizes",
            axis: "t".into(),
        };
        assert!(!err.is_construction_error());
        assert!(err.to_string().contains("unbounded"));
    }
}
