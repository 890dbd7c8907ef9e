//! Error taxonomy for the control plane.
//!
//! Validation problems are not errors: they travel as a
//! [`ValidationResult`](crate::validation::ValidationResult) value. Everything
//! here is a real failure of I/O, parsing, or an external collaborator.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, writing, or applying configuration.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Filesystem read or write failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A managed YAML document could not be parsed.
    #[error("{file}: {message}")]
    Parse { file: String, message: String },

    /// A restart, reload, or probe call did not succeed.
    #[error("{target}: {message}")]
    ExternalCall { target: String, message: String },

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// Restoring the snapshot during recovery failed. The live files may be
    /// inconsistent and need operator attention.
    #[error("apply error: {apply_error}; rollback error: {rollback_error}")]
    Rollback {
        apply_error: String,
        rollback_error: String,
    },

    /// No version in the history is marked successful.
    #[error("no successful version found")]
    NoSuccessfulVersion,

    /// The requested version has no snapshot on disk.
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    /// Alert rule input was rejected.
    #[error("invalid rule input: {0}")]
    InvalidRuleInput(String),

    /// A document could not be serialized back to text.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A background task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ControlError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn external(target: impl Into<String>, message: impl Into<String>) -> Self {
        ControlError::ExternalCall {
            target: target.into(),
            message: message.into(),
        }
    }

    /// True for failures of restart, reload, or probe calls (timeouts included).
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            ControlError::ExternalCall { .. } | ControlError::Timeout { .. }
        )
    }
}

/// Result type for control plane operations.
pub type ControlResult<T> = Result<T, ControlError>;
