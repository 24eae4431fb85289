//! Error types for todo
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (unknown task, bad ID, unparsable document, bad config)
//! - 3: Bulk edit applied to some tasks but not all
//! - 4: Operation failed (filesystem, malformed record, git, editor)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the todo CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const PARTIAL_FAILURE: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// One task that could not be updated during a bulk edit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Main error type for todo operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid task name {0:?} - must be /[0-9a-z_\\-]+/")]
    InvalidId(String),

    #[error("task already exists: {0}")]
    AlreadyExists(String),

    #[error("{}", .0.join("\n"))]
    Format(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Partial bulk application (exit code 3)
    #[error("updated {} of {} tasks; failed: {}", .succeeded.len(), .attempted.len(), failure_ids(.failures))]
    PartialBulkFailure {
        attempted: Vec<String>,
        succeeded: Vec<String>,
        failures: Vec<BulkFailure>,
    },

    // Operation failures (exit code 4)
    #[error("malformed task file: {0}")]
    Malformed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("invoking editor: {0}")]
    Editor(String),
}

fn failure_ids(failures: &[BulkFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotFound(_)
            | Error::InvalidId(_)
            | Error::AlreadyExists(_)
            | Error::Format(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            Error::PartialBulkFailure { .. } => exit_codes::PARTIAL_FAILURE,

            // Operation failures
            Error::Malformed(_)
            | Error::Io(_)
            | Error::Git(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Editor(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable class of the error, derived from its exit code.
    pub fn kind(&self) -> &'static str {
        match self.exit_code() {
            exit_codes::USER_ERROR => "user_error",
            exit_codes::PARTIAL_FAILURE => "partial_failure",
            _ => "operation_failed",
        }
    }

    /// Structured detail for JSON error output, when the error carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::PartialBulkFailure {
                attempted,
                succeeded,
                failures,
            } => Some(serde_json::json!({
                "attempted": attempted,
                "succeeded": succeeded,
                "failures": failures,
            })),
            Error::Format(messages) => Some(serde_json::json!({ "lines": messages })),
            _ => None,
        }
    }
}

/// Result type alias for todo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
