//! Error types for trackzero
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (empty text, unknown task id, bad args, not signed in)
//! - 4: Operation failed (I/O, serialization, lock contention)
//!
//! Remote failures never reach the user from a mutation: the synchronizer
//! logs them and keeps operating on local state.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the trackzero CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for trackzero operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not signed in")]
    NotSignedIn,

    // Operation failures (exit code 4)
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidInput(_)
            | Error::NotFound(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::NotSignedIn => exit_codes::USER_ERROR,

            Error::RemoteUnavailable(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured context for machine output, when the message alone
    /// loses it.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::LockFailed(path) => Some(serde_json::json!({ "lock_path": path })),
            Error::Io(err) => Some(serde_json::json!({ "io_kind": err.kind().to_string() })),
            _ => None,
        }
    }
}

/// Result type alias for trackzero operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
