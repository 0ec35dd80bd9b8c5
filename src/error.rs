//! Error types for the sysmcp server.
//!
//! Two families: request-time errors, which are always caught at the
//! dispatcher boundary and encoded as protocol error responses, and
//! registration-time errors (`DuplicateName`, `InvalidPattern`), which are
//! fatal during startup and abort the process before any request is served.

use thiserror::Error;

/// All errors the capability server can produce.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Unknown capability name or unmatched resource URI.
    #[error("not found: {target}")]
    NotFound { target: String },

    /// Malformed or disallowed arguments.
    #[error("{reason}")]
    Validation { reason: String },

    /// An underlying command failed with diagnostic stderr.
    #[error("{stderr}")]
    Execution { stderr: String },

    /// An underlying command exceeded its bounded wait.
    #[error("command '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// Unexpected handler fault (panic or untyped failure).
    #[error("internal error: {message}")]
    Internal { message: String },

    /// Registration-time: a `(kind, name)` pair was registered twice.
    #[error("duplicate {kind} registration: '{name}'")]
    DuplicateName { kind: String, name: String },

    /// Registration-time: a resource URI template failed to parse.
    #[error("invalid resource pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl ServerError {
    /// Construct a `NotFound` error for a capability name or URI.
    pub fn not_found(target: impl Into<String>) -> Self {
        ServerError::NotFound {
            target: target.into(),
        }
    }

    /// Construct a `Validation` error.
    pub fn validation(reason: impl Into<String>) -> Self {
        ServerError::Validation {
            reason: reason.into(),
        }
    }

    /// Construct an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        ServerError::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable kind string, exposed on the wire in the
    /// error response's `data.kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::NotFound { .. } => "not_found",
            ServerError::Validation { .. } => "validation",
            ServerError::Execution { .. } => "execution",
            ServerError::Timeout { .. } => "timeout",
            ServerError::Internal { .. } => "internal",
            ServerError::DuplicateName { .. } => "duplicate_name",
            ServerError::InvalidPattern { .. } => "invalid_pattern",
        }
    }

    /// JSON-RPC error code for this error.
    ///
    /// Domain errors use the implementation-defined `-32000..-32099` range;
    /// registration-time variants never reach the wire but map anyway so
    /// the conversion is total.
    pub fn code(&self) -> i64 {
        match self {
            ServerError::NotFound { .. } => -32001,
            ServerError::Validation { .. } => -32002,
            ServerError::Execution { .. } => -32003,
            ServerError::Timeout { .. } => -32004,
            ServerError::Internal { .. } => -32005,
            ServerError::DuplicateName { .. } | ServerError::InvalidPattern { .. } => -32006,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = ServerError::not_found("tools/frobnicate");
        assert_eq!(e.to_string(), "not found: tools/frobnicate");

        let e = ServerError::validation("disallowed operation: -S");
        assert_eq!(e.to_string(), "disallowed operation: -S");

        let e = ServerError::Execution {
            stderr: "Unit sshd.service not found.".to_string(),
        };
        assert_eq!(e.to_string(), "Unit sshd.service not found.");
    }

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(ServerError::not_found("x").kind(), "not_found");
        assert_eq!(ServerError::validation("x").kind(), "validation");
        assert_eq!(
            ServerError::Timeout {
                command: "sleep".into(),
                seconds: 30
            }
            .kind(),
            "timeout"
        );
        assert_eq!(ServerError::internal("x").kind(), "internal");
    }

    #[test]
    fn test_codes_are_distinct_for_request_time_errors() {
        use std::collections::HashSet;
        let codes: HashSet<i64> = [
            ServerError::not_found("x").code(),
            ServerError::validation("x").code(),
            ServerError::Execution { stderr: "x".into() }.code(),
            ServerError::Timeout {
                command: "x".into(),
                seconds: 1,
            }
            .code(),
            ServerError::internal("x").code(),
        ]
        .into_iter()
        .collect();
        assert_eq!(codes.len(), 5);
    }
}
