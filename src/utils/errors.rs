// src/utils/errors.rs
//! Error types for the gate, the attestation adapter and configuration.

use crate::interception::task_identity::TaskIdentity;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors surfaced to callers of the gate and the protection service
#[derive(Debug, Error)]
pub enum GateError {
    /// Caller contract bug, e.g. registering the same task twice
    #[error("protocol violation for {identity}: {detail}")]
    ProtocolViolation {
        identity: TaskIdentity,
        detail: String,
    },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("export failed: {0}")]
    ExportFailed(String),
}

impl From<config::ConfigError> for GateError {
    fn from(err: config::ConfigError) -> Self {
        GateError::ConfigError(err.to_string())
    }
}

/// Why a forced failure was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Attestation service rejected the app instance
    Rejected,

    /// Token could not be fetched because of network conditions
    Network,

    /// Any other unrecoverable attestation status
    Permanent,

    /// Sending was forbidden before the task reached the network
    Precondition,

    /// Attestation did not finish within the configured window
    Timeout,

    /// Attestation was dropped before it finished
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Rejected => "rejected",
            FailureKind::Network => "network",
            FailureKind::Permanent => "permanent",
            FailureKind::Precondition => "precondition",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A deliberate failure that replaces the network send of a task.
///
/// Delivered exactly once, either through the completion callback stored at
/// registration or through [`NetworkTask::complete_with_error`].
///
/// [`NetworkTask::complete_with_error`]: crate::interception::NetworkTask::complete_with_error
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct ForcedFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ForcedFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Permanent, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Precondition, message)
    }

    /// Network failures may be retried by the user later
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Network | FailureKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_failure_display() {
        let failure = ForcedFailure::rejected("device rooted");
        assert_eq!(failure.to_string(), "rejected: device rooted");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ForcedFailure::network("no network").is_retryable());
        assert!(ForcedFailure::new(FailureKind::Timeout, "slow").is_retryable());
        assert!(!ForcedFailure::permanent("bad url").is_retryable());
        assert!(!ForcedFailure::precondition("disabled").is_retryable());
    }

    #[test]
    fn test_protocol_violation_message() {
        let err = GateError::ProtocolViolation {
            identity: TaskIdentity::from_raw(7),
            detail: "already registered".to_string(),
        };
        assert_eq!(err.to_string(), "protocol violation for task-7: already registered");
    }
}
