// src/lib.rs
//! Attest Gate
//!
//! Intercepts the resume of network tasks that need an attestation token, so
//! the token can be fetched asynchronously without blocking the thread that
//! started the task.
//!
//! # Architecture
//!
//! - **interception**: task identities, the interception table and the resume gate
//! - **attestation**: outgoing requests, token fetch results and the token attestor
//! - **service**: wires the gate and an attestor on a tokio runtime
//! - **observability**: tracing and metrics bootstrap
//! - **utils**: configuration and error types
//!
//! # Example
//!
//! ```
//! use attest_gate::{ForcedFailure, NetworkTask, ResumeGate, TaskIdentity};
//!
//! struct Task(TaskIdentity);
//!
//! impl NetworkTask for Task {
//!     fn identity(&self) -> TaskIdentity { self.0 }
//!     fn resume_now(&self) {}
//!     fn complete_with_error(&self, _failure: ForcedFailure) {}
//! }
//!
//! let gate = ResumeGate::new();
//! let task = Task(TaskIdentity::next());
//! gate.mark_for_protection(&task, Box::new(|_| {})).unwrap();
//!
//! assert!(!gate.should_execute_resume(&task)); // attestation starts here
//! assert!(gate.should_execute_resume(&task)); // attested, send it
//! ```

pub mod attestation;
pub mod interception;
pub mod observability;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use attestation::{Attestor, OutgoingRequest, ProtectionPolicy, TokenAttestor, TokenFetcher};
pub use interception::{
    CompletionCallback, InterceptionTable, NetworkTask, ResumeDecision, ResumeGate, TaskIdentity,
};
pub use service::{ProtectedTask, ProtectionService, ResumeOutcome};
pub use utils::config::GateConfig;
pub use utils::errors::{FailureKind, ForcedFailure, GateError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
