// src/attestation/mod.rs
//! Attestation collaborator
//!
//! The gate never calls attestation itself. After a suppressed resume the
//! caller runs an [`Attestor`], which either returns the request to send or a
//! [`ForcedFailure`] explaining why the task must not be sent.
//!
//! - **Request**: the outgoing request a protected task carries
//! - **Token**: fetch statuses and the [`TokenFetcher`] seam to the SDK
//! - **Policy**: token header, binding, exclusions and substitutions
//! - **Token Attestor**: an [`Attestor`] built on a [`TokenFetcher`]

pub mod policy;
pub mod request;
pub mod token;
pub mod token_attestor;

use crate::utils::errors::ForcedFailure;
use futures::future::BoxFuture;

pub use policy::{ProtectionPolicy, TokenHeader};
pub use request::OutgoingRequest;
pub use token::{TokenFetchResult, TokenFetchStatus, TokenFetcher};
pub use token_attestor::TokenAttestor;

/// Asynchronous attestation of an outgoing request
pub trait Attestor: Send + Sync + 'static {
    /// Produce the request to send, or the failure to deliver instead
    fn attest(
        &self,
        request: OutgoingRequest,
    ) -> BoxFuture<'_, std::result::Result<OutgoingRequest, ForcedFailure>>;
}
