// src/attestation/token_attestor.rs
//! Attestor that adds a fetched token to the request
//!
//! Requests to localhost and excluded URLs pass unchanged. On https URLs,
//! configured query parameters have their values replaced with secure
//! strings first. Then a token is fetched for the host and added under the
//! configured header. Network trouble fails the task with a retryable error
//! unless the policy says to proceed. After a usable status, configured
//! headers have their values replaced with secure strings.

use crate::attestation::policy::ProtectionPolicy;
use crate::attestation::request::OutgoingRequest;
use crate::attestation::token::{TokenFetchStatus, TokenFetcher};
use crate::attestation::Attestor;
use crate::utils::errors::ForcedFailure;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info};

type AttestResult = std::result::Result<OutgoingRequest, ForcedFailure>;

/// [`Attestor`] backed by a [`TokenFetcher`]
pub struct TokenAttestor<F: TokenFetcher> {
    fetcher: F,
    policy: Arc<ProtectionPolicy>,
}

impl<F: TokenFetcher> TokenAttestor<F> {
    pub fn new(fetcher: F, policy: Arc<ProtectionPolicy>) -> Self {
        Self { fetcher, policy }
    }

    pub fn policy(&self) -> &Arc<ProtectionPolicy> {
        &self.policy
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    async fn protect(&self, mut request: OutgoingRequest) -> AttestResult {
        let url = request.url();
        let host = request
            .host()
            .ok_or_else(|| ForcedFailure::permanent(format!("request has no host: {}", url)))?;

        if host == "localhost" {
            debug!("Localhost forwarded: {}", url);
            return Ok(request);
        }

        if self.policy.is_excluded(&request) {
            return Ok(request);
        }

        self.substitute_query_params(&mut request).await?;

        if let Some(binding) = self.policy.binding_header() {
            if let Some(value) = request.header_str(&binding) {
                self.fetcher.set_data_hash(value);
            }
        }

        let result = self.fetcher.fetch_token(&host).await;
        debug!("Token for {}: {} ({})", host, result.loggable_token(), result.status);

        if result.config_changed {
            info!("Dynamic configuration update received");
        }

        match result.status {
            TokenFetchStatus::Success => {
                let token = result.token.as_deref().ok_or_else(|| {
                    ForcedFailure::permanent(format!("token fetch for {}: SUCCESS without token", host))
                })?;
                let header = self.policy.token_header();
                request
                    .set_header(&header.name, &format!("{}{}", header.prefix, token))
                    .map_err(|e| ForcedFailure::permanent(e.to_string()))?;
            }
            status if status.is_network_failure() => {
                if !self.policy.proceed_on_network_fail() {
                    return Err(ForcedFailure::network(format!(
                        "token fetch for {}: {}",
                        host, status
                    )));
                }
                debug!("Proceeding without token for {}: {}", host, status);
            }
            status if status.allows_unprotected() => {}
            TokenFetchStatus::Rejected => {
                return Err(ForcedFailure::rejected(format!(
                    "token fetch for {}: REJECTED: {}",
                    host,
                    result.rejection_detail()
                )));
            }
            status => {
                return Err(ForcedFailure::permanent(format!(
                    "token fetch for {}: {}",
                    host, status
                )));
            }
        }

        // substitutions only on a trusted status, so secrets never go to an
        // unprotected domain
        if matches!(
            result.status,
            TokenFetchStatus::Success | TokenFetchStatus::UnprotectedUrl
        ) {
            self.substitute_headers(&mut request).await?;
        }

        Ok(request)
    }

    async fn substitute_query_params(&self, request: &mut OutgoingRequest) -> std::result::Result<(), ForcedFailure> {
        if request.uri().scheme_str() != Some("https") {
            return Ok(());
        }

        let mut url = request.url();
        let mut changed = false;

        for (param, pattern) in self.policy.substitution_query_params() {
            let Some((range, key)) = pattern
                .captures(&url)
                .and_then(|caps| caps.get(1))
                .map(|value| (value.range(), value.as_str().to_owned()))
            else {
                continue;
            };

            let result = self.fetcher.fetch_secure_string(&key).await;
            debug!("Substituting query parameter {}: {}", param, result.status);

            match result.status {
                TokenFetchStatus::Success => {
                    let secret = result.secure_string.as_deref().ok_or_else(|| {
                        ForcedFailure::permanent(format!(
                            "query parameter substitution for {}: SUCCESS without value",
                            param
                        ))
                    })?;
                    url.replace_range(range, secret);
                    changed = true;
                }
                TokenFetchStatus::Rejected => {
                    return Err(ForcedFailure::rejected(format!(
                        "query parameter substitution for {}: REJECTED: {}",
                        param,
                        result.rejection_detail()
                    )));
                }
                status if status.is_network_failure() => {
                    if !self.policy.proceed_on_network_fail() {
                        return Err(ForcedFailure::network(format!(
                            "query parameter substitution for {}: {}",
                            param, status
                        )));
                    }
                }
                TokenFetchStatus::UnknownKey => {}
                status => {
                    return Err(ForcedFailure::permanent(format!(
                        "query parameter substitution for {}: {}",
                        param, status
                    )));
                }
            }
        }

        if changed {
            request
                .set_url(&url)
                .map_err(|e| ForcedFailure::permanent(e.to_string()))?;
        }
        Ok(())
    }

    async fn substitute_headers(&self, request: &mut OutgoingRequest) -> std::result::Result<(), ForcedFailure> {
        for (header, prefix) in self.policy.substitution_headers() {
            let Some(value) = request.header_str(&header).map(str::to_owned) else {
                continue;
            };
            if !value.starts_with(&prefix) || value.len() <= prefix.len() {
                continue;
            }

            let key = &value[prefix.len()..];
            let result = self.fetcher.fetch_secure_string(key).await;
            debug!("Substituting header {}: {}", header, result.status);

            match result.status {
                TokenFetchStatus::Success => {
                    let secret = result.secure_string.as_deref().ok_or_else(|| {
                        ForcedFailure::permanent(format!(
                            "header substitution for {}: SUCCESS without value",
                            header
                        ))
                    })?;
                    request
                        .set_header(&header, &format!("{}{}", prefix, secret))
                        .map_err(|e| ForcedFailure::permanent(e.to_string()))?;
                }
                TokenFetchStatus::Rejected => {
                    return Err(ForcedFailure::rejected(format!(
                        "header substitution for {}: REJECTED: {}",
                        header,
                        result.rejection_detail()
                    )));
                }
                status if status.is_network_failure() => {
                    if !self.policy.proceed_on_network_fail() {
                        return Err(ForcedFailure::network(format!(
                            "header substitution for {}: {}",
                            header, status
                        )));
                    }
                }
                TokenFetchStatus::UnknownKey => {}
                status => {
                    return Err(ForcedFailure::permanent(format!(
                        "header substitution for {}: {}",
                        header, status
                    )));
                }
            }
        }

        Ok(())
    }
}

impl<F: TokenFetcher> Attestor for TokenAttestor<F> {
    fn attest(&self, request: OutgoingRequest) -> BoxFuture<'_, AttestResult> {
        self.protect(request).boxed()
    }
}
