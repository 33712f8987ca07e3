// src/attestation/policy.rs
//! Protection policy
//!
//! Runtime-adjustable rules for applying attestation to a request: which
//! header carries the token, which header is bound into it, which URLs are
//! excluded, and which headers and query parameters have their values
//! substituted with secure strings.

use crate::attestation::request::OutgoingRequest;
use crate::utils::config::ProtectionConfig;
use crate::utils::errors::{GateError, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Token header name and value prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    pub name: String,
    pub prefix: String,
}

/// Compile an exclusion pattern, searched anywhere in the full URL
pub fn compile_exclusion(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        GateError::ConfigError(format!("invalid exclusion pattern {}: {}", pattern, e))
    })
}

/// Pattern whose first group is the value of query parameter `key`
fn compile_query_param(key: &str) -> Result<Regex> {
    Regex::new(&format!(r"[?&]{}=([^&;]+)", regex::escape(key))).map_err(|e| {
        GateError::ConfigError(format!("invalid query parameter {}: {}", key, e))
    })
}

/// Rules for protecting outgoing requests
pub struct ProtectionPolicy {
    token_header: RwLock<TokenHeader>,
    binding_header: RwLock<Option<String>>,
    proceed_on_network_fail: AtomicBool,
    exclusions: DashMap<String, Regex>,
    substitution_headers: DashMap<String, String>,
    substitution_query_params: DashMap<String, Regex>,
}

impl ProtectionPolicy {
    /// Build from configuration; fails on an invalid exclusion pattern
    pub fn from_config(config: &ProtectionConfig) -> Result<Self> {
        let policy = Self::with_settings(config);

        for pattern in &config.exclusion_patterns {
            policy.add_exclusion(pattern)?;
        }
        for (header, prefix) in &config.substitution_headers {
            policy.add_substitution_header(header, prefix);
        }
        for key in &config.substitution_query_params {
            policy.add_substitution_query_param(key)?;
        }

        Ok(policy)
    }

    fn with_settings(config: &ProtectionConfig) -> Self {
        Self {
            token_header: RwLock::new(TokenHeader {
                name: config.token_header.clone(),
                prefix: config.token_prefix.clone(),
            }),
            binding_header: RwLock::new(config.binding_header.clone()),
            proceed_on_network_fail: AtomicBool::new(config.proceed_on_network_fail),
            exclusions: DashMap::new(),
            substitution_headers: DashMap::new(),
            substitution_query_params: DashMap::new(),
        }
    }

    pub fn token_header(&self) -> TokenHeader {
        self.token_header.read().clone()
    }

    pub fn set_token_header(&self, name: impl Into<String>, prefix: impl Into<String>) {
        let header = TokenHeader {
            name: name.into(),
            prefix: prefix.into(),
        };
        debug!("Token header set to {} (prefix {:?})", header.name, header.prefix);
        *self.token_header.write() = header;
    }

    pub fn binding_header(&self) -> Option<String> {
        self.binding_header.read().clone()
    }

    pub fn set_binding_header(&self, header: Option<String>) {
        debug!("Binding header set to {:?}", header);
        *self.binding_header.write() = header;
    }

    pub fn proceed_on_network_fail(&self) -> bool {
        self.proceed_on_network_fail.load(Ordering::Acquire)
    }

    pub fn set_proceed_on_network_fail(&self, proceed: bool) {
        self.proceed_on_network_fail.store(proceed, Ordering::Release);
    }

    /// Add a URL exclusion regex; a match anywhere in the URL excludes it
    pub fn add_exclusion(&self, pattern: &str) -> Result<()> {
        let regex = compile_exclusion(pattern)?;
        info!("Adding exclusion: {}", pattern);
        self.exclusions.insert(pattern.to_string(), regex);
        Ok(())
    }

    /// Remove an exclusion by its source pattern
    pub fn remove_exclusion(&self, pattern: &str) -> Result<()> {
        if self.exclusions.remove(pattern).is_some() {
            info!("Removed exclusion: {}", pattern);
            Ok(())
        } else {
            Err(GateError::ConfigError(format!(
                "No exclusion found for pattern: {}",
                pattern
            )))
        }
    }

    /// True if the request must go out without attestation
    pub fn is_excluded(&self, request: &OutgoingRequest) -> bool {
        let url = request.url();
        let excluded = self
            .exclusions
            .iter()
            .any(|entry| entry.value().is_match(&url));
        if excluded {
            debug!("Excluded url: {}", url);
        }
        excluded
    }

    /// Substitute values of `header` that start with `required_prefix`
    pub fn add_substitution_header(&self, header: &str, required_prefix: &str) {
        debug!("Adding substitution header {} (prefix {:?})", header, required_prefix);
        self.substitution_headers
            .insert(header.to_string(), required_prefix.to_string());
    }

    pub fn remove_substitution_header(&self, header: &str) -> bool {
        self.substitution_headers.remove(header).is_some()
    }

    /// Snapshot of (header, required prefix) pairs
    pub fn substitution_headers(&self) -> Vec<(String, String)> {
        self.substitution_headers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Substitute the value of query parameter `key` with a secure string
    pub fn add_substitution_query_param(&self, key: &str) -> Result<()> {
        let regex = compile_query_param(key)?;
        debug!("Adding substitution query parameter {}", key);
        self.substitution_query_params.insert(key.to_string(), regex);
        Ok(())
    }

    pub fn remove_substitution_query_param(&self, key: &str) -> bool {
        self.substitution_query_params.remove(key).is_some()
    }

    /// Snapshot of (parameter, value pattern) pairs
    pub fn substitution_query_params(&self) -> Vec<(String, Regex)> {
        self.substitution_query_params
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self::with_settings(&ProtectionConfig::default())
    }
}
