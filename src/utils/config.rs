// src/utils/config.rs
//! Layered configuration
//!
//! Values come from an optional file (`attest-gate.toml`, `.yaml` or `.json`,
//! or the path named by `ATTEST_GATE_CONFIG`) overridden by environment
//! variables such as `ATTEST_GATE_PROTECTION__TOKEN_HEADER`.

use crate::attestation::policy::compile_exclusion;
use crate::utils::errors::{GateError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "ATTEST_GATE";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "ATTEST_GATE_CONFIG";

const DEFAULT_CONFIG_NAME: &str = "attest-gate";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub protection: ProtectionConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// How attestation results are applied to outgoing requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Header carrying the attestation token
    pub token_header: String,

    /// Prepended to the token value, e.g. "Bearer "
    pub token_prefix: String,

    /// Header whose value is bound into the token
    pub binding_header: Option<String>,

    /// Send without a token when the token fetch hits network trouble
    pub proceed_on_network_fail: bool,

    /// Regexes searched in the full URL; a match skips attestation
    pub exclusion_patterns: Vec<String>,

    /// Header name -> required value prefix for secure string substitution
    pub substitution_headers: HashMap<String, String>,

    /// Query parameters whose values are secure string keys
    pub substitution_query_params: Vec<String>,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            token_header: "Attestation-Token".to_string(),
            token_prefix: String::new(),
            binding_header: None,
            proceed_on_network_fail: false,
            exclusion_patterns: Vec::new(),
            substitution_headers: HashMap::new(),
            substitution_query_params: Vec::new(),
        }
    }
}

/// Protection service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound on one attestation; unset means wait indefinitely
    pub attestation_timeout_ms: Option<u64>,

    /// Capacity of the gate event log
    pub event_log_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            attestation_timeout_ms: None,
            event_log_capacity: 4096,
        }
    }
}

impl ServiceConfig {
    pub fn attestation_timeout(&self) -> Option<Duration> {
        self.attestation_timeout_ms.map(Duration::from_millis)
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl GateConfig {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self> {
        let builder = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => config::Config::builder().add_source(config::File::with_name(&path)),
            Err(_) => config::Config::builder()
                .add_source(config::File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        let config: GateConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Load from an explicit file, without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: GateConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gate cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.protection.token_header.trim().is_empty() {
            return Err(GateError::ConfigError(
                "protection.token_header cannot be empty".to_string(),
            ));
        }

        for pattern in &self.protection.exclusion_patterns {
            compile_exclusion(pattern)?;
        }

        if self.service.event_log_capacity == 0 {
            return Err(GateError::ConfigError(
                "service.event_log_capacity must be at least 1".to_string(),
            ));
        }

        if self.service.attestation_timeout_ms == Some(0) {
            return Err(GateError::ConfigError(
                "service.attestation_timeout_ms cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}
