// src/attestation/token.rs
//! Token fetch results and the fetcher seam to the attestation SDK

use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;

/// Status reported by the attestation SDK for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenFetchStatus {
    Success,
    NoNetwork,
    PoorNetwork,
    MitmDetected,
    NoAttestationService,
    UnknownUrl,
    UnprotectedUrl,
    Rejected,
    UnknownKey,
    BadUrl,
    InternalError,
}

impl TokenFetchStatus {
    /// Failures caused by network conditions; the user may retry later
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            TokenFetchStatus::NoNetwork | TokenFetchStatus::PoorNetwork | TokenFetchStatus::MitmDetected
        )
    }

    /// Statuses where the request may go out without a token
    pub fn allows_unprotected(&self) -> bool {
        matches!(
            self,
            TokenFetchStatus::NoAttestationService
                | TokenFetchStatus::UnknownUrl
                | TokenFetchStatus::UnprotectedUrl
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenFetchStatus::Success => "SUCCESS",
            TokenFetchStatus::NoNetwork => "NO_NETWORK",
            TokenFetchStatus::PoorNetwork => "POOR_NETWORK",
            TokenFetchStatus::MitmDetected => "MITM_DETECTED",
            TokenFetchStatus::NoAttestationService => "NO_ATTESTATION_SERVICE",
            TokenFetchStatus::UnknownUrl => "UNKNOWN_URL",
            TokenFetchStatus::UnprotectedUrl => "UNPROTECTED_URL",
            TokenFetchStatus::Rejected => "REJECTED",
            TokenFetchStatus::UnknownKey => "UNKNOWN_KEY",
            TokenFetchStatus::BadUrl => "BAD_URL",
            TokenFetchStatus::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for TokenFetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a token or secure string fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFetchResult {
    pub status: TokenFetchStatus,

    /// Attestation token on success
    pub token: Option<String>,

    /// Secure string value on a successful secure string fetch
    pub secure_string: Option<String>,

    /// Attestation response code, present on rejection
    pub arc: Option<String>,

    /// Human-readable rejection reasons
    pub rejection_reasons: Option<String>,

    /// A dynamic configuration update arrived with this result
    pub config_changed: bool,
}

impl TokenFetchResult {
    pub fn with_status(status: TokenFetchStatus) -> Self {
        Self {
            status,
            token: None,
            secure_string: None,
            arc: None,
            rejection_reasons: None,
            config_changed: false,
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::with_status(TokenFetchStatus::Success)
        }
    }

    pub fn secure_string(value: impl Into<String>) -> Self {
        Self {
            secure_string: Some(value.into()),
            ..Self::with_status(TokenFetchStatus::Success)
        }
    }

    pub fn rejected(arc: impl Into<String>, reasons: impl Into<String>) -> Self {
        Self {
            arc: Some(arc.into()),
            rejection_reasons: Some(reasons.into()),
            ..Self::with_status(TokenFetchStatus::Rejected)
        }
    }

    /// Token shortened for logs
    pub fn loggable_token(&self) -> String {
        match &self.token {
            Some(token) if token.len() > 8 => {
                let cut = token
                    .char_indices()
                    .nth(8)
                    .map(|(idx, _)| idx)
                    .unwrap_or(token.len());
                format!("{}...", &token[..cut])
            }
            Some(token) => token.clone(),
            None => "<none>".to_string(),
        }
    }

    /// "ARC reasons" description for a rejection
    pub fn rejection_detail(&self) -> String {
        format!(
            "{} {}",
            self.arc.as_deref().unwrap_or(""),
            self.rejection_reasons.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Seam to the attestation SDK
pub trait TokenFetcher: Send + Sync + 'static {
    /// Fetch an attestation token for `host`
    fn fetch_token<'a>(&'a self, host: &'a str) -> BoxFuture<'a, TokenFetchResult>;

    /// Fetch the secure string stored under `key`
    fn fetch_secure_string<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TokenFetchResult>;

    /// Bind `data` into subsequently fetched tokens
    fn set_data_hash(&self, data: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(TokenFetchStatus::NoNetwork.is_network_failure());
        assert!(TokenFetchStatus::MitmDetected.is_network_failure());
        assert!(!TokenFetchStatus::Rejected.is_network_failure());

        assert!(TokenFetchStatus::UnprotectedUrl.allows_unprotected());
        assert!(TokenFetchStatus::UnknownUrl.allows_unprotected());
        assert!(!TokenFetchStatus::Success.allows_unprotected());
        assert!(!TokenFetchStatus::BadUrl.allows_unprotected());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TokenFetchStatus::PoorNetwork.to_string(), "POOR_NETWORK");
        assert_eq!(
            serde_json::to_string(&TokenFetchStatus::UnknownKey).unwrap(),
            "\"UNKNOWN_KEY\""
        );
    }

    #[test]
    fn test_loggable_token() {
        assert_eq!(TokenFetchResult::token("abcdefghijkl").loggable_token(), "abcdefgh...");
        assert_eq!(TokenFetchResult::token("short").loggable_token(), "short");
        assert_eq!(
            TokenFetchResult::with_status(TokenFetchStatus::NoNetwork).loggable_token(),
            "<none>"
        );
    }

    #[test]
    fn test_rejection_detail() {
        let result = TokenFetchResult::rejected("ARC123", "rooted device");
        assert_eq!(result.rejection_detail(), "ARC123 rooted device");
        assert_eq!(
            TokenFetchResult::with_status(TokenFetchStatus::Rejected).rejection_detail(),
            ""
        );
    }
}
