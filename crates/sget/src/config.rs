//! Configuration threaded explicitly through each workflow call

use sget_oidc::{issuers, Secret};
use std::path::PathBuf;
use std::time::Duration;

/// Directory under which sign materials are written
pub const DEFAULT_STORE_ROOT: &str = ".sigstore";

/// OIDC issuer and client used to obtain an identity token
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// Issuer URL
    pub issuer: String,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret, for confidential clients
    pub client_secret: Option<Secret>,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: issuers::SIGSTORE_OAUTH.to_string(),
            client_id: "sigstore".to_string(),
            client_secret: None,
        }
    }
}

/// Configuration for signing operations
#[derive(Debug, Clone)]
pub struct SignConfig {
    /// Fulcio URL
    pub fulcio_url: String,
    /// Rekor URL
    pub rekor_url: String,
    /// Identity provider
    pub oidc: OidcConfig,
    /// Root of the per-invocation materials directories
    pub store_root: PathBuf,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    /// Deadline for the whole workflow, measured from its start
    pub deadline: Option<Duration>,
    /// Extra attempts after a retryable certificate authority failure
    pub certificate_retries: u32,
    /// Pause between certificate attempts
    pub retry_backoff: Duration,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            fulcio_url: sget_fulcio::client::PUBLIC_URL.to_string(),
            rekor_url: sget_rekor::client::PUBLIC_URL.to_string(),
            oidc: OidcConfig::default(),
            store_root: PathBuf::from(DEFAULT_STORE_ROOT),
            request_timeout: Duration::from_secs(30),
            deadline: Some(Duration::from_secs(600)),
            certificate_retries: 2,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl SignConfig {
    /// Create configuration for Sigstore public-good instance
    pub fn production() -> Self {
        Self::default()
    }

    /// Create configuration for Sigstore staging instance
    pub fn staging() -> Self {
        Self {
            fulcio_url: sget_fulcio::client::STAGING_URL.to_string(),
            rekor_url: sget_rekor::client::STAGING_URL.to_string(),
            oidc: OidcConfig {
                issuer: issuers::SIGSTORE_OAUTH_STAGING.to_string(),
                ..OidcConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Configuration for verify and install operations
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Base URL of the release hosting API
    pub api_url: String,
    /// Bearer token for the hosting API
    pub api_token: Option<Secret>,
    /// Timeout for listing releases and for each asset download
    pub fetch_timeout: Duration,
    /// Deadline for fetching and verifying, measured from the start
    pub deadline: Option<Duration>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            api_token: None,
            fetch_timeout: Duration::from_secs(60),
            deadline: Some(Duration::from_secs(300)),
        }
    }
}
