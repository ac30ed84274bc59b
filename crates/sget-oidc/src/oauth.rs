//! OAuth flow implementation for interactive token acquisition
//!
//! This module implements the OAuth 2.0 device authorization grant with
//! PKCE against any OpenID Connect issuer. Endpoints are discovered from
//! the issuer's `/.well-known/openid-configuration` document.

use crate::error::{Error, Result};
use crate::secret::Secret;
use crate::token::IdentityToken;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Extra wait added to the polling interval on `slow_down`
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// OAuth configuration for a provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Issuer URL
    pub issuer: String,
    /// Client ID
    pub client_id: String,
    /// Client secret, if the client is confidential
    pub client_secret: Option<Secret>,
    /// Scopes to request
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Configuration for an arbitrary issuer
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            client_secret: None,
            scopes: vec!["openid".to_string(), "email".to_string()],
        }
    }

    /// Create configuration for Sigstore's public OAuth provider
    pub fn sigstore() -> Self {
        Self::new(crate::token::issuers::SIGSTORE_OAUTH, "sigstore")
    }

    /// Set the client secret; an empty secret is treated as none
    pub fn with_client_secret(mut self, secret: Option<Secret>) -> Self {
        self.client_secret = secret.filter(|s| !s.is_empty());
        self
    }

    /// URL of the issuer's discovery document
    pub fn discovery_url(&self) -> Result<url::Url> {
        let mut issuer = url::Url::parse(&self.issuer)
            .map_err(|e| Error::Discovery(format!("invalid issuer URL {}: {}", self.issuer, e)))?;
        if !issuer.path().ends_with('/') {
            let path = format!("{}/", issuer.path());
            issuer.set_path(&path);
        }
        issuer
            .join(".well-known/openid-configuration")
            .map_err(|e| Error::Discovery(e.to_string()))
    }
}

/// The subset of the OpenID provider metadata the device flow needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier
    pub issuer: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// Device authorization endpoint
    #[serde(default)]
    pub device_authorization_endpoint: Option<String>,
}

/// Device code flow response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    /// The device code
    pub device_code: String,
    /// User code to enter
    pub user_code: String,
    /// Verification URI
    pub verification_uri: String,
    /// Complete verification URI with code
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    /// Expiration in seconds
    pub expires_in: u64,
    /// Polling interval in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

/// Token response from the OAuth server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Expiration in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// ID token, the credential the certificate authority accepts
    #[serde(default)]
    pub id_token: Option<String>,
}

/// What a single poll of the token endpoint told us
#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    Pending,
    SlowDown,
}

/// Map an error code from the token endpoint onto the polling loop
fn classify_poll_error(code: &str) -> Result<PollOutcome> {
    match code {
        "authorization_pending" => Ok(PollOutcome::Pending),
        "slow_down" => Ok(PollOutcome::SlowDown),
        "expired_token" => Err(Error::OAuth("device code expired".to_string())),
        "access_denied" => Err(Error::OAuth("user denied authorization".to_string())),
        other => Err(Error::OAuth(format!("token error: {}", other))),
    }
}

/// A PKCE verifier and its S256 challenge
fn pkce_pair() -> (String, String) {
    let mut verifier_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut verifier_bytes);
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

/// OAuth client for device code flow
pub struct OAuthClient {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthClient {
    /// Create a new OAuth client with the given configuration
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client for Sigstore's OAuth provider
    pub fn sigstore() -> Self {
        Self::new(OAuthConfig::sigstore())
    }

    /// Fetch the issuer's discovery document
    pub async fn discover(&self) -> Result<ProviderMetadata> {
        let url = self.config.discovery_url()?;
        tracing::debug!(%url, "fetching OIDC discovery document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Discovery(format!(
                "discovery returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Discovery(format!("failed to parse discovery document: {}", e)))
    }

    fn client_params<'a>(&'a self, params: &mut Vec<(&'static str, &'a str)>) {
        params.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.expose()));
        }
    }

    /// Start the device code flow
    ///
    /// Returns the device code response which contains the user code
    /// and verification URI to show to the user, along with the PKCE verifier.
    pub async fn start_device_flow(
        &self,
        metadata: &ProviderMetadata,
    ) -> Result<(DeviceCodeResponse, String)> {
        let device_url = metadata.device_authorization_endpoint.as_deref().ok_or_else(|| {
            Error::Discovery(format!(
                "issuer {} does not support the device authorization grant",
                metadata.issuer
            ))
        })?;

        let (verifier, challenge) = pkce_pair();
        let scope = self.config.scopes.join(" ");

        let mut params = Vec::new();
        self.client_params(&mut params);
        params.push(("scope", scope.as_str()));
        params.push(("code_challenge", challenge.as_str()));
        params.push(("code_challenge_method", "S256"));

        let response = self
            .client
            .post(device_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth(format!(
                "device auth failed: {} - {}",
                status, body
            )));
        }

        let response_data = response
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("failed to parse device code response: {}", e)))?;

        Ok((response_data, verifier))
    }

    /// Poll for the token after user authorization
    ///
    /// This should be called after showing the user the verification URI.
    /// It will poll the token endpoint until the user completes authorization
    /// or the device code expires.
    pub async fn poll_for_token(
        &self,
        metadata: &ProviderMetadata,
        device: &DeviceCodeResponse,
        verifier: &str,
    ) -> Result<IdentityToken> {
        let mut params = Vec::new();
        self.client_params(&mut params);
        params.push(("device_code", device.device_code.as_str()));
        params.push(("grant_type", "urn:ietf:params:oauth:grant-type:device_code"));
        params.push(("code_verifier", verifier));

        let mut interval = Duration::from_secs(device.interval.max(1));
        let expires_at = tokio::time::Instant::now() + Duration::from_secs(device.expires_in);

        loop {
            tokio::time::sleep(interval).await;
            if tokio::time::Instant::now() >= expires_at {
                return Err(Error::OAuth("device code expired".to_string()));
            }

            let response = self
                .client
                .post(&metadata.token_endpoint)
                .form(&params)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            if response.status().is_success() {
                let token_response: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::OAuth(format!("failed to parse token response: {}", e)))?;

                let id_token = token_response
                    .id_token
                    .ok_or_else(|| Error::OAuth("no id_token in response".to_string()))?;

                return IdentityToken::from_jwt_unexpired(&id_token);
            }

            #[derive(Deserialize)]
            struct ErrorResponse {
                error: String,
            }

            let error: ErrorResponse = response
                .json()
                .await
                .map_err(|e| Error::OAuth(format!("failed to parse error response: {}", e)))?;

            if classify_poll_error(&error.error)? == PollOutcome::SlowDown {
                interval += SLOW_DOWN_STEP;
                tracing::debug!(?interval, "token endpoint asked us to slow down");
            }
        }
    }

    /// Perform the complete device code flow
    ///
    /// Discovers the issuer's endpoints, starts the flow, hands the
    /// verification details to `display`, and polls until a token arrives.
    pub async fn device_flow<F>(&self, display: F) -> Result<IdentityToken>
    where
        F: FnOnce(&DeviceCodeResponse),
    {
        let metadata = self.discover().await?;
        let (device_response, verifier) = self.start_device_flow(&metadata).await?;
        display(&device_response);
        self.poll_for_token(&metadata, &device_response, &verifier)
            .await
    }
}
