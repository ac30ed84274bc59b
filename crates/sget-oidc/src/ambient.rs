//! Ambient credential detection for CI/CD environments
//!
//! CI systems that mint OIDC tokens for their jobs let `sget sign` run
//! without a browser. Only GitHub Actions and GitLab CI are recognised.

use crate::error::{Error, Result};
use crate::token::IdentityToken;

/// Audience requested from CI token endpoints
pub const AUDIENCE: &str = "sigstore";

/// Detected CI/CD environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiEnvironment {
    /// GitHub Actions
    GitHubActions,
    /// GitLab CI
    GitLabCi,
}

/// Detect the current CI/CD environment from a variable lookup
pub fn detect_environment_with<F>(lookup: F) -> Option<CiEnvironment>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup("GITHUB_ACTIONS").is_some() && lookup("ACTIONS_ID_TOKEN_REQUEST_URL").is_some() {
        Some(CiEnvironment::GitHubActions)
    } else if lookup("GITLAB_CI").is_some() {
        Some(CiEnvironment::GitLabCi)
    } else {
        None
    }
}

/// Detect the current CI/CD environment
pub fn detect_environment() -> Option<CiEnvironment> {
    detect_environment_with(|name| std::env::var(name).ok())
}

/// Get an ambient identity token from the current environment
///
/// Returns `Ok(None)` when no supported CI environment is detected.
pub async fn get_ambient_token() -> Result<Option<IdentityToken>> {
    match detect_environment() {
        Some(CiEnvironment::GitHubActions) => get_github_actions_token().await.map(Some),
        Some(CiEnvironment::GitLabCi) => get_gitlab_ci_token().map(Some),
        None => Ok(None),
    }
}

/// Build the GitHub Actions token request URL with our audience
fn github_request_url(request_url: &str) -> Result<url::Url> {
    let mut url = url::Url::parse(request_url)
        .map_err(|e| Error::Token(format!("invalid ACTIONS_ID_TOKEN_REQUEST_URL: {}", e)))?;
    url.query_pairs_mut().append_pair("audience", AUDIENCE);
    Ok(url)
}

/// Get OIDC token from GitHub Actions
async fn get_github_actions_token() -> Result<IdentityToken> {
    let request_url = std::env::var("ACTIONS_ID_TOKEN_REQUEST_URL")
        .map_err(|_| Error::Token("ACTIONS_ID_TOKEN_REQUEST_URL not set".to_string()))?;

    let request_token = std::env::var("ACTIONS_ID_TOKEN_REQUEST_TOKEN")
        .map_err(|_| Error::Token("ACTIONS_ID_TOKEN_REQUEST_TOKEN not set".to_string()))?;

    let url = github_request_url(&request_url)?;
    tracing::debug!("requesting ambient GitHub Actions identity token");

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .bearer_auth(request_token)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::Token(format!(
            "GitHub Actions returned status {}",
            response.status()
        )));
    }

    #[derive(serde::Deserialize)]
    struct TokenResponse {
        value: String,
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::Token(format!("failed to parse token response: {}", e)))?;

    IdentityToken::from_jwt_unexpired(&token_response.value)
}

/// Get OIDC token from GitLab CI
fn get_gitlab_ci_token() -> Result<IdentityToken> {
    // Jobs opt in with an `id_tokens:` entry named SIGSTORE_ID_TOKEN
    let token = std::env::var("SIGSTORE_ID_TOKEN")
        .or_else(|_| std::env::var("CI_JOB_JWT_V2"))
        .map_err(|_| Error::Token("SIGSTORE_ID_TOKEN or CI_JOB_JWT_V2 not set".to_string()))?;

    IdentityToken::from_jwt_unexpired(&token)
}

/// Check if we're running in a supported CI/CD environment
pub fn is_ci_environment() -> bool {
    detect_environment().is_some()
}
