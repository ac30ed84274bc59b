//! Identity providers
//!
//! Every provider yields a parsed, unexpired [`IdentityToken`] or an
//! [`Error::Auth`].

use crate::config::OidcConfig;
use crate::error::{Error, Result};
use crate::services::BoxFuture;
use sget_oidc::{DeviceCodeResponse, IdentityToken, OAuthClient, OAuthConfig};

/// Obtains an identity token from an OIDC authority
pub trait IdentityProvider: Send + Sync {
    /// Authenticate against the configured issuer
    fn authenticate<'a>(&'a self, oidc: &'a OidcConfig) -> BoxFuture<'a, Result<IdentityToken>>;
}

/// A token obtained out of band, e.g. from `SGET_IDENTITY_TOKEN`
pub struct StaticTokenProvider {
    raw: String,
}

impl StaticTokenProvider {
    /// Wrap a raw JWT; it is parsed on first use
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl IdentityProvider for StaticTokenProvider {
    fn authenticate<'a>(&'a self, _oidc: &'a OidcConfig) -> BoxFuture<'a, Result<IdentityToken>> {
        Box::pin(async move { Ok(IdentityToken::from_jwt_unexpired(&self.raw)?) })
    }
}

/// Tokens minted by the CI system running this job
pub struct AmbientProvider;

impl IdentityProvider for AmbientProvider {
    fn authenticate<'a>(&'a self, _oidc: &'a OidcConfig) -> BoxFuture<'a, Result<IdentityToken>> {
        Box::pin(async move {
            sget_oidc::get_ambient_token()
                .await?
                .ok_or_else(|| Error::Auth("no supported CI environment detected".to_string()))
        })
    }
}

/// Interactive OAuth device authorization grant
pub struct DeviceFlowProvider;

impl DeviceFlowProvider {
    fn prompt(device: &DeviceCodeResponse) {
        // stdout belongs to whatever runs after us; talk to the user on stderr
        match &device.verification_uri_complete {
            Some(uri) => eprintln!("Open this URL to authenticate:\n\n    {}\n", uri),
            None => eprintln!(
                "Open {} and enter the code {} to authenticate",
                device.verification_uri, device.user_code
            ),
        }
    }
}

impl IdentityProvider for DeviceFlowProvider {
    fn authenticate<'a>(&'a self, oidc: &'a OidcConfig) -> BoxFuture<'a, Result<IdentityToken>> {
        Box::pin(async move {
            let config = OAuthConfig::new(&oidc.issuer, &oidc.client_id)
                .with_client_secret(oidc.client_secret.clone());
            tracing::debug!(issuer = %oidc.issuer, "starting device authorization flow");
            let token = OAuthClient::new(config).device_flow(Self::prompt).await?;
            Ok(token)
        })
    }
}

/// Pick a provider: an explicit token wins, then ambient CI credentials,
/// then the interactive device flow
pub fn select_provider(explicit_token: Option<String>) -> Box<dyn IdentityProvider> {
    match explicit_token.filter(|t| !t.trim().is_empty()) {
        Some(raw) => {
            tracing::debug!("using identity token supplied by the caller");
            Box::new(StaticTokenProvider::new(raw))
        }
        None if sget_oidc::is_ci_environment() => {
            tracing::debug!("using ambient CI identity token");
            Box::new(AmbientProvider)
        }
        None => Box::new(DeviceFlowProvider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn jwt(claims: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(claims)
        )
    }

    #[tokio::test]
    async fn test_static_provider_parses_token() {
        let provider = StaticTokenProvider::new(jwt(
            r#"{"iss":"https://issuer.example","sub":"alice","exp":9999999999}"#,
        ));
        let token = provider.authenticate(&OidcConfig::default()).await.unwrap();
        assert_eq!(token.subject(), "alice");
    }

    #[tokio::test]
    async fn test_static_provider_rejects_expired_token() {
        let provider =
            StaticTokenProvider::new(jwt(r#"{"iss":"https://issuer.example","sub":"a","exp":1}"#));
        let result = provider.authenticate(&OidcConfig::default()).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_static_provider_rejects_garbage() {
        let provider = StaticTokenProvider::new("not a jwt");
        let result = provider.authenticate(&OidcConfig::default()).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }
}
