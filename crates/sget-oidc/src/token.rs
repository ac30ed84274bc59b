//! Identity token handling

use crate::error::{Error, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

/// An OIDC identity token
///
/// The raw JWT is a bearer credential, so `Debug` prints the claims only.
#[derive(Clone)]
pub struct IdentityToken {
    /// The raw JWT token
    raw: String,
    /// Parsed claims
    claims: TokenClaims,
}

/// Standard OIDC claims we care about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Audience (can be string or array)
    #[serde(default)]
    pub aud: Audience,
    /// Expiration time
    pub exp: u64,
    /// Issued at
    #[serde(default)]
    pub iat: u64,
    /// Email
    #[serde(default)]
    pub email: Option<String>,
    /// Email verified
    #[serde(default)]
    pub email_verified: Option<bool>,
}

/// Audience can be a single string or array of strings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Check if the audience contains a specific value
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::None => false,
            Audience::Single(s) => s == value,
            Audience::Multiple(v) => v.iter().any(|s| s == value),
        }
    }
}

impl IdentityToken {
    /// Parse a JWT token string
    ///
    /// The signature part is not checked here; the certificate authority
    /// validates the token against the issuer's keys.
    pub fn from_jwt(token: &str) -> Result<Self> {
        let token = token.trim();
        // JWT format: header.payload.signature
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::Token("invalid JWT format".to_string()));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| Error::Token(format!("failed to decode payload: {}", e)))?;

        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|e| Error::Token(format!("failed to parse claims: {}", e)))?;

        if claims.sub.is_empty() {
            return Err(Error::Token("token has an empty subject".to_string()));
        }

        Ok(Self {
            raw: token.to_string(),
            claims,
        })
    }

    /// Parse a JWT and reject it if it has already expired
    pub fn from_jwt_unexpired(token: &str) -> Result<Self> {
        let token = Self::from_jwt(token)?;
        token.ensure_unexpired()?;
        Ok(token)
    }

    /// Get the raw JWT string
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Get the issuer
    pub fn issuer(&self) -> &str {
        &self.claims.iss
    }

    /// Get the subject
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    /// Get the email if present
    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }

    /// Check if the email is verified
    pub fn email_verified(&self) -> bool {
        self.claims.email_verified.unwrap_or(false)
    }

    /// Get the expiration time
    pub fn expiration(&self) -> u64 {
        self.claims.exp
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.claims.exp < now
    }

    /// Fail with [`Error::Expired`] if the token is past its expiry
    pub fn ensure_unexpired(&self) -> Result<()> {
        if self.is_expired() {
            return Err(Error::Expired {
                expired_at: self.claims.exp,
            });
        }
        Ok(())
    }

    /// Get the claims
    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// The value the certificate authority expects to be signed as proof of
    /// possession: the email claim when present, otherwise the subject
    pub fn challenge(&self) -> &str {
        self.claims.email.as_deref().unwrap_or(&self.claims.sub)
    }
}

impl std::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToken")
            .field("raw", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}

/// Known OIDC issuers
pub mod issuers {
    /// Sigstore's public Dex instance
    pub const SIGSTORE_OAUTH: &str = "https://oauth2.sigstore.dev/auth";
    /// Sigstore's staging Dex instance
    pub const SIGSTORE_OAUTH_STAGING: &str = "https://oauth2.sigstage.dev/auth";
    /// GitHub Actions OIDC
    pub const GITHUB_ACTIONS: &str = "https://token.actions.githubusercontent.com";
    /// GitLab
    pub const GITLAB: &str = "https://gitlab.com";
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned JWT around the given claims JSON
    pub(crate) fn jwt(claims: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims);
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_audience_contains() {
        let single = Audience::Single("test".to_string());
        assert!(single.contains("test"));
        assert!(!single.contains("other"));

        let multiple = Audience::Multiple(vec!["a".to_string(), "b".to_string()]);
        assert!(multiple.contains("a"));
        assert!(multiple.contains("b"));
        assert!(!multiple.contains("c"));
    }

    #[test]
    fn test_parse_jwt() {
        let token = IdentityToken::from_jwt(&jwt(
            r#"{"iss":"https://test.com","sub":"user123","exp":9999999999,"email":"test@example.com"}"#,
        ))
        .unwrap();
        assert_eq!(token.issuer(), "https://test.com");
        assert_eq!(token.subject(), "user123");
        assert_eq!(token.email(), Some("test@example.com"));
        assert_eq!(token.challenge(), "test@example.com");
        assert!(!token.is_expired());
    }

    #[test]
    fn test_challenge_falls_back_to_subject() {
        let token = IdentityToken::from_jwt(&jwt(
            r#"{"iss":"https://ci.example","sub":"repo:o/r:ref:refs/heads/main","exp":9999999999}"#,
        ))
        .unwrap();
        assert_eq!(token.challenge(), "repo:o/r:ref:refs/heads/main");
    }

    #[test]
    fn test_expired_token_rejected() {
        let raw = jwt(r#"{"iss":"https://test.com","sub":"user123","exp":1}"#);
        assert!(IdentityToken::from_jwt(&raw).is_ok());
        assert!(matches!(
            IdentityToken::from_jwt_unexpired(&raw),
            Err(Error::Expired { expired_at: 1 })
        ));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        assert!(IdentityToken::from_jwt("not-a-jwt").is_err());
        assert!(IdentityToken::from_jwt("a.!!!.c").is_err());
        assert!(IdentityToken::from_jwt(&jwt(r#"{"iss":"x"}"#)).is_err());
        assert!(IdentityToken::from_jwt(&jwt(r#"{"iss":"x","sub":"","exp":9999999999}"#)).is_err());
    }

    #[test]
    fn test_debug_redacts_raw_token() {
        let raw = jwt(r#"{"iss":"https://test.com","sub":"user123","exp":9999999999}"#);
        let token = IdentityToken::from_jwt(&raw).unwrap();
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains(&raw));
        assert!(rendered.contains("user123"));
    }
}
