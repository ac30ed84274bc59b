//! OpenID Connect identity provider for keyless script signing
//!
//! This crate handles identity token acquisition through the OAuth device
//! flow against any OIDC issuer, and through ambient CI credentials.

pub mod ambient;
pub mod error;
pub mod oauth;
pub mod secret;
pub mod token;

pub use ambient::{detect_environment, get_ambient_token, is_ci_environment, CiEnvironment};
pub use error::{Error, Result};
pub use oauth::{DeviceCodeResponse, OAuthClient, OAuthConfig, ProviderMetadata};
pub use secret::Secret;
pub use token::{issuers, Audience, IdentityToken, TokenClaims};
