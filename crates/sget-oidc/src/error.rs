//! Error types for sget-oidc

use thiserror::Error;

/// Errors that can occur in OIDC operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Token could not be parsed
    #[error("Token error: {0}")]
    Token(String),

    /// Token parsed but is past its expiry
    #[error("identity token expired at {expired_at}")]
    Expired {
        /// The token's `exp` claim
        expired_at: u64,
    },

    /// OAuth error
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Issuer URL or discovery document problem
    #[error("Discovery error: {0}")]
    Discovery(String),
}

/// Result type for OIDC operations
pub type Result<T> = std::result::Result<T, Error>;
