//! Error types for sget-crypto

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    /// Signing error
    #[error("Signing error: {0}")]
    Signing(String),

    /// The signature did not verify against the key and digest
    #[error("Verification error: {0}")]
    Verification(String),

    /// The signature container could not be decoded, or one of its
    /// integers is zero or negative
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The certificate carries a key outside the supported family
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// DER encoding/decoding error
    #[error("DER error: {0}")]
    Der(String),

    /// Certificate parsing error
    #[error("Certificate error: {0}")]
    InvalidCertificate(String),

    /// I/O error while streaming an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<p256::ecdsa::Error> for Error {
    fn from(_: p256::ecdsa::Error) -> Self {
        // ecdsa::Error is opaque
        Error::Signing("ecdsa operation failed".to_string())
    }
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, Error>;
