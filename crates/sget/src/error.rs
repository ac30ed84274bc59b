//! Error types for sget
//!
//! Workflows never terminate the process. Every failure is an [`Error`]
//! value, wrapped in [`Aborted`] with the state the workflow stopped in, and
//! the binary maps it to an exit code through [`Error::exit_code`].

use std::fmt;
use thiserror::Error;

/// Exit code for a generic failure (auth, certificate authority, log, network, io)
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when verification rejected the materials
pub const EXIT_REJECTED: i32 = 2;
/// Exit code when a verified script could not be started
pub const EXIT_EXECUTION: i32 = 3;
/// Exit code after cancellation (128 + SIGINT)
pub const EXIT_CANCELLED: i32 = 130;

/// Errors that can occur in sget operations
#[derive(Error, Debug)]
pub enum Error {
    /// No usable identity token was obtained
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The certificate authority did not issue a certificate
    #[error("certificate issuance failed{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    CertIssuance {
        /// HTTP status from the authority, if one was received
        status: Option<u16>,
        /// Whether a later attempt may succeed
        retryable: bool,
        /// What went wrong
        message: String,
    },

    /// The transparency log did not record the signing event
    #[error("transparency log submission failed: {0}")]
    LogSubmission(String),

    /// Key generation or signing failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// Certificate bytes could not be decoded or parsed
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// Certificate key is not ECDSA P-256
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Artifact is not a plain-text script
    #[error("unsupported artifact type: {0}")]
    UnsupportedArtifactType(String),

    /// Signature container could not be decoded or has a non-positive component
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Signature does not match the artifact and certificate
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Verified script could not be started
    #[error("execution failed: {0}")]
    Execution(String),

    /// Release assets could not be listed or downloaded
    #[error("asset fetch failed: {0}")]
    AssetFetch(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The workflow was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The workflow deadline passed
    #[error("operation timed out")]
    Timeout,
}

/// Coarse stage an error belongs to, used in user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Auth,
    Certificate,
    Signature,
    Network,
    Artifact,
    Execution,
    Io,
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Auth => "auth",
            Stage::Certificate => "certificate",
            Stage::Signature => "signature",
            Stage::Network => "network",
            Stage::Artifact => "artifact",
            Stage::Execution => "execution",
            Stage::Io => "io",
            Stage::Config => "config",
        };
        f.write_str(name)
    }
}

impl Error {
    /// The stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            Error::Auth(_) => Stage::Auth,
            Error::CertIssuance { .. } | Error::MalformedCertificate(_) => Stage::Certificate,
            Error::UnsupportedKeyType(_) => Stage::Certificate,
            Error::Signing(_) | Error::MalformedSignature(_) | Error::VerificationFailed(_) => {
                Stage::Signature
            }
            Error::LogSubmission(_) | Error::AssetFetch(_) => Stage::Network,
            Error::Cancelled | Error::Timeout => Stage::Network,
            Error::UnsupportedArtifactType(_) => Stage::Artifact,
            Error::Execution(_) => Stage::Execution,
            Error::Io(_) => Stage::Io,
            Error::Config(_) => Stage::Config,
        }
    }

    /// Whether the materials were examined and rejected
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::MalformedCertificate(_)
                | Error::UnsupportedKeyType(_)
                | Error::MalformedSignature(_)
                | Error::VerificationFailed(_)
        )
    }

    /// Whether retrying the failed call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CertIssuance { retryable: true, .. })
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            e if e.is_rejection() => EXIT_REJECTED,
            Error::Execution(_) => EXIT_EXECUTION,
            Error::Cancelled => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<sget_oidc::Error> for Error {
    fn from(e: sget_oidc::Error) -> Self {
        Error::Auth(e.to_string())
    }
}

impl From<sget_fulcio::Error> for Error {
    fn from(e: sget_fulcio::Error) -> Self {
        Error::CertIssuance {
            status: e.status(),
            retryable: e.is_retryable(),
            message: e.to_string(),
        }
    }
}

impl From<sget_rekor::Error> for Error {
    fn from(e: sget_rekor::Error) -> Self {
        Error::LogSubmission(e.to_string())
    }
}

impl From<sget_crypto::Error> for Error {
    fn from(e: sget_crypto::Error) -> Self {
        use sget_crypto::Error as Crypto;
        match e {
            Crypto::MalformedSignature(msg) => Error::MalformedSignature(msg),
            Crypto::UnsupportedKeyType(msg) => Error::UnsupportedKeyType(msg),
            Crypto::InvalidCertificate(msg) | Crypto::InvalidKeyFormat(msg) => {
                Error::MalformedCertificate(msg)
            }
            Crypto::Verification(msg) => Error::VerificationFailed(msg),
            Crypto::Io(e) => Error::Io(e),
            other => Error::Signing(other.to_string()),
        }
    }
}

/// A workflow stopped in `state` because of `error`
#[derive(Debug)]
pub struct Aborted<S> {
    /// The state in which the workflow stopped
    pub state: S,
    /// Why it stopped
    pub error: Error,
}

impl<S> Aborted<S> {
    /// Exit code for the underlying error
    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }
}

impl<S: fmt::Display> fmt::Display for Aborted<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aborted in {} [{}]: {}",
            self.state,
            self.error.stage(),
            self.error
        )
    }
}

impl<S: fmt::Debug + fmt::Display> std::error::Error for Aborted<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Map an error into an [`Aborted`] for `state`
pub(crate) fn abort<S>(state: S) -> impl FnOnce(Error) -> Aborted<S> {
    move |error| Aborted { state, error }
}

/// Result type for sget operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::MalformedCertificate("x".into()), EXIT_REJECTED)]
    #[case(Error::UnsupportedKeyType("x".into()), EXIT_REJECTED)]
    #[case(Error::MalformedSignature("x".into()), EXIT_REJECTED)]
    #[case(Error::VerificationFailed("x".into()), EXIT_REJECTED)]
    #[case(Error::Execution("x".into()), EXIT_EXECUTION)]
    #[case(Error::Cancelled, EXIT_CANCELLED)]
    #[case(Error::Timeout, EXIT_FAILURE)]
    #[case(Error::Auth("x".into()), EXIT_FAILURE)]
    #[case(Error::AssetFetch("x".into()), EXIT_FAILURE)]
    fn test_exit_codes(#[case] error: Error, #[case] code: i32) {
        assert_eq!(error.exit_code(), code);
        assert_ne!(code, 0);
    }

    #[test]
    fn test_fulcio_status_classification() {
        let server: Error = sget_fulcio::Error::Status {
            status: 503,
            body: "unavailable".into(),
        }
        .into();
        assert!(server.is_retryable());

        let client: Error = sget_fulcio::Error::Status {
            status: 401,
            body: "bad token".into(),
        }
        .into();
        assert!(!client.is_retryable());
        assert!(client.to_string().contains("(401)"));
        assert_eq!(client.stage(), Stage::Certificate);
    }

    #[test]
    fn test_crypto_errors_keep_their_meaning() {
        let e: Error = sget_crypto::Error::MalformedSignature("zero r".into()).into();
        assert!(matches!(e, Error::MalformedSignature(_)));
        let e: Error = sget_crypto::Error::InvalidCertificate("bad".into()).into();
        assert!(matches!(e, Error::MalformedCertificate(_)));
        let e: Error = sget_crypto::Error::Verification("no".into()).into();
        assert!(matches!(e, Error::VerificationFailed(_)));
    }

    #[test]
    fn test_bad_key_format_is_rejection() {
        let e: Error = sget_crypto::Error::InvalidKeyFormat("off curve".into()).into();
        assert!(matches!(e, Error::MalformedCertificate(_)));
        assert_eq!(e.exit_code(), EXIT_REJECTED);
    }

    #[test]
    fn test_aborted_display_names_state_and_stage() {
        let aborted = abort("ParseCertificate")(Error::MalformedCertificate("junk".into()));
        assert_eq!(
            aborted.to_string(),
            "aborted in ParseCertificate [certificate]: malformed certificate: junk"
        );
    }
}
