//! Rekor log entry types

use serde::{Deserialize, Serialize};
use sget_crypto::{CertificateDer, Sha256Hash, Signature};
use std::collections::HashMap;

/// A log entry from Rekor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// UUID of the entry (the key in the response map)
    #[serde(default)]
    pub uuid: String,
    /// Body of the entry (base64 encoded canonicalized body)
    pub body: String,
    /// Integrated time (Unix timestamp)
    pub integrated_time: i64,
    /// Log ID (hex-encoded SHA-256 of the log's public key)
    #[serde(rename = "logID")]
    pub log_id: String,
    /// Log index
    pub log_index: i64,
    /// Verification data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

/// Verification data for a log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    /// Signed entry timestamp (base64)
    #[serde(default)]
    pub signed_entry_timestamp: Option<String>,
}

/// Response map from the entries endpoint, keyed by UUID
pub type LogEntryResponse = HashMap<String, LogEntry>;

/// Pull the single entry out of a response map
pub fn single_entry(entries: LogEntryResponse) -> Option<LogEntry> {
    let (uuid, mut entry) = entries.into_iter().next()?;
    entry.uuid = uuid;
    Some(entry)
}

/// HashedRekord entry for creating new log entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedRekord {
    /// API version
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Entry kind
    pub kind: String,
    /// Spec containing the actual data
    pub spec: HashedRekordSpec,
}

/// HashedRekord specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedRekordSpec {
    /// Data containing the hash
    pub data: HashedRekordData,
    /// Signature
    pub signature: HashedRekordSignature,
}

/// Data portion of HashedRekord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedRekordData {
    /// Hash of the artifact
    pub hash: HashedRekordHash,
}

/// Hash in HashedRekord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedRekordHash {
    /// Hash algorithm, lowercase as the API expects
    pub algorithm: String,
    /// Hash value (hex encoded)
    pub value: String,
}

/// Signature in HashedRekord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedRekordSignature {
    /// Signature content (base64 encoded)
    pub content: String,
    /// Public key
    #[serde(rename = "publicKey")]
    pub public_key: HashedRekordPublicKey,
}

/// Public key in HashedRekord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashedRekordPublicKey {
    /// Base64 of the PEM-encoded signing certificate
    pub content: String,
}

impl HashedRekord {
    /// Create a new HashedRekord entry with a certificate
    ///
    /// # Arguments
    /// * `artifact_hash` - SHA256 hash of the artifact
    /// * `signature` - The DER signature container
    /// * `certificate` - The leaf certificate from the certificate authority
    pub fn new(
        artifact_hash: &Sha256Hash,
        signature: &Signature,
        certificate: &CertificateDer,
    ) -> Self {
        use base64::Engine;
        let cert_pem = certificate.to_pem();

        Self {
            api_version: "0.0.1".to_string(),
            kind: "hashedrekord".to_string(),
            spec: HashedRekordSpec {
                data: HashedRekordData {
                    hash: HashedRekordHash {
                        algorithm: "sha256".to_string(),
                        value: artifact_hash.to_hex(),
                    },
                },
                signature: HashedRekordSignature {
                    content: signature.to_base64(),
                    public_key: HashedRekordPublicKey {
                        content: base64::engine::general_purpose::STANDARD.encode(cert_pem),
                    },
                },
            },
        }
    }
}
