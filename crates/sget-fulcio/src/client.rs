//! Fulcio client for certificate operations

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sget_crypto::{CertificateDer, PublicKeySpki, Signature, SigningScheme};
use std::time::Duration;

/// The public Sigstore Fulcio instance
pub const PUBLIC_URL: &str = "https://fulcio.sigstore.dev";
/// The Sigstore staging Fulcio instance
pub const STAGING_URL: &str = "https://fulcio.sigstage.dev";

/// A client for interacting with Fulcio
pub struct FulcioClient {
    /// Base URL of the Fulcio instance
    url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl FulcioClient {
    /// Create a new Fulcio client
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL this client talks to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request a signing certificate
    ///
    /// # Arguments
    /// * `identity_token` - The raw OIDC identity token, sent as a bearer credential
    /// * `public_key` - The ephemeral public key (DER SubjectPublicKeyInfo)
    /// * `proof_of_possession` - Signature over the token's challenge claim
    pub async fn create_signing_certificate(
        &self,
        identity_token: &str,
        public_key: &PublicKeySpki,
        proof_of_possession: &Signature,
    ) -> Result<CertificateChain> {
        let url = format!("{}/api/v1/signingCert", self.url);
        let request = SigningCertificateRequest::new(public_key, proof_of_possession);

        tracing::debug!(%url, "requesting signing certificate");
        let response = self
            .client
            .post(&url)
            .bearer_auth(identity_token)
            .header(reqwest::header::ACCEPT, "application/pem-certificate-chain")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        CertificateChain::from_pem(&body)
    }
}

/// Request body of `POST /api/v1/signingCert`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningCertificateRequest {
    /// Public key
    pub public_key: PublicKeyData,
    /// Proof of possession: base64 signature over the challenge claim
    pub signed_email_address: String,
}

impl SigningCertificateRequest {
    /// Build the request for an ephemeral key and its proof of possession
    pub fn new(public_key: &PublicKeySpki, proof_of_possession: &Signature) -> Self {
        Self {
            public_key: PublicKeyData {
                content: public_key.to_base64(),
                algorithm: SigningScheme::EcdsaP256Sha256.key_algorithm().to_string(),
            },
            signed_email_address: proof_of_possession.to_base64(),
        }
    }
}

/// Public key data for API requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyData {
    /// Base64 DER-encoded key content
    pub content: String,
    /// Key algorithm
    pub algorithm: String,
}

/// The certificate chain returned by the authority, leaf first
#[derive(Debug, Clone)]
pub struct CertificateChain {
    /// The short-lived certificate binding the identity to the ephemeral key
    pub leaf: CertificateDer,
    /// Certificates between leaf and root, possibly none
    pub intermediates: Vec<CertificateDer>,
    /// The self-signed root
    pub root: CertificateDer,
}

impl CertificateChain {
    /// Split a PEM chain into leaf, intermediates and root
    ///
    /// A chain with fewer than two certificates is rejected.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let mut certs = CertificateDer::chain_from_pem(pem)?;
        if certs.len() < 2 {
            return Err(Error::Certificate(format!(
                "expected a leaf and a root certificate, got {} certificate(s)",
                certs.len()
            )));
        }

        let leaf = certs.remove(0);
        let root = certs
            .pop()
            .ok_or_else(|| Error::Certificate("certificate chain has no root".to_string()))?;

        Ok(Self {
            leaf,
            intermediates: certs,
            root,
        })
    }

    /// The leaf certificate as a PEM block
    pub fn leaf_pem(&self) -> String {
        self.leaf.to_pem()
    }
}
