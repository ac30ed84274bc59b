//! Ephemeral key generation and signing
//!
//! One [`EphemeralKeyPair`] is generated per sign operation. The private
//! scalar never leaves this type: there is no accessor for it, `Debug` only
//! prints the public half, and the underlying `SigningKey` zeroizes its
//! memory when dropped.

use crate::encoding::{PublicKeyPem, PublicKeySpki};
use crate::error::{Error, Result};
use crate::hash::Sha256Hash;
use crate::signature::Signature;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::EncodePublicKey;

/// Supported signing schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    /// ECDSA P-256 with SHA-256
    EcdsaP256Sha256,
}

impl SigningScheme {
    /// Get the name of this scheme
    pub fn name(&self) -> &'static str {
        match self {
            SigningScheme::EcdsaP256Sha256 => "ECDSA_P256_SHA256",
        }
    }

    /// Algorithm name the certificate authority expects alongside the key
    pub fn key_algorithm(&self) -> &'static str {
        match self {
            SigningScheme::EcdsaP256Sha256 => "ecdsa",
        }
    }
}

/// An ephemeral ECDSA P-256 key pair, alive for a single sign operation
pub struct EphemeralKeyPair {
    signing_key: SigningKey,
}

impl EphemeralKeyPair {
    /// Generate a fresh key pair from the operating system RNG
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        tracing::debug!("generated ephemeral ECDSA P-256 key pair");
        Self { signing_key }
    }

    /// The signing scheme of this key pair
    pub fn scheme(&self) -> SigningScheme {
        SigningScheme::EcdsaP256Sha256
    }

    /// The public half
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the public key in DER-encoded SubjectPublicKeyInfo format
    pub fn public_key_spki(&self) -> Result<PublicKeySpki> {
        let der = self
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| Error::Der(e.to_string()))?;
        Ok(PublicKeySpki::new(der.as_bytes().to_vec()))
    }

    /// Get the public key in PEM-encoded SubjectPublicKeyInfo format
    pub fn public_key_pem(&self) -> Result<PublicKeyPem> {
        Ok(self.public_key_spki()?.to_pem())
    }

    /// Sign the identity token's subject to prove control of the private key
    ///
    /// RFC 6979 nonces make this deterministic for a given key and subject.
    pub fn prove_possession(&self, subject: &[u8]) -> Result<Signature> {
        let sig: p256::ecdsa::Signature = self.signing_key.try_sign(subject)?;
        Ok(sig.into())
    }

    /// Sign an artifact digest
    pub fn sign_digest(&self, digest: &Sha256Hash) -> Result<Signature> {
        let sig: p256::ecdsa::Signature = self.signing_key.sign_prehash(digest.as_bytes())?;
        Ok(sig.into())
    }

    /// Hash and sign artifact bytes
    pub fn sign(&self, artifact: &[u8]) -> Result<Signature> {
        self.sign_digest(&crate::hash::sha256(artifact))
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("scheme", &self.scheme())
            .field("public_key", self.verifying_key())
            .finish_non_exhaustive()
    }
}
