//! Signature verification over artifact digests

use crate::error::{Error, Result};
use crate::hash::Sha256Hash;
use crate::signature::Signature;
use crate::signing::SigningScheme;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::VerifyingKey;
use p256::pkcs8::DecodePublicKey;

/// A public key for verification, already narrowed to a supported scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    key: VerifyingKey,
    scheme: SigningScheme,
}

impl VerificationKey {
    /// Wrap a P-256 verifying key
    pub fn ecdsa_p256(key: VerifyingKey) -> Self {
        Self {
            key,
            scheme: SigningScheme::EcdsaP256Sha256,
        }
    }

    /// Parse a DER-encoded SubjectPublicKeyInfo holding a P-256 key
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let key = VerifyingKey::from_public_key_der(der)
            .map_err(|e| Error::InvalidKeyFormat(format!("failed to parse P-256 key: {}", e)))?;
        Ok(Self::ecdsa_p256(key))
    }

    /// The scheme this key verifies
    pub fn scheme(&self) -> SigningScheme {
        self.scheme
    }

    /// Verify a signature container over an artifact digest
    ///
    /// The container is decoded and its components checked before the curve
    /// arithmetic runs; only a successful primitive verify returns `Ok`.
    pub fn verify_digest(&self, digest: &Sha256Hash, signature: &Signature) -> Result<()> {
        let sig = signature.decode()?;
        self.key
            .verify_prehash(digest.as_bytes(), &sig)
            .map_err(|_| Error::Verification("ECDSA P-256 signature invalid".to_string()))
    }

    /// Verify a signature container over a message the primitive hashes itself
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let sig = signature.decode()?;
        self.key
            .verify(message, &sig)
            .map_err(|_| Error::Verification("ECDSA P-256 signature invalid".to_string()))
    }
}

impl From<&crate::signing::EphemeralKeyPair> for VerificationKey {
    fn from(kp: &crate::signing::EphemeralKeyPair) -> Self {
        Self::ecdsa_p256(kp.verifying_key().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;
    use crate::signing::EphemeralKeyPair;

    #[test]
    fn test_sign_then_verify_passes() {
        let kp = EphemeralKeyPair::generate();
        let sig = kp.sign(b"echo hello\n").unwrap();
        let vk = VerificationKey::from(&kp);
        assert!(vk.verify_digest(&sha256(b"echo hello\n"), &sig).is_ok());
    }

    #[test]
    fn test_signature_over_other_artifact_fails() {
        let kp = EphemeralKeyPair::generate();
        let sig = kp.sign(b"echo hello\n").unwrap();
        let vk = VerificationKey::from(&kp);
        assert!(matches!(
            vk.verify_digest(&sha256(b"echo hacked\n"), &sig),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn test_other_key_fails() {
        let signer = EphemeralKeyPair::generate();
        let other = EphemeralKeyPair::generate();
        let sig = signer.sign(b"data").unwrap();
        assert!(VerificationKey::from(&other)
            .verify_digest(&sha256(b"data"), &sig)
            .is_err());
    }

    #[test]
    fn test_proof_of_possession_verifies_over_message() {
        let kp = EphemeralKeyPair::generate();
        let proof = kp.prove_possession(b"user@example.com").unwrap();
        assert!(VerificationKey::from(&kp)
            .verify(b"user@example.com", &proof)
            .is_ok());
    }

    #[test]
    fn test_zero_component_never_reaches_primitive() {
        let kp = EphemeralKeyPair::generate();
        let zero = Signature::new(vec![0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x01]);
        assert!(matches!(
            VerificationKey::from(&kp).verify_digest(&sha256(b"data"), &zero),
            Err(Error::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_from_spki_der() {
        let kp = EphemeralKeyPair::generate();
        let spki = kp.public_key_spki().unwrap();
        let vk = VerificationKey::from_spki_der(spki.as_bytes()).unwrap();
        assert_eq!(vk, VerificationKey::from(&kp));
    }
}
