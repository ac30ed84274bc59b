//! Cryptographic primitives for keyless script signing
//!
//! This crate provides ephemeral key generation, streaming SHA-256 digests,
//! the DER signature container, and certificate key extraction, using the
//! RustCrypto `p256` stack as the backend.

pub mod encoding;
pub mod error;
pub mod hash;
pub mod signature;
pub mod signing;
pub mod verification;
pub mod x509;

pub use encoding::{CertificateDer, PublicKeyPem, PublicKeySpki};
pub use error::{Error, Result};
pub use hash::{sha256, sha256_file, Sha256Hash, Sha256Hasher, STREAM_CHUNK};
pub use signature::Signature;
pub use signing::{EphemeralKeyPair, SigningScheme};
pub use verification::VerificationKey;
pub use x509::{parse_certificate_info, parse_certificate_pem, CertificateInfo, KeyAlgorithm};
