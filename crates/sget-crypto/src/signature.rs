//! The signature container
//!
//! Signatures travel as the DER encoding of `ECDSA-Sig-Value`:
//!
//! ```text
//! ECDSA-Sig-Value ::= SEQUENCE {
//!     r  INTEGER,
//!     s  INTEGER
//! }
//! ```
//!
//! The same bytes are written to the `.bin` file, submitted to the
//! transparency log, and read back on the verify side.

use crate::error::{Error, Result};
use der::asn1::AnyRef;
use der::{Decode, Sequence, Tag, Tagged};

/// A DER-encoded ECDSA signature container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Create a new Signature from raw container bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw container bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Get the length of the container in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the container is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode the container as base64
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    /// Decode the container into a signature the ECDSA primitive accepts
    ///
    /// Rejects anything that is not exactly a SEQUENCE of two INTEGERs, and
    /// any component that is zero or negative. These checks run before the
    /// bytes are handed to the curve implementation.
    pub fn decode(&self) -> Result<p256::ecdsa::Signature> {
        if self.0.is_empty() {
            return Err(Error::MalformedSignature("signature is empty".to_string()));
        }

        let value = EcdsaSigValue::from_der(&self.0)
            .map_err(|e| Error::MalformedSignature(format!("invalid signature data: {}", e)))?;

        check_component("r", &value.r)?;
        check_component("s", &value.s)?;

        p256::ecdsa::Signature::from_der(&self.0)
            .map_err(|_| Error::MalformedSignature("signature is not a P-256 signature".into()))
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<p256::ecdsa::Signature> for Signature {
    fn from(sig: p256::ecdsa::Signature) -> Self {
        Self(sig.to_der().as_bytes().to_vec())
    }
}

#[derive(Sequence)]
struct EcdsaSigValue<'a> {
    r: AnyRef<'a>,
    s: AnyRef<'a>,
}

/// Require a strictly positive INTEGER
fn check_component(name: &str, component: &AnyRef<'_>) -> Result<()> {
    if component.tag() != Tag::Integer {
        return Err(Error::MalformedSignature(format!(
            "{} is a {}, not an INTEGER",
            name,
            component.tag()
        )));
    }

    let bytes = component.value();
    match bytes.first() {
        None => Err(Error::MalformedSignature(format!("{} has no content", name))),
        Some(lead) if lead & 0x80 != 0 => Err(Error::MalformedSignature(format!(
            "signature contained a negative {} value",
            name
        ))),
        Some(_) if bytes.iter().all(|b| *b == 0) => Err(Error::MalformedSignature(format!(
            "signature contained a zero {} value",
            name
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// SEQUENCE { INTEGER r, INTEGER s } with single-byte contents
    fn container(r: u8, s: u8) -> Signature {
        Signature::new(vec![0x30, 0x06, 0x02, 0x01, r, 0x02, 0x01, s])
    }

    #[rstest]
    #[case::zero_r(container(0x00, 0x01), "zero r")]
    #[case::zero_s(container(0x01, 0x00), "zero s")]
    #[case::negative_r(container(0xff, 0x01), "negative r")]
    #[case::negative_s(container(0x01, 0x80), "negative s")]
    fn test_non_positive_components_rejected(#[case] sig: Signature, #[case] expected: &str) {
        match sig.decode() {
            Err(Error::MalformedSignature(msg)) => assert!(msg.contains(expected), "{}", msg),
            other => panic!("expected MalformedSignature, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_byte_zero_rejected() {
        // r = 0x0000 is not minimal DER, but it must still be caught as zero
        let sig = Signature::new(vec![0x30, 0x07, 0x02, 0x02, 0x00, 0x00, 0x02, 0x01, 0x01]);
        assert!(matches!(sig.decode(), Err(Error::MalformedSignature(_))));
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::garbage(b"not a signature".to_vec())]
    #[case::truncated(vec![0x30, 0x06, 0x02, 0x01, 0x01])]
    #[case::octet_string_component(vec![0x30, 0x06, 0x04, 0x01, 0x01, 0x02, 0x01, 0x01])]
    #[case::trailing_bytes(vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x00])]
    fn test_undecodable_containers_rejected(#[case] bytes: Vec<u8>) {
        assert!(matches!(
            Signature::new(bytes).decode(),
            Err(Error::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_small_positive_components_pass_container_checks() {
        // Structurally valid; the curve accepts any r, s in [1, n)
        assert!(container(0x01, 0x01).decode().is_ok());
    }

    #[test]
    fn test_base64() {
        assert_eq!(Signature::new(b"abcd".to_vec()).to_base64(), "YWJjZA==");
    }
}
