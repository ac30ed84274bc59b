//! X.509 certificate utilities
//!
//! Parses the short-lived signing certificate and extracts the key that
//! verifies artifact signatures. Key extraction is an explicit match over
//! the algorithm identifier; anything other than ECDSA P-256 is refused
//! with [`Error::UnsupportedKeyType`].

use crate::encoding::{CertificateDer, PublicKeySpki};
use crate::error::{Error, Result};
use crate::verification::VerificationKey;
use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1};
use const_oid::db::rfc8410::ID_ED_25519;
use const_oid::ObjectIdentifier;
use x509_cert::der::{Decode, Encode, Tag, Tagged};
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

/// Fulcio issuer OID: 1.3.6.1.4.1.57264.1.1
/// This extension contains the OIDC issuer URL
const FULCIO_ISSUER_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.1");

/// Public key algorithm found in a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// ECDSA over NIST P-256
    EcdsaP256,
    /// ECDSA over NIST P-384
    EcdsaP384,
    /// ECDSA over a curve we do not recognise
    EcdsaUnknownCurve(Option<ObjectIdentifier>),
    /// RSA
    Rsa,
    /// Ed25519
    Ed25519,
    /// Anything else
    Unknown(ObjectIdentifier),
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAlgorithm::EcdsaP256 => write!(f, "ECDSA P-256"),
            KeyAlgorithm::EcdsaP384 => write!(f, "ECDSA P-384"),
            KeyAlgorithm::EcdsaUnknownCurve(Some(oid)) => write!(f, "ECDSA on curve {}", oid),
            KeyAlgorithm::EcdsaUnknownCurve(None) => write!(f, "ECDSA without curve parameters"),
            KeyAlgorithm::Rsa => write!(f, "RSA"),
            KeyAlgorithm::Ed25519 => write!(f, "Ed25519"),
            KeyAlgorithm::Unknown(oid) => write!(f, "algorithm {}", oid),
        }
    }
}

/// Information extracted from a signing certificate
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// The certificate itself
    pub der: CertificateDer,
    /// Serial number, hex encoded
    pub serial_number: String,
    /// Identity from SAN extension (email or URI)
    pub identity: Option<String>,
    /// OIDC issuer URL from the Fulcio extension
    pub issuer: Option<String>,
    /// Not valid before (Unix timestamp)
    pub not_before: i64,
    /// Not valid after (Unix timestamp)
    pub not_after: i64,
    /// Public key in DER-encoded SPKI format
    pub public_key: PublicKeySpki,
    /// Algorithm of the embedded public key
    pub key_algorithm: KeyAlgorithm,
}

impl CertificateInfo {
    /// The key that verifies signatures made under this certificate
    ///
    /// Fails with [`Error::UnsupportedKeyType`] unless the certificate
    /// carries an ECDSA P-256 key.
    pub fn verification_key(&self) -> Result<VerificationKey> {
        match &self.key_algorithm {
            KeyAlgorithm::EcdsaP256 => VerificationKey::from_spki_der(self.public_key.as_bytes())
                .map_err(|e| match e {
                    Error::InvalidKeyFormat(msg) => Error::InvalidCertificate(msg),
                    other => other,
                }),
            other => Err(Error::UnsupportedKeyType(format!(
                "certificate carries a {} key, expected ECDSA P-256",
                other
            ))),
        }
    }
}

/// Parse a PEM-encoded certificate (the first block if several are present)
pub fn parse_certificate_pem(pem_bytes: &[u8]) -> Result<CertificateInfo> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|_| Error::InvalidCertificate("certificate file is not valid UTF-8".into()))?;
    let der = CertificateDer::chain_from_pem(pem_str)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidCertificate("no CERTIFICATE block found".to_string()))?;
    parse_certificate_info(der)
}

/// Parse certificate information from a DER-encoded certificate
pub fn parse_certificate_info(der: CertificateDer) -> Result<CertificateInfo> {
    let cert = Certificate::from_der(der.as_bytes())
        .map_err(|e| Error::InvalidCertificate(format!("failed to parse certificate: {}", e)))?;

    let tbs = &cert.tbs_certificate;
    let not_before = tbs.validity.not_before.to_unix_duration().as_secs() as i64;
    let not_after = tbs.validity.not_after.to_unix_duration().as_secs() as i64;
    let serial_number = hex::encode(tbs.serial_number.as_bytes());

    let public_key_info = &tbs.subject_public_key_info;
    let public_key_der = public_key_info
        .to_der()
        .map_err(|e| Error::InvalidCertificate(format!("failed to encode SPKI: {}", e)))?;
    let key_algorithm = key_algorithm(public_key_info);

    let identity = extract_san_identity(&cert)?;
    let issuer = extract_fulcio_issuer(&cert);

    Ok(CertificateInfo {
        der,
        serial_number,
        identity,
        issuer,
        not_before,
        not_after,
        public_key: PublicKeySpki::new(public_key_der),
        key_algorithm,
    })
}

/// Classify the SubjectPublicKeyInfo algorithm
fn key_algorithm(spki: &SubjectPublicKeyInfoOwned) -> KeyAlgorithm {
    let alg_oid = spki.algorithm.oid;

    if alg_oid == ID_EC_PUBLIC_KEY {
        // Explicit curve parameters and NULL are not a named curve
        let named = spki
            .algorithm
            .parameters
            .as_ref()
            .filter(|params| params.tag() == Tag::ObjectIdentifier)
            .and_then(|params| ObjectIdentifier::from_bytes(params.value()).ok());
        let Some(curve_oid) = named else {
            return KeyAlgorithm::EcdsaUnknownCurve(None);
        };
        return match curve_oid {
            oid if oid == SECP_256_R_1 => KeyAlgorithm::EcdsaP256,
            oid if oid == SECP_384_R_1 => KeyAlgorithm::EcdsaP384,
            oid => KeyAlgorithm::EcdsaUnknownCurve(Some(oid)),
        };
    }

    match alg_oid {
        oid if oid == RSA_ENCRYPTION => KeyAlgorithm::Rsa,
        oid if oid == ID_ED_25519 => KeyAlgorithm::Ed25519,
        oid => KeyAlgorithm::Unknown(oid),
    }
}

/// Extract identity from Subject Alternative Name (SAN) extension
pub fn extract_san_identity(cert: &Certificate) -> Result<Option<String>> {
    use x509_cert::ext::pkix::name::GeneralName;
    use x509_cert::ext::pkix::SubjectAltName;

    let san_opt: Option<(bool, SubjectAltName)> = cert
        .tbs_certificate
        .get()
        .map_err(|e| Error::InvalidCertificate(format!("failed to get SAN extension: {}", e)))?;

    let Some((_critical, san)) = san_opt else {
        return Ok(None);
    };

    for name in san.0.iter() {
        match name {
            GeneralName::Rfc822Name(email) => return Ok(Some(email.to_string())),
            GeneralName::UniformResourceIdentifier(uri) => return Ok(Some(uri.to_string())),
            _ => continue,
        }
    }

    Ok(None)
}

/// Extract the OIDC issuer from the Fulcio certificate extension
pub fn extract_fulcio_issuer(cert: &Certificate) -> Option<String> {
    let extensions = cert.tbs_certificate.extensions.as_ref()?;

    extensions
        .iter()
        .find(|ext| ext.extn_id == FULCIO_ISSUER_OID)
        .and_then(|ext| std::str::from_utf8(ext.extn_value.as_bytes()).ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::EphemeralKeyPair;
    use const_oid::db::rfc5912::ECDSA_WITH_SHA_256;
    use p256::ecdsa::signature::Signer;
    use rstest::rstest;
    use std::str::FromStr;
    use std::time::Duration;
    use x509_cert::certificate::{TbsCertificate, Version};
    use x509_cert::der::asn1::BitString;
    use x509_cert::der::Any;
    use x509_cert::name::Name;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::AlgorithmIdentifierOwned;
    use x509_cert::time::Validity;

    /// Certificate over `spki`, signed by a throwaway P-256 CA key
    fn certificate_for(spki: SubjectPublicKeyInfoOwned) -> String {
        let ca_key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let signature_algorithm = AlgorithmIdentifierOwned {
            oid: ECDSA_WITH_SHA_256,
            parameters: None,
        };
        let name = Name::from_str("CN=sget test").unwrap();
        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[42]).unwrap(),
            signature: signature_algorithm.clone(),
            issuer: name.clone(),
            validity: Validity::from_now(Duration::from_secs(600)).unwrap(),
            subject: name,
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        };
        let signature: p256::ecdsa::Signature = ca_key.sign(&tbs_certificate.to_der().unwrap());
        let cert = Certificate {
            tbs_certificate,
            signature_algorithm,
            signature: BitString::from_bytes(signature.to_der().as_bytes()).unwrap(),
        };
        CertificateDer::new(cert.to_der().unwrap()).to_pem()
    }

    fn spki_from_der(der: &[u8]) -> SubjectPublicKeyInfoOwned {
        SubjectPublicKeyInfoOwned::from_der(der).unwrap()
    }

    fn p384_spki() -> SubjectPublicKeyInfoOwned {
        use p384::pkcs8::EncodePublicKey;
        let key = p384::SecretKey::random(&mut rand::rngs::OsRng);
        spki_from_der(key.public_key().to_public_key_der().unwrap().as_bytes())
    }

    fn rsa_spki() -> SubjectPublicKeyInfoOwned {
        use rsa::pkcs8::EncodePublicKey;
        let key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).unwrap();
        let public = rsa::RsaPublicKey::from(&key);
        spki_from_der(public.to_public_key_der().unwrap().as_bytes())
    }

    fn ed25519_spki() -> SubjectPublicKeyInfoOwned {
        use ed25519_dalek::pkcs8::EncodePublicKey;
        let key = ed25519_dalek::SigningKey::from_bytes(&[7; 32]);
        spki_from_der(key.verifying_key().to_public_key_der().unwrap().as_bytes())
    }

    /// A P-256 point under EC parameters given by `parameters` instead of a curve OID
    fn ec_spki_with(parameters: Option<Any>) -> SubjectPublicKeyInfoOwned {
        let kp = EphemeralKeyPair::generate();
        let mut spki = spki_from_der(kp.public_key_spki().unwrap().as_bytes());
        spki.algorithm.parameters = parameters;
        spki
    }

    fn explicit_curve_spki() -> SubjectPublicKeyInfoOwned {
        // SEQUENCE { INTEGER 1, ... } as in SpecifiedECDomain
        let params = Any::new(Tag::Sequence, vec![0x02, 0x01, 0x01]).unwrap();
        ec_spki_with(Some(params))
    }

    fn null_curve_spki() -> SubjectPublicKeyInfoOwned {
        ec_spki_with(Some(Any::new(Tag::Null, Vec::<u8>::new()).unwrap()))
    }

    #[test]
    fn test_parse_p256_certificate() {
        let kp = EphemeralKeyPair::generate();
        let pem = certificate_for(spki_from_der(kp.public_key_spki().unwrap().as_bytes()));
        let info = parse_certificate_pem(pem.as_bytes()).unwrap();

        assert_eq!(info.key_algorithm, KeyAlgorithm::EcdsaP256);
        assert_eq!(info.public_key, kp.public_key_spki().unwrap());
        assert_eq!(info.serial_number, "2a");
        assert!(info.not_after - info.not_before <= 600);
        assert_eq!(info.verification_key().unwrap(), VerificationKey::from(&kp));
    }

    #[rstest]
    #[case::empty(b"".to_vec())]
    #[case::garbage(b"this is not a certificate".to_vec())]
    #[case::bad_base64(b"-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n".to_vec())]
    #[case::not_der(b"-----BEGIN CERTIFICATE-----\nYWJjZA==\n-----END CERTIFICATE-----\n".to_vec())]
    #[case::not_utf8(vec![0xff, 0xfe, 0x00, 0x80])]
    fn test_malformed_certificates(#[case] bytes: Vec<u8>) {
        assert!(matches!(
            parse_certificate_pem(&bytes),
            Err(Error::InvalidCertificate(_))
        ));
    }

    #[rstest]
    #[case::p384(p384_spki(), KeyAlgorithm::EcdsaP384)]
    #[case::rsa(rsa_spki(), KeyAlgorithm::Rsa)]
    #[case::ed25519(ed25519_spki(), KeyAlgorithm::Ed25519)]
    #[case::explicit_curve(explicit_curve_spki(), KeyAlgorithm::EcdsaUnknownCurve(None))]
    #[case::null_curve(null_curve_spki(), KeyAlgorithm::EcdsaUnknownCurve(None))]
    #[case::no_curve(ec_spki_with(None), KeyAlgorithm::EcdsaUnknownCurve(None))]
    fn test_unsupported_key_types(
        #[case] spki: SubjectPublicKeyInfoOwned,
        #[case] expected: KeyAlgorithm,
    ) {
        let pem = certificate_for(spki);
        let info = parse_certificate_pem(pem.as_bytes()).unwrap();
        assert_eq!(info.key_algorithm, expected);
        assert!(matches!(
            info.verification_key(),
            Err(Error::UnsupportedKeyType(_))
        ));
    }

    #[rstest]
    #[case::off_curve({
        let mut point = vec![0x04];
        point.extend([0u8; 31]);
        point.push(1);
        point.extend([0u8; 31]);
        point.push(1);
        point
    })]
    #[case::truncated(vec![0x04, 0x01, 0x02])]
    #[case::bad_prefix(vec![0x07; 65])]
    fn test_corrupt_p256_point_is_invalid_certificate(#[case] point: Vec<u8>) {
        let kp = EphemeralKeyPair::generate();
        let mut spki = spki_from_der(kp.public_key_spki().unwrap().as_bytes());
        spki.subject_public_key = BitString::from_bytes(&point).unwrap();

        let info = parse_certificate_pem(certificate_for(spki).as_bytes()).unwrap();
        assert_eq!(info.key_algorithm, KeyAlgorithm::EcdsaP256);
        assert!(matches!(
            info.verification_key(),
            Err(Error::InvalidCertificate(_))
        ));
    }
}
