//! # X.509 Certificates
//!
//! Certificates travel inside every signed transaction. Verifiers parse the
//! embedded DER with `x509-parser` and recover the Ed25519 public key from
//! the subject public key info; nothing else about the certificate is
//! trusted or checked here (no chain, no validity window).
//!
//! [`issue_self_signed`] mints development certificates with `rcgen`. Real
//! deployments get theirs from the membership service.

use rcgen::{CertificateParams, DnType, DnValue, KeyPair as IssuerKeyPair};
use thiserror::Error;
use x509_parser::prelude::*;

use super::hash::certificate_fingerprint;
use super::keys::{Keypair, PublicKey};

/// Object identifier of the Ed25519 public key algorithm (RFC 8410).
const ED25519_OID: &str = "1.3.101.112";

/// Errors while parsing or issuing certificates.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate bytes are empty")]
    Empty,

    #[error("malformed certificate: {0}")]
    Malformed(String),

    #[error("unsupported public key algorithm {0}, expected Ed25519")]
    UnsupportedKeyAlgorithm(String),

    #[error("certificate carries an invalid Ed25519 public key")]
    InvalidPublicKey,

    #[error("malformed PEM certificate: {0}")]
    Pem(String),

    #[error("certificate issuance failed: {0}")]
    Issue(String),
}

/// The parts of a certificate the transaction layer cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    pub public_key: PublicKey,
    pub subject_cn: Option<String>,
    /// SHA-256 of the DER bytes, hex-encoded.
    pub fingerprint: String,
}

/// A freshly issued certificate in both encodings.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub der: Vec<u8>,
    pub pem: String,
}

/// Parses DER certificate bytes and recovers the subject's Ed25519 key.
///
/// Trailing bytes after the certificate are rejected; a certificate is the
/// whole field or nothing.
pub fn parse_certificate(der: &[u8]) -> Result<ParsedCertificate, CertificateError> {
    if der.is_empty() {
        return Err(CertificateError::Empty);
    }

    let (rest, cert) =
        X509Certificate::from_der(der).map_err(|e| CertificateError::Malformed(e.to_string()))?;
    if !rest.is_empty() {
        return Err(CertificateError::Malformed(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }

    let spki = cert.public_key();
    let algorithm = spki.algorithm.algorithm.to_id_string();
    if algorithm != ED25519_OID {
        return Err(CertificateError::UnsupportedKeyAlgorithm(algorithm));
    }

    let raw_key: &[u8] = &spki.subject_public_key.data;
    let public_key =
        PublicKey::try_from_slice(raw_key).map_err(|_| CertificateError::InvalidPublicKey)?;

    let subject_cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string);

    Ok(ParsedCertificate {
        public_key,
        subject_cn,
        fingerprint: certificate_fingerprint(der),
    })
}

/// Extracts the DER body of a PEM-encoded certificate.
pub fn der_from_pem(pem_bytes: &[u8]) -> Result<Vec<u8>, CertificateError> {
    let (_, pem) =
        x509_parser::pem::parse_x509_pem(pem_bytes).map_err(|e| CertificateError::Pem(e.to_string()))?;
    if pem.contents.is_empty() {
        return Err(CertificateError::Empty);
    }
    Ok(pem.contents)
}

/// Issues a self-signed certificate for `keypair` with the given subject CN.
pub fn issue_self_signed(
    keypair: &Keypair,
    common_name: &str,
) -> Result<IssuedCertificate, CertificateError> {
    let pkcs8 = keypair
        .to_pkcs8_der()
        .map_err(|e| CertificateError::Issue(e.to_string()))?;
    let signer = IssuerKeyPair::try_from(pkcs8.as_slice())
        .map_err(|e| CertificateError::Issue(e.to_string()))?;

    let mut params = CertificateParams::default();
    params.distinguished_name.push(
        DnType::CommonName,
        DnValue::Utf8String(common_name.to_string()),
    );

    let cert = params
        .self_signed(&signer)
        .map_err(|e| CertificateError::Issue(e.to_string()))?;

    Ok(IssuedCertificate {
        der: cert.der().to_vec(),
        pem: cert.pem(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_certificate_carries_the_keypair() {
        let kp = Keypair::generate();
        let issued = issue_self_signed(&kp, "alice").unwrap();
        let parsed = parse_certificate(&issued.der).unwrap();

        assert_eq!(parsed.public_key, kp.public_key());
        assert_eq!(parsed.subject_cn.as_deref(), Some("alice"));
        assert_eq!(parsed.fingerprint.len(), 64);
    }

    #[test]
    fn pem_and_der_agree() {
        let kp = Keypair::generate();
        let issued = issue_self_signed(&kp, "bob").unwrap();
        assert!(issued.pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(der_from_pem(issued.pem.as_bytes()).unwrap(), issued.der);
    }

    #[test]
    fn empty_bytes_rejected() {
        assert!(matches!(parse_certificate(&[]), Err(CertificateError::Empty)));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            parse_certificate(b"definitely not DER"),
            Err(CertificateError::Malformed(_))
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let kp = Keypair::generate();
        let mut der = issue_self_signed(&kp, "carol").unwrap().der;
        der.push(0x00);
        assert!(matches!(
            parse_certificate(&der),
            Err(CertificateError::Malformed(_))
        ));
    }

    #[test]
    fn non_pem_input_rejected() {
        assert!(der_from_pem(b"no armor here").is_err());
    }

    #[test]
    fn fingerprints_differ_per_certificate() {
        let a = issue_self_signed(&Keypair::generate(), "a").unwrap();
        let b = issue_self_signed(&Keypair::generate(), "b").unwrap();
        assert_ne!(
            parse_certificate(&a.der).unwrap().fingerprint,
            parse_certificate(&b.der).unwrap().fingerprint
        );
    }
}
