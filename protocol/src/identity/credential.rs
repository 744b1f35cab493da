//! Signing credentials.
//!
//! Two regimes coexist and must never be mixed up:
//!
//! - [`TransientCertificate`]: short-lived, transaction-scoped. Owned by the
//!   caller for one transaction (or a small batch) and never cached by the
//!   client. Carries the derived key material that ABAC binds attributes to.
//! - [`EnrollmentCredential`]: the client's long-term identity, held for the
//!   lifetime of the [`crate::client::Client`].
//!
//! The signer is written once against the [`Credential`] trait.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::DERIVED_KEY_LENGTH;
use crate::crypto::certificate::{der_from_pem, issue_self_signed, parse_certificate, CertificateError};
use crate::crypto::keys::{KeyError, Keypair};

/// Errors raised while assembling or using a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("certificate does not match the signing key")]
    KeyMismatch,

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised by external signers (HSMs, remote signing services).
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),
}

/// Which credential regime signed a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Transient,
    Enrollment,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "tcert"),
            Self::Enrollment => write!(f, "ecert"),
        }
    }
}

/// A certificate plus the private capability to sign under it.
pub trait Credential: Send + Sync {
    /// Raw DER bytes of the certificate that goes into `Transaction::cert`.
    fn certificate(&self) -> &[u8];

    /// Signs `message` with the private key matching [`Self::certificate`].
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CredentialError>;

    fn kind(&self) -> CredentialKind;
}

/// Rejects a certificate whose embedded key is not `keypair`'s public key.
fn ensure_matches(certificate: &[u8], keypair: &Keypair) -> Result<(), CredentialError> {
    let parsed = parse_certificate(certificate)?;
    if parsed.public_key != keypair.public_key() {
        return Err(CredentialError::KeyMismatch);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TransientCertificate
// ---------------------------------------------------------------------------

/// A transaction certificate (tCert).
pub struct TransientCertificate {
    certificate: Vec<u8>,
    keypair: Keypair,
    derived_key: Zeroizing<[u8; DERIVED_KEY_LENGTH]>,
}

impl TransientCertificate {
    pub fn new(
        certificate: Vec<u8>,
        keypair: Keypair,
        derived_key: [u8; DERIVED_KEY_LENGTH],
    ) -> Result<Self, CredentialError> {
        ensure_matches(&certificate, &keypair)?;
        Ok(Self {
            certificate,
            keypair,
            derived_key: Zeroizing::new(derived_key),
        })
    }

    /// Mints a self-signed tCert with a fresh keypair. Development only; real
    /// tCerts come from the transaction certificate authority.
    pub fn issue(
        common_name: &str,
        derived_key: [u8; DERIVED_KEY_LENGTH],
    ) -> Result<Self, CredentialError> {
        let keypair = Keypair::generate();
        let issued = issue_self_signed(&keypair, common_name)?;
        Self::new(issued.der, keypair, derived_key)
    }

    /// Key material derived for this certificate, used to bind ABAC
    /// attributes.
    pub fn derived_key(&self) -> &[u8; DERIVED_KEY_LENGTH] {
        &self.derived_key
    }
}

impl Credential for TransientCertificate {
    fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CredentialError> {
        Ok(self.keypair.sign(message).into_bytes())
    }

    fn kind(&self) -> CredentialKind {
        CredentialKind::Transient
    }
}

impl fmt::Debug for TransientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientCertificate")
            .field("certificate_len", &self.certificate.len())
            .field("keypair", &self.keypair)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EnrollmentCredential
// ---------------------------------------------------------------------------

/// The client's enrollment certificate (eCert) and enrollment key.
#[derive(Clone)]
pub struct EnrollmentCredential {
    certificate: Vec<u8>,
    keypair: Keypair,
}

impl EnrollmentCredential {
    pub fn new(certificate: Vec<u8>, keypair: Keypair) -> Result<Self, CredentialError> {
        ensure_matches(&certificate, &keypair)?;
        Ok(Self {
            certificate,
            keypair,
        })
    }

    /// Self-signed eCert with a fresh keypair. Development only.
    pub fn issue(common_name: &str) -> Result<Self, CredentialError> {
        let keypair = Keypair::generate();
        let issued = issue_self_signed(&keypair, common_name)?;
        Self::new(issued.der, keypair)
    }

    /// Loads a PEM certificate and a hex-encoded secret key from disk.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, CredentialError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|source| CredentialError::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        let certificate = der_from_pem(&read(cert_path)?)?;
        let key_hex = String::from_utf8_lossy(&read(key_path)?).into_owned();
        let keypair = Keypair::from_hex(&key_hex)?;

        Self::new(certificate, keypair)
    }
}

impl Credential for EnrollmentCredential {
    fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CredentialError> {
        Ok(self.keypair.sign(message).into_bytes())
    }

    fn kind(&self) -> CredentialKind {
        CredentialKind::Enrollment
    }
}

impl fmt::Debug for EnrollmentCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentCredential")
            .field("certificate_len", &self.certificate.len())
            .field("keypair", &self.keypair)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Signature;
    use std::io::Write;

    #[test]
    fn transient_certificate_signs_under_its_certificate() {
        let tcert = TransientCertificate::issue("tcert-1", [7u8; 32]).unwrap();
        let sig = tcert.sign(b"msg").unwrap();
        let parsed = parse_certificate(tcert.certificate()).unwrap();
        assert!(parsed.public_key.verify(b"msg", &Signature::from_slice(&sig)));
        assert_eq!(tcert.kind(), CredentialKind::Transient);
        assert_eq!(tcert.derived_key(), &[7u8; 32]);
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let issued = issue_self_signed(&Keypair::generate(), "someone").unwrap();
        let err = EnrollmentCredential::new(issued.der, Keypair::generate()).unwrap_err();
        assert!(matches!(err, CredentialError::KeyMismatch));
    }

    #[test]
    fn unparseable_certificate_is_rejected() {
        let err = TransientCertificate::new(vec![1, 2, 3], Keypair::generate(), [0u8; 32])
            .unwrap_err();
        assert!(matches!(err, CredentialError::Certificate(_)));
    }

    #[test]
    fn debug_hides_derived_key() {
        let tcert = TransientCertificate::issue("tcert-2", [0xAB; 32]).unwrap();
        let debug = format!("{:?}", tcert);
        assert!(!debug.contains("derived_key"));
        assert!(!debug.contains("171, 171"));
    }

    #[test]
    fn enrollment_loads_from_pem_and_hex_files() {
        let keypair = Keypair::generate();
        let issued = issue_self_signed(&keypair, "alice").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("enrollment.crt");
        let key_path = dir.path().join("enrollment.key");
        std::fs::write(&cert_path, &issued.pem).unwrap();
        let mut key_file = std::fs::File::create(&key_path).unwrap();
        writeln!(key_file, "{}", keypair.secret_key_hex()).unwrap();

        let ecert = EnrollmentCredential::load(&cert_path, &key_path).unwrap();
        assert_eq!(ecert.certificate(), issued.der.as_slice());
        assert_eq!(ecert.kind(), CredentialKind::Enrollment);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EnrollmentCredential::load(
            &dir.path().join("missing.crt"),
            &dir.path().join("missing.key"),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::Io { .. }));
    }
}
