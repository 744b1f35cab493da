//! Transaction verification.
//!
//! Verification means exactly one thing here: the signature matches the
//! public key inside the embedded certificate. Whether that certificate is
//! trusted is a membership-service question and is not answered here.
//!
//! The checks short-circuit in this order:
//!
//! 1. **Credential pair** — `cert` and `signature` both present.
//! 2. **Certificate** — parses as X.509 with an Ed25519 key.
//! 3. **Encoding** — canonical bytes computed from `&Transaction`; the
//!    signature field is never touched, so concurrent readers are safe.
//! 4. **Signature** — Ed25519 check. A procedural failure (wrong length) is
//!    `SignatureCheckFailed`; a clean mismatch is `InvalidSignature`.

use tracing::{debug, error};

use super::builder::Transaction;
use super::error::{MissingPart, Stage, TransactionError};
use crate::crypto::certificate::{parse_certificate, ParsedCertificate};
use crate::crypto::signatures::check_signature;

/// Verifies a signed transaction and returns the parsed signer certificate.
pub fn verify_transaction(tx: &Transaction) -> Result<ParsedCertificate, TransactionError> {
    let txid = tx.txid.as_str();

    let (cert, signature) = match (&tx.cert, &tx.signature) {
        (Some(cert), Some(signature)) => (cert, signature),
        _ => {
            let missing = tx.missing_credential().unwrap_or(MissingPart::Both);
            error!(txid, %missing, "transaction is not properly signed");
            return Err(TransactionError::MissingCredential {
                stage: Stage::Verify,
                txid: txid.to_string(),
                missing,
            });
        }
    };

    let parsed = parse_certificate(cert).map_err(|source| {
        error!(txid, error = %source, "failed parsing certificate");
        TransactionError::CertificateParseFailed {
            txid: txid.to_string(),
            source,
        }
    })?;

    let signable = tx.signable_bytes().map_err(|source| {
        error!(txid, error = %source, "failed marshaling transaction");
        TransactionError::MarshalFailed {
            stage: Stage::Verify,
            txid: txid.to_string(),
            source,
        }
    })?;

    let matches = check_signature(parsed.public_key.as_bytes(), &signable, signature)
        .map_err(|source| {
            error!(txid, error = %source, "failed checking signature");
            TransactionError::SignatureCheckFailed {
                txid: txid.to_string(),
                source,
            }
        })?;

    if !matches {
        error!(txid, signer = ?parsed.subject_cn, "invalid signature");
        return Err(TransactionError::InvalidSignature {
            txid: txid.to_string(),
        });
    }

    debug!(txid, signer = ?parsed.subject_cn, "signature verified");
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signatures::SignatureError;
    use crate::identity::{EnrollmentCredential, TransientCertificate};
    use crate::transaction::builder::{BuildRequest, TransactionBuilder};
    use crate::transaction::signing::sign_transaction;
    use crate::transaction::types::*;

    fn signed() -> (Transaction, EnrollmentCredential) {
        let ecert = EnrollmentCredential::issue("alice").unwrap();
        let spec = ChaincodeInvocationSpec::new(
            ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("mycc"))
                .args(["invoke", "a", "b", "10"]),
        );
        let mut tx = TransactionBuilder::new()
            .build_execute(&spec, &BuildRequest::new("tx-v"))
            .unwrap();
        sign_transaction(&mut tx, &ecert).unwrap();
        (tx, ecert)
    }

    #[test]
    fn valid_transaction_verifies() {
        let (tx, _) = signed();
        let signer = verify_transaction(&tx).unwrap();
        assert_eq!(signer.subject_cn.as_deref(), Some("alice"));
    }

    #[test]
    fn transient_certificate_verifies() {
        let tcert = TransientCertificate::issue("tcert", [2u8; 32]).unwrap();
        let (mut tx, _) = signed();
        sign_transaction(&mut tx, &tcert).unwrap();
        assert!(verify_transaction(&tx).is_ok());
    }

    #[test]
    fn unsigned_transaction_is_missing_both() {
        let (mut tx, _) = signed();
        tx.cert = None;
        tx.signature = None;
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::MissingCredential {
                missing: MissingPart::Both,
                ..
            })
        ));
    }

    #[test]
    fn cert_without_signature_is_missing_credential() {
        let (mut tx, _) = signed();
        tx.signature = None;
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::MissingCredential {
                missing: MissingPart::Signature,
                ..
            })
        ));
    }

    #[test]
    fn signature_without_cert_is_missing_credential() {
        let (mut tx, _) = signed();
        tx.cert = None;
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::MissingCredential {
                missing: MissingPart::Certificate,
                ..
            })
        ));
    }

    #[test]
    fn garbage_cert_is_parse_failure() {
        let (mut tx, _) = signed();
        tx.cert = Some(b"not a certificate".to_vec());
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::CertificateParseFailed { .. })
        ));
    }

    #[test]
    fn tampered_payload_is_invalid_signature() {
        let (mut tx, _) = signed();
        tx.payload[0] ^= 0x01;
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn tampered_metadata_is_invalid_signature() {
        let (mut tx, _) = signed();
        tx.metadata.push(0);
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn swapped_cert_is_invalid_signature() {
        let (mut tx, _) = signed();
        let other = EnrollmentCredential::issue("mallory").unwrap();
        tx.cert = Some(crate::identity::Credential::certificate(&other).to_vec());
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn truncated_signature_is_check_failure() {
        let (mut tx, _) = signed();
        if let Some(sig) = tx.signature.as_mut() {
            sig.truncate(10);
        }
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::SignatureCheckFailed {
                source: SignatureError::InvalidSignatureLength(10),
                ..
            })
        ));
    }
}
