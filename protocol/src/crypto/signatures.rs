//! # Digital Signatures
//!
//! Signature checks over raw bytes pulled off the wire.
//!
//! Verification separates two outcomes that callers must never conflate:
//!
//! - `Ok(false)`: the check ran and the signature does not match. That is
//!   forgery or corruption.
//! - `Err(_)`: the check could not run at all (bad key bytes, wrong
//!   signature length). That is a procedural failure.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use thiserror::Error;

use crate::config::{SIGNATURE_LENGTH, VERIFYING_KEY_LENGTH};

/// Reasons a signature check could not be carried out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature length: expected {SIGNATURE_LENGTH} bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("invalid public key length: expected {VERIFYING_KEY_LENGTH} bytes, got {0}")]
    InvalidPublicKeyLength(usize),

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Checks an Ed25519 signature given as raw bytes.
///
/// Returns `Ok(true)` on a match and `Ok(false)` on a well-formed mismatch.
pub fn check_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, SignatureError> {
    let key_bytes: [u8; VERIFYING_KEY_LENGTH] = public_key
        .try_into()
        .map_err(|_| SignatureError::InvalidPublicKeyLength(public_key.len()))?;
    let sig_bytes: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| SignatureError::InvalidSignatureLength(signature.len()))?;

    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
    let signature = DalekSignature::from_bytes(&sig_bytes);

    Ok(verifying_key.verify(message, &signature).is_ok())
}
