//! Transaction signing.
//!
//! Signing is separate from building because the credential may not be at
//! hand at construction time. The procedure is the same for every
//! credential:
//!
//! 1. Attach the credential's certificate to `cert`.
//! 2. Compute [`Transaction::signable_bytes`] (which never includes the
//!    signature field).
//! 3. Sign with the credential and store the result in `signature`.
//!
//! A failed signing leaves the transaction exactly as it was passed in.

use tracing::{debug, error};

use super::builder::Transaction;
use super::error::{Stage, TransactionError};
use crate::identity::{Credential, TransientCertificate};

/// Signs `tx` in place under `credential`.
///
/// Not internally synchronized: a single transaction must not be signed
/// from two threads at once. Independent transactions may be signed
/// concurrently with the same credential.
pub fn sign_transaction<'a>(
    tx: &'a mut Transaction,
    credential: &dyn Credential,
) -> Result<&'a Transaction, TransactionError> {
    let previous_cert = tx.cert.replace(credential.certificate().to_vec());
    debug!(
        txid = %tx.txid,
        kind = %credential.kind(),
        cert_len = credential.certificate().len(),
        "appending certificate"
    );

    match compute_signature(tx, credential) {
        Ok(signature) => {
            debug!(txid = %tx.txid, sig_len = signature.len(), "appending signature");
            tx.signature = Some(signature);
            Ok(tx)
        }
        Err(e) => {
            tx.cert = previous_cert;
            Err(e)
        }
    }
}

/// Signs with a transaction certificate.
pub fn sign_with_transient_certificate<'a>(
    tx: &'a mut Transaction,
    tcert: &TransientCertificate,
) -> Result<&'a Transaction, TransactionError> {
    sign_transaction(tx, tcert)
}

fn compute_signature(
    tx: &Transaction,
    credential: &dyn Credential,
) -> Result<Vec<u8>, TransactionError> {
    let signable = tx.signable_bytes().map_err(|source| {
        error!(txid = %tx.txid, error = %source, "failed marshaling transaction");
        TransactionError::MarshalFailed {
            stage: Stage::Sign,
            txid: tx.txid.clone(),
            source,
        }
    })?;

    credential.sign(&signable).map_err(|source| {
        error!(txid = %tx.txid, error = %source, "failed signing transaction");
        TransactionError::SigningFailed {
            txid: tx.txid.clone(),
            source,
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
