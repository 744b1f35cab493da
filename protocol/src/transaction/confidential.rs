//! Confidential transactions.
//!
//! [`ConfidentialitySealer`] is what the builder calls: it stamps the
//! protocol version and hands the transaction to a [`ConfidentialityEngine`].
//! [`AesGcmEngine`] is the bundled engine.
//!
//! ## AesGcmEngine key schedule
//!
//! ```text
//! tx_key = BLAKE3-keyed(chain_key, nonce)
//! field' = AES-256-GCM(tx_key, field, aad = txid || 0x00 || field_name)
//! ```
//!
//! `payload` and `chaincode_id` are always sealed; `metadata` only when
//! non-empty. The nonce must therefore be resolved before sealing.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};
use zeroize::Zeroizing;

use super::builder::Transaction;
use super::error::TransactionError;
use super::types::ConfidentialityLevel;
use crate::config::{CONFIDENTIALITY_PROTOCOL_VERSION, DERIVED_KEY_LENGTH};
use crate::crypto::encryption::{self, EncryptionError};
use crate::crypto::hash::keyed_hash;

/// Errors from a confidentiality engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no confidentiality engine configured")]
    NoEngine,

    #[error("transaction has no nonce to derive a key from")]
    MissingNonce,

    #[error("transaction is not confidential")]
    NotConfidential,

    #[error("unsupported confidentiality protocol version {0:?}")]
    UnsupportedVersion(Option<String>),

    #[error("{field}: {source}")]
    Cipher {
        field: &'static str,
        #[source]
        source: EncryptionError,
    },
}

/// Transforms a transaction's sensitive fields in place.
pub trait ConfidentialityEngine: Send + Sync {
    fn seal_transaction(&self, tx: &mut Transaction) -> Result<(), EngineError>;

    /// Inverse of [`Self::seal_transaction`], for readers.
    fn unseal_transaction(&self, tx: &mut Transaction) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// ConfidentialitySealer
// ---------------------------------------------------------------------------

/// Applies confidentiality to transactions that ask for it.
#[derive(Clone, Default)]
pub struct ConfidentialitySealer {
    engine: Option<Arc<dyn ConfidentialityEngine>>,
}

impl ConfidentialitySealer {
    pub fn new(engine: Arc<dyn ConfidentialityEngine>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    /// A sealer that fails every confidential request.
    pub fn without_engine() -> Self {
        Self { engine: None }
    }

    /// No-op unless `level` is [`ConfidentialityLevel::Confidential`].
    ///
    /// On error the transaction is in an undefined, partially transformed
    /// state and must be discarded.
    pub fn seal(
        &self,
        tx: &mut Transaction,
        level: ConfidentialityLevel,
    ) -> Result<(), TransactionError> {
        if level != ConfidentialityLevel::Confidential {
            return Ok(());
        }

        tx.confidentiality_level = ConfidentialityLevel::Confidential;
        tx.confidentiality_protocol_version = Some(CONFIDENTIALITY_PROTOCOL_VERSION.to_string());

        let result = match &self.engine {
            Some(engine) => engine.seal_transaction(tx),
            None => Err(EngineError::NoEngine),
        };

        result.map_err(|source| {
            error!(txid = %tx.txid, error = %source, "confidentiality sealing failed");
            TransactionError::EncryptionFailed {
                txid: tx.txid.clone(),
                source,
            }
        })?;

        debug!(txid = %tx.txid, version = CONFIDENTIALITY_PROTOCOL_VERSION, "transaction sealed");
        Ok(())
    }
}

impl std::fmt::Debug for ConfidentialitySealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidentialitySealer")
            .field("has_engine", &self.engine.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AesGcmEngine
// ---------------------------------------------------------------------------

/// AES-256-GCM engine keyed by a chain-wide secret.
pub struct AesGcmEngine {
    chain_key: Zeroizing<[u8; DERIVED_KEY_LENGTH]>,
}

impl AesGcmEngine {
    pub fn new(chain_key: [u8; DERIVED_KEY_LENGTH]) -> Self {
        Self {
            chain_key: Zeroizing::new(chain_key),
        }
    }

    fn transaction_key(&self, tx: &Transaction) -> Result<Zeroizing<[u8; 32]>, EngineError> {
        if tx.nonce.is_empty() {
            return Err(EngineError::MissingNonce);
        }
        Ok(Zeroizing::new(keyed_hash(&self.chain_key, &tx.nonce)))
    }
}

fn field_aad(txid: &str, field: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(txid.len() + 1 + field.len());
    aad.extend_from_slice(txid.as_bytes());
    aad.push(0x00);
    aad.extend_from_slice(field.as_bytes());
    aad
}

fn seal_field(
    key: &[u8; 32],
    txid: &str,
    field: &'static str,
    value: &mut Vec<u8>,
) -> Result<(), EngineError> {
    let sealed = encryption::seal(key, value, &field_aad(txid, field))
        .map_err(|source| EngineError::Cipher { field, source })?;
    *value = sealed;
    Ok(())
}

fn open_field(
    key: &[u8; 32],
    txid: &str,
    field: &'static str,
    value: &mut Vec<u8>,
) -> Result<(), EngineError> {
    let opened = encryption::open(key, value, &field_aad(txid, field))
        .map_err(|source| EngineError::Cipher { field, source })?;
    *value = opened;
    Ok(())
}

impl ConfidentialityEngine for AesGcmEngine {
    fn seal_transaction(&self, tx: &mut Transaction) -> Result<(), EngineError> {
        let key = self.transaction_key(tx)?;
        let txid = tx.txid.clone();

        seal_field(&key, &txid, "payload", &mut tx.payload)?;
        seal_field(&key, &txid, "chaincode_id", &mut tx.chaincode_id)?;
        if !tx.metadata.is_empty() {
            seal_field(&key, &txid, "metadata", &mut tx.metadata)?;
        }
        Ok(())
    }

    fn unseal_transaction(&self, tx: &mut Transaction) -> Result<(), EngineError> {
        if tx.confidentiality_level != ConfidentialityLevel::Confidential {
            return Err(EngineError::NotConfidential);
        }
        if tx.confidentiality_protocol_version.as_deref() != Some(CONFIDENTIALITY_PROTOCOL_VERSION)
        {
            return Err(EngineError::UnsupportedVersion(
                tx.confidentiality_protocol_version.clone(),
            ));
        }

        let key = self.transaction_key(tx)?;
        let txid = tx.txid.clone();

        open_field(&key, &txid, "payload", &mut tx.payload)?;
        open_field(&key, &txid, "chaincode_id", &mut tx.chaincode_id)?;
        if !tx.metadata.is_empty() {
            open_field(&key, &txid, "metadata", &mut tx.metadata)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for AesGcmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesGcmEngine(..)")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
