//! Canonical byte encoding of a transaction, the exact input to signing and
//! verification.
//!
//! Layout: one format-version byte, then one record per field in ascending
//! tag order. Each record is `tag (u8) || len (u32 LE) || value`. Optional
//! fields that are absent produce no record at all. The signature is never
//! part of the encoding, so signer and verifier compute it from the same
//! `&Transaction` without touching the signature field.

use thiserror::Error;

use super::builder::Transaction;
use crate::config::CANONICAL_ENCODING_VERSION;

/// Errors from the canonical or wire encodings.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("field {field} is {len} bytes, longer than a u32 length prefix allows")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("wire encoding failed: {0}")]
    Wire(#[from] bincode::Error),
}

/// Field tags, in encoding order. Never reorder or reuse a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    TxType = 1,
    ChaincodeId = 2,
    Payload = 3,
    Metadata = 4,
    Txid = 5,
    Timestamp = 6,
    ConfidentialityLevel = 7,
    ConfidentialityProtocolVersion = 8,
    Nonce = 9,
    Cert = 10,
}

impl Tag {
    fn name(self) -> &'static str {
        match self {
            Self::TxType => "tx_type",
            Self::ChaincodeId => "chaincode_id",
            Self::Payload => "payload",
            Self::Metadata => "metadata",
            Self::Txid => "txid",
            Self::Timestamp => "timestamp_ms",
            Self::ConfidentialityLevel => "confidentiality_level",
            Self::ConfidentialityProtocolVersion => "confidentiality_protocol_version",
            Self::Nonce => "nonce",
            Self::Cert => "cert",
        }
    }
}

struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn new(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity);
        buf.push(CANONICAL_ENCODING_VERSION);
        Self { buf }
    }

    fn field(&mut self, tag: Tag, value: &[u8]) -> Result<(), EncodingError> {
        let len = u32::try_from(value.len()).map_err(|_| EncodingError::FieldTooLong {
            field: tag.name(),
            len: value.len(),
        })?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(value);
        Ok(())
    }

    fn optional(&mut self, tag: Tag, value: Option<&[u8]>) -> Result<(), EncodingError> {
        match value {
            Some(v) => self.field(tag, v),
            None => Ok(()),
        }
    }
}

/// Encodes every field of `tx` except `signature`.
pub fn canonical_bytes(tx: &Transaction) -> Result<Vec<u8>, EncodingError> {
    let estimate = 64
        + tx.chaincode_id.len()
        + tx.payload.len()
        + tx.metadata.len()
        + tx.txid.len()
        + tx.nonce.len()
        + tx.cert.as_ref().map_or(0, Vec::len);
    let mut enc = Encoder::new(estimate);

    enc.field(Tag::TxType, &[tx.tx_type.code()])?;
    enc.field(Tag::ChaincodeId, &tx.chaincode_id)?;
    enc.field(Tag::Payload, &tx.payload)?;
    enc.field(Tag::Metadata, &tx.metadata)?;
    enc.field(Tag::Txid, tx.txid.as_bytes())?;
    enc.field(Tag::Timestamp, &tx.timestamp_ms.to_le_bytes())?;
    enc.field(
        Tag::ConfidentialityLevel,
        &[tx.confidentiality_level.code()],
    )?;
    enc.optional(
        Tag::ConfidentialityProtocolVersion,
        tx.confidentiality_protocol_version
            .as_deref()
            .map(str::as_bytes),
    )?;
    enc.field(Tag::Nonce, &tx.nonce)?;
    enc.optional(Tag::Cert, tx.cert.as_deref())?;

    Ok(enc.buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::{ConfidentialityLevel, TransactionType};
    use proptest::prelude::*;

    fn sample() -> Transaction {
        Transaction {
            tx_type: TransactionType::ChaincodeInvoke,
            chaincode_id: b"mycc".to_vec(),
            payload: b"invoke a b 10".to_vec(),
            metadata: Vec::new(),
            txid: "tx-1".into(),
            timestamp_ms: 1_700_000_000_000,
            confidentiality_level: ConfidentialityLevel::Public,
            confidentiality_protocol_version: None,
            nonce: vec![9u8; 24],
            cert: None,
            signature: None,
        }
    }

    #[test]
    fn starts_with_format_version() {
        let bytes = canonical_bytes(&sample()).unwrap();
        assert_eq!(bytes[0], CANONICAL_ENCODING_VERSION);
        assert_eq!(bytes[1], Tag::TxType as u8);
        assert_eq!(&bytes[2..6], &1u32.to_le_bytes());
        assert_eq!(bytes[6], TransactionType::ChaincodeInvoke.code());
    }

    #[test]
    fn signature_is_excluded() {
        let unsigned = sample();
        let mut signed = sample();
        signed.signature = Some(vec![0xFF; 64]);
        assert_eq!(
            canonical_bytes(&unsigned).unwrap(),
            canonical_bytes(&signed).unwrap()
        );
    }

    #[test]
    fn cert_is_included() {
        let mut with_cert = sample();
        with_cert.cert = Some(vec![1, 2, 3]);
        assert_ne!(
            canonical_bytes(&sample()).unwrap(),
            canonical_bytes(&with_cert).unwrap()
        );
    }

    #[test]
    fn absent_and_empty_optional_differ() {
        let mut empty_cert = sample();
        empty_cert.cert = Some(Vec::new());
        assert_ne!(
            canonical_bytes(&sample()).unwrap(),
            canonical_bytes(&empty_cert).unwrap()
        );
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        // Moving a byte from one field to its neighbour must change the
        // encoding; the length prefixes guarantee it.
        let mut a = sample();
        a.chaincode_id = b"ab".to_vec();
        a.payload = b"c".to_vec();
        let mut b = sample();
        b.chaincode_id = b"a".to_vec();
        b.payload = b"bc".to_vec();
        assert_ne!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(
            payload in proptest::collection::vec(any::<u8>(), 0..256),
            metadata in proptest::collection::vec(any::<u8>(), 0..64),
            nonce in proptest::collection::vec(any::<u8>(), 1..48),
            timestamp in any::<u64>(),
            confidential in any::<bool>(),
        ) {
            let mut tx = sample();
            tx.payload = payload;
            tx.metadata = metadata;
            tx.nonce = nonce;
            tx.timestamp_ms = timestamp;
            if confidential {
                tx.confidentiality_level = ConfidentialityLevel::Confidential;
                tx.confidentiality_protocol_version = Some("1.2".into());
            }
            let copy = tx.clone();
            prop_assert_eq!(canonical_bytes(&tx).unwrap(), canonical_bytes(&copy).unwrap());
        }
    }
}
