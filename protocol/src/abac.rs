//! # Attribute-Based Access Control Metadata
//!
//! With ABAC enabled, a transaction's metadata is not the application's raw
//! bytes but an encoding that binds those bytes to the signing transient
//! certificate and to the attribute names the caller wants the chaincode to
//! see. The binding is keyed by the tCert's derived key, so only a holder of
//! that key (the caller, or the attribute authority that issued the tCert)
//! can produce bindings that check out.
//!
//! [`AbacEncoder`] is the seam. [`AttributeBindingEncoder`] is the default
//! implementation; deployments with their own attribute scheme plug in a
//! different one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DERIVED_KEY_LENGTH;
use crate::crypto::hash::{certificate_fingerprint, keyed_hash, sha256};

/// Version byte of the [`AbacMetadata`] layout.
pub const ABAC_METADATA_VERSION: u8 = 1;

/// Errors from an ABAC encoder.
#[derive(Debug, Error)]
pub enum AbacError {
    #[error("certificate bytes are empty")]
    EmptyCertificate,

    #[error("attribute name at position {0} is empty")]
    EmptyAttributeName(usize),

    #[error("metadata serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("unsupported ABAC metadata version {0}")]
    UnsupportedVersion(u8),

    /// Raised by encoders backed by an external attribute service.
    #[error("attribute encoder unavailable: {0}")]
    Unavailable(String),
}

/// Binds metadata to a certificate and a list of requested attributes.
///
/// `attributes` is order-significant and may contain duplicates; encoders
/// must preserve both.
pub trait AbacEncoder: Send + Sync {
    fn encode(
        &self,
        certificate: &[u8],
        base_metadata: &[u8],
        derived_key: &[u8; DERIVED_KEY_LENGTH],
        attributes: &[String],
    ) -> Result<Vec<u8>, AbacError>;
}

// ---------------------------------------------------------------------------
// AttributeBindingEncoder
// ---------------------------------------------------------------------------

/// One requested attribute and its binding to the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundAttribute {
    pub name: String,
    /// `BLAKE3-keyed(derived_key, SHA-256(cert) || name)`.
    pub binding: [u8; 32],
}

/// Decoded form of the metadata written by [`AttributeBindingEncoder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbacMetadata {
    pub version: u8,
    /// SHA-256 fingerprint of the binding certificate, hex.
    pub certificate_fingerprint: String,
    pub base_metadata: Vec<u8>,
    pub attributes: Vec<BoundAttribute>,
}

impl AbacMetadata {
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }
}

/// Default [`AbacEncoder`]: bincode-encoded [`AbacMetadata`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeBindingEncoder;

impl AttributeBindingEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Inverse of [`AbacEncoder::encode`].
    pub fn decode(bytes: &[u8]) -> Result<AbacMetadata, AbacError> {
        let metadata: AbacMetadata = bincode::deserialize(bytes)?;
        if metadata.version != ABAC_METADATA_VERSION {
            return Err(AbacError::UnsupportedVersion(metadata.version));
        }
        Ok(metadata)
    }

    /// Recomputes every binding in `metadata` and checks it against
    /// `certificate` and `derived_key`.
    pub fn verify_bindings(
        metadata: &AbacMetadata,
        certificate: &[u8],
        derived_key: &[u8; DERIVED_KEY_LENGTH],
    ) -> bool {
        if metadata.certificate_fingerprint != certificate_fingerprint(certificate) {
            return false;
        }
        let cert_digest = sha256(certificate);
        metadata
            .attributes
            .iter()
            .all(|attr| attr.binding == bind(derived_key, &cert_digest, &attr.name))
    }
}

fn bind(derived_key: &[u8; DERIVED_KEY_LENGTH], cert_digest: &[u8; 32], name: &str) -> [u8; 32] {
    let mut input = Vec::with_capacity(cert_digest.len() + name.len());
    input.extend_from_slice(cert_digest);
    input.extend_from_slice(name.as_bytes());
    keyed_hash(derived_key, &input)
}

impl AbacEncoder for AttributeBindingEncoder {
    fn encode(
        &self,
        certificate: &[u8],
        base_metadata: &[u8],
        derived_key: &[u8; DERIVED_KEY_LENGTH],
        attributes: &[String],
    ) -> Result<Vec<u8>, AbacError> {
        if certificate.is_empty() {
            return Err(AbacError::EmptyCertificate);
        }
        if let Some(pos) = attributes.iter().position(String::is_empty) {
            return Err(AbacError::EmptyAttributeName(pos));
        }

        let cert_digest = sha256(certificate);
        let metadata = AbacMetadata {
            version: ABAC_METADATA_VERSION,
            certificate_fingerprint: hex::encode(cert_digest),
            base_metadata: base_metadata.to_vec(),
            attributes: attributes
                .iter()
                .map(|name| BoundAttribute {
                    name: name.clone(),
                    binding: bind(derived_key, &cert_digest, name),
                })
                .collect(),
        };

        Ok(bincode::serialize(&metadata)?)
    }
}
