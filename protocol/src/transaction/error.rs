//! Error types for the transaction lifecycle.
//!
//! Every variant says which stage failed and, where one exists, which
//! transaction id was being processed. Nothing here is retried internally.

use std::fmt;

use thiserror::Error;

use super::canonical::EncodingError;
use super::confidential::EngineError;
use crate::abac::AbacError;
use crate::crypto::certificate::CertificateError;
use crate::crypto::nonce::NonceError;
use crate::crypto::signatures::SignatureError;
use crate::identity::CredentialError;

/// Lifecycle stage at which an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Enrich,
    Nonce,
    Seal,
    Sign,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Enrich => write!(f, "enrich"),
            Self::Nonce => write!(f, "nonce"),
            Self::Seal => write!(f, "seal"),
            Self::Sign => write!(f, "sign"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// Which half of the `{cert, signature}` pair is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPart {
    Both,
    Certificate,
    Signature,
}

impl fmt::Display for MissingPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Both => write!(f, "certificate and signature"),
            Self::Certificate => write!(f, "certificate"),
            Self::Signature => write!(f, "signature"),
        }
    }
}

/// Errors raised while building, signing, or verifying a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("[{stage}] tx {txid}: secure randomness unavailable")]
    RandomnessUnavailable {
        stage: Stage,
        txid: String,
        #[source]
        source: NonceError,
    },

    #[error("[{stage}] tx {txid}: missing {missing}")]
    MissingCredential {
        stage: Stage,
        txid: String,
        missing: MissingPart,
    },

    #[error("[nonce] tx {txid}: caller-supplied nonce is {len} bytes, at least {min} required")]
    MalformedNonce { txid: String, len: usize, min: usize },

    #[error("[enrich] tx {txid}: metadata encoding failed")]
    MetadataEncodingFailed {
        txid: String,
        #[source]
        source: AbacError,
    },

    #[error("[seal] tx {txid}: encryption failed")]
    EncryptionFailed {
        txid: String,
        #[source]
        source: EngineError,
    },

    #[error("[{stage}] tx {txid}: encoding failed")]
    MarshalFailed {
        stage: Stage,
        txid: String,
        #[source]
        source: EncodingError,
    },

    #[error("[sign] tx {txid}: signing failed")]
    SigningFailed {
        txid: String,
        #[source]
        source: CredentialError,
    },

    #[error("[verify] tx {txid}: signature check could not run")]
    SignatureCheckFailed {
        txid: String,
        #[source]
        source: SignatureError,
    },

    #[error("[verify] tx {txid}: signature does not match the embedded certificate")]
    InvalidSignature { txid: String },

    #[error("[verify] tx {txid}: certificate could not be parsed")]
    CertificateParseFailed {
        txid: String,
        #[source]
        source: CertificateError,
    },

    #[error("[{stage}] client is not initialized")]
    NotInitialized { stage: Stage },
}

impl TransactionError {
    /// The transaction id the error refers to, when there is one.
    pub fn txid(&self) -> Option<&str> {
        match self {
            Self::RandomnessUnavailable { txid, .. }
            | Self::MissingCredential { txid, .. }
            | Self::MalformedNonce { txid, .. }
            | Self::MetadataEncodingFailed { txid, .. }
            | Self::EncryptionFailed { txid, .. }
            | Self::MarshalFailed { txid, .. }
            | Self::SigningFailed { txid, .. }
            | Self::SignatureCheckFailed { txid, .. }
            | Self::InvalidSignature { txid }
            | Self::CertificateParseFailed { txid, .. } => Some(txid),
            Self::NotInitialized { .. } => None,
        }
    }
}
