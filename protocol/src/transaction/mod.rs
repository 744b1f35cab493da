//! # Transaction Module
//!
//! Construction, confidentiality, signing and verification of chaincode
//! transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — Chaincode specs, TransactionType, ConfidentialityLevel
//! builder.rs      — Transaction and the TransactionBuilder pipeline
//! metadata.rs     — MetadataEnricher (ABAC or pass-through)
//! confidential.rs — ConfidentialitySealer, ConfidentialityEngine, AesGcmEngine
//! canonical.rs    — Deterministic signing encoding
//! signing.rs      — Attach cert, sign canonical bytes
//! verification.rs — Recover key from cert, check signature
//! error.rs        — TransactionError
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** — [`TransactionBuilder`] enriches metadata, resolves the
//!    nonce, and seals confidential payloads.
//! 2. **Sign** — [`sign_transaction`] with a transient or enrollment
//!    credential.
//! 3. **Submit** — [`Transaction::to_wire_bytes`] for the network layer.
//! 4. **Verify** — receivers run [`verify_transaction`].
//!
//! ## Design Decisions
//!
//! - The signature is excluded from its own signing input by the encoder,
//!   never by clearing and restoring the field. Verification takes
//!   `&Transaction` and is safe for concurrent readers.
//! - Confidentiality is applied before signing, so the signature covers the
//!   ciphertext that actually travels.
//! - Caller nonces shorter than 16 bytes are rejected.

pub mod builder;
pub mod canonical;
pub mod confidential;
pub mod error;
pub mod metadata;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{BuildRequest, Transaction, TransactionBuilder};
pub use canonical::{canonical_bytes, EncodingError};
pub use confidential::{AesGcmEngine, ConfidentialityEngine, ConfidentialitySealer, EngineError};
pub use error::{MissingPart, Stage, TransactionError};
pub use metadata::MetadataEnricher;
pub use signing::{sign_transaction, sign_with_transient_certificate};
pub use types::{
    ChaincodeDeploymentSpec, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec, ChaincodeSpec,
    ChaincodeType, ConfidentialityLevel, TransactionType,
};
pub use verification::verify_transaction;
