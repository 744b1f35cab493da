//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for transaction signatures.
//! - **AES-256-GCM** (`aes-gcm`) for confidential payloads.
//! - **SHA-256** / **BLAKE3** for fingerprints and key derivation.
//! - **X.509** (`x509-parser`, `rcgen`) for the certificates that carry
//!   public keys inside transactions.
//! - **OsRng** for nonces.
//!
//! Nothing in here is hand-rolled cryptography.

pub mod certificate;
pub mod encryption;
pub mod hash;
pub mod keys;
pub mod nonce;
pub mod signatures;

pub use certificate::{issue_self_signed, parse_certificate, CertificateError, ParsedCertificate};
pub use encryption::{open, seal, EncryptionError};
pub use hash::{certificate_fingerprint, keyed_hash, sha256};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
pub use nonce::{NonceError, NonceSource, OsNonceSource};
pub use signatures::{check_signature, SignatureError};
