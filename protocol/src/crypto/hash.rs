//! # Hashing Utilities
//!
//! - **SHA-256** fingerprints certificates. Everybody else in the PKI world
//!   fingerprints with SHA-256, so we do too.
//! - **BLAKE3** keyed hashing derives attribute keys and per-transaction
//!   encryption keys from 32-byte secrets.

use sha2::{Digest, Sha256};

/// SHA-256 digest as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 fingerprint of a DER certificate, hex-encoded.
pub fn certificate_fingerprint(cert_der: &[u8]) -> String {
    hex::encode(sha256(cert_der))
}

/// BLAKE3 keyed hash of `data` under a 32-byte key.
///
/// Used as a PRF: distinct `(key, data)` pairs give independent outputs, and
/// nothing about `key` leaks through the output.
pub fn keyed_hash(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    *blake3::keyed_hash(key, data).as_bytes()
}
