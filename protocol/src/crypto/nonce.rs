//! # Nonce Source
//!
//! Unpredictable per-transaction nonces. The default source reads straight
//! from the operating system CSPRNG and surfaces its failures instead of
//! falling back to anything weaker.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::config::NONCE_LENGTH;

/// The secure random generator could not produce output.
#[derive(Debug, Error)]
#[error("secure randomness unavailable: {0}")]
pub struct NonceError(#[from] rand::Error);

/// Produces cryptographically secure nonces.
///
/// Implementations are shared between concurrent builders, hence
/// `Send + Sync`.
pub trait NonceSource: Send + Sync {
    fn generate(&self) -> Result<Vec<u8>, NonceError>;
}

/// [`NonceSource`] backed by `OsRng`.
#[derive(Debug, Clone, Copy)]
pub struct OsNonceSource {
    length: usize,
}

impl OsNonceSource {
    pub fn new() -> Self {
        Self {
            length: NONCE_LENGTH,
        }
    }

    /// Nonces of a non-default length. Zero is bumped to one byte so the
    /// non-empty invariant holds.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }
}

impl Default for OsNonceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceSource for OsNonceSource {
    fn generate(&self) -> Result<Vec<u8>, NonceError> {
        let mut nonce = vec![0u8; self.length];
        OsRng.try_fill_bytes(&mut nonce)?;
        Ok(nonce)
    }
}
