//! # Client Configuration & Constants
//!
//! Every magic number the transaction layer depends on lives here, next to
//! the handful of runtime switches ([`SecurityConfig`]) that decide whether
//! attribute-based access control and TLS are in play.
//!
//! The constants are part of the wire contract with the validators. Changing
//! the confidentiality protocol version or the canonical encoding version
//! without a coordinated network upgrade will get every transaction rejected.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Protocol Versions
// ---------------------------------------------------------------------------

/// Confidentiality protocol generation stamped on every sealed transaction.
/// Readers refuse to unseal anything that carries a different value.
pub const CONFIDENTIALITY_PROTOCOL_VERSION: &str = "1.2";

/// Leading byte of the canonical (signing) encoding. Bump whenever the tag
/// layout in `transaction::canonical` changes.
pub const CANONICAL_ENCODING_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Nonces
// ---------------------------------------------------------------------------

/// Length of nonces drawn from the secure random generator. 24 bytes keeps
/// the birthday bound far beyond any realistic transaction volume.
pub const NONCE_LENGTH: usize = 24;

/// Shortest caller-supplied nonce the builder accepts. Anything shorter is
/// rejected instead of silently weakening replay protection.
pub const MIN_CALLER_NONCE_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 public key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of the key material a transient certificate derives for ABAC and
/// that the confidentiality engine uses as its chain key.
pub const DERIVED_KEY_LENGTH: usize = 32;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Not 16.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// How long a dial to a peer or membership service may take before the
/// connection attempt is abandoned.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Same as [`DEFAULT_DIAL_TIMEOUT`], for serde defaults and CLI flags.
pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 3_000;

// ---------------------------------------------------------------------------
// SecurityConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`SecurityConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed security configuration: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("TLS is enabled but no root certificate path is configured")]
    MissingTlsRootPath,

    #[error("dial timeout must be greater than zero")]
    ZeroDialTimeout,
}

/// Runtime security switches for a client.
///
/// Loading this from disk or the environment is the caller's business; the
/// CLI maps its flags onto it and library users typically deserialize it
/// from whatever config format their application already speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Bind transaction metadata to the transient certificate and the
    /// requested attribute names.
    pub abac_enabled: bool,

    /// Dial peers over TLS.
    pub tls_enabled: bool,

    /// Where the TLS root certificate (PEM) lives. Fetched and written here
    /// on first use when missing.
    pub tls_root_cert_path: Option<PathBuf>,

    /// Overrides the server name checked against the peer certificate.
    pub tls_server_name_override: Option<String>,

    /// Dial timeout in milliseconds.
    pub dial_timeout_ms: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            abac_enabled: false,
            tls_enabled: false,
            tls_root_cert_path: None,
            tls_server_name_override: None,
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
        }
    }
}

impl SecurityConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tls_enabled && self.tls_root_cert_path.is_none() {
            return Err(ConfigError::MissingTlsRootPath);
        }
        if self.dial_timeout_ms == 0 {
            return Err(ConfigError::ZeroDialTimeout);
        }
        Ok(())
    }

    /// The dial timeout as a [`Duration`].
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}
