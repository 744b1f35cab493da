//! # Secure Channel
//!
//! Connections from the client to peers and membership services.
//!
//! - [`tls`]: the TLS root certificate pool and its one-time bootstrap.
//! - [`dial`]: [`ChannelProvider::connect`], plain TCP or TLS over TCP.
//!
//! Everything here is blocking std I/O with a dial timeout; callers wanting
//! async wrap it in their own runtime.

pub mod dial;
pub mod tls;

use std::path::PathBuf;

use thiserror::Error;

pub use dial::{ChannelProvider, Connection};
pub use tls::{InsecureTcpFetcher, RootCertificateFetcher, TlsRootStore};

/// Errors from root bootstrap and dialing.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} did not resolve to any socket address")]
    NoAddress(String),

    #[error("dial to {address} failed: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS requested but no root certificates are loaded")]
    NoRootStore,

    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),

    #[error("TLS handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("root certificate I/O at {path}: {source}")]
    RootIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid root certificate PEM: {0}")]
    RootPem(String),

    #[error("no root certificates found")]
    EmptyRoots,

    #[error("root certificate fetch failed: {0}")]
    Fetch(String),
}
