//! TLS root certificate pool.
//!
//! With TLS enabled, every secure dial is validated against the root
//! certificate at `tls_root_cert_path`. If that file does not exist yet it
//! is fetched once over an explicitly insecure channel and written to disk;
//! from then on the local copy is the trust anchor.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use tracing::{debug, info, warn};

use super::ChannelError;
use crate::config::SecurityConfig;

/// Largest root bundle accepted from an insecure fetch.
const MAX_ROOT_BUNDLE_BYTES: u64 = 1 << 20;

/// Source of the TLS root certificate for the first-run bootstrap.
pub trait RootCertificateFetcher {
    /// Returns the PEM-encoded root certificate(s).
    fn fetch_root_certificate(&self) -> Result<Vec<u8>, ChannelError>;
}

impl<F> RootCertificateFetcher for F
where
    F: Fn() -> Result<Vec<u8>, ChannelError>,
{
    fn fetch_root_certificate(&self) -> Result<Vec<u8>, ChannelError> {
        self()
    }
}

/// Reads a PEM bundle from a plain TCP socket until the server closes it.
///
/// No authentication whatsoever. Only meant for the one-time bootstrap.
#[derive(Debug, Clone)]
pub struct InsecureTcpFetcher {
    address: String,
    timeout: Duration,
}

impl InsecureTcpFetcher {
    pub fn new(address: &str, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            timeout,
        }
    }
}

impl RootCertificateFetcher for InsecureTcpFetcher {
    fn fetch_root_certificate(&self) -> Result<Vec<u8>, ChannelError> {
        warn!(address = %self.address, "fetching TLS root certificate over an insecure connection");

        let addr = self
            .address
            .to_socket_addrs()
            .map_err(|e| ChannelError::Fetch(format!("resolve {}: {e}", self.address)))?
            .next()
            .ok_or_else(|| ChannelError::NoAddress(self.address.clone()))?;

        let stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| ChannelError::Fetch(format!("connect {}: {e}", self.address)))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| ChannelError::Fetch(e.to_string()))?;

        let mut pem = Vec::new();
        stream
            .take(MAX_ROOT_BUNDLE_BYTES)
            .read_to_end(&mut pem)
            .map_err(|e| ChannelError::Fetch(format!("read {}: {e}", self.address)))?;
        Ok(pem)
    }
}

// ---------------------------------------------------------------------------
// TlsRootStore
// ---------------------------------------------------------------------------

/// Loaded TLS trust anchors.
#[derive(Debug, Clone)]
pub struct TlsRootStore {
    roots: Arc<RootCertStore>,
}

impl TlsRootStore {
    /// Loads the root certificate named by `config`, fetching and persisting
    /// it first when the file is missing.
    ///
    /// Returns `Ok(None)` when TLS is disabled.
    pub fn bootstrap(
        config: &SecurityConfig,
        fetcher: &dyn RootCertificateFetcher,
    ) -> Result<Option<Self>, ChannelError> {
        if !config.tls_enabled {
            debug!("TLS disabled, no root store");
            return Ok(None);
        }
        let path = config
            .tls_root_cert_path
            .as_deref()
            .ok_or(ChannelError::NoRootStore)?;

        if !path.exists() {
            info!(path = %path.display(), "TLS root certificate missing, downloading");
            let pem = fetcher.fetch_root_certificate()?;
            // Refuse to persist something we could not load anyway.
            Self::from_pem(&pem)?;
            persist(path, &pem)?;
        }

        info!(path = %path.display(), "loading TLS root certificate");
        let store = Self::load(path)?;
        info!(roots = store.len(), "TLS root certificate loaded");
        Ok(Some(store))
    }

    pub fn load(path: &Path) -> Result<Self, ChannelError> {
        let pem = std::fs::read(path).map_err(|source| ChannelError::RootIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&pem)
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, ChannelError> {
        let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ChannelError::RootPem(e.to_string()))?;
        if certs.is_empty() {
            return Err(ChannelError::EmptyRoots);
        }

        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots.add(cert)?;
        }
        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    pub fn roots(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn persist(path: &Path, pem: &[u8]) -> Result<(), ChannelError> {
    let io_err = |source| ChannelError::RootIo {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, pem).map_err(io_err)
}
