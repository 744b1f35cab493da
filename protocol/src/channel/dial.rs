//! Dialing peers.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use tracing::{debug, error};

use super::tls::TlsRootStore;
use super::ChannelError;
use crate::config::SecurityConfig;

/// An established connection.
#[derive(Debug)]
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Plain(s) => s.peer_addr(),
            Self::Tls(s) => s.sock.peer_addr(),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}

/// Opens connections to peers, secure or not.
#[derive(Debug, Clone)]
pub struct ChannelProvider {
    roots: Option<Arc<RootCertStore>>,
    dial_timeout: Duration,
    server_name_override: Option<String>,
}

impl ChannelProvider {
    /// Provider using `config`'s timeout and server-name override. `roots`
    /// is the result of [`TlsRootStore::bootstrap`].
    pub fn new(config: &SecurityConfig, roots: Option<TlsRootStore>) -> Self {
        Self {
            roots: roots.map(|r| r.roots()),
            dial_timeout: config.dial_timeout(),
            server_name_override: config.tls_server_name_override.clone(),
        }
    }

    /// Provider that can only dial plain TCP.
    pub fn insecure(dial_timeout: Duration) -> Self {
        Self {
            roots: None,
            dial_timeout,
            server_name_override: None,
        }
    }

    /// Dials `address`. When `secure`, completes a TLS handshake validated
    /// against the root store and `server_name` (or the configured
    /// override) before returning.
    pub fn connect(
        &self,
        address: &str,
        server_name: &str,
        secure: bool,
    ) -> Result<Connection, ChannelError> {
        debug!(address, server_name, secure, "dialing");

        let result = if secure {
            self.connect_tls(address, server_name)
        } else {
            self.dial(address).map(Connection::Plain)
        };

        match &result {
            Ok(_) => debug!(address, server_name, "dial done"),
            Err(e) => error!(address, error = %e, "dial failed"),
        }
        result
    }

    fn dial(&self, address: &str) -> Result<TcpStream, ChannelError> {
        let addrs = address
            .to_socket_addrs()
            .map_err(|source| ChannelError::Resolve {
                address: address.to_string(),
                source,
            })?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.dial_timeout) {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%addr, error = %e, "could not disable Nagle");
                    }
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(source) => Err(ChannelError::Dial {
                address: address.to_string(),
                source,
            }),
            None => Err(ChannelError::NoAddress(address.to_string())),
        }
    }

    fn connect_tls(&self, address: &str, server_name: &str) -> Result<Connection, ChannelError> {
        let roots = self.roots.as_ref().ok_or(ChannelError::NoRootStore)?;

        let name = self
            .server_name_override
            .as_deref()
            .unwrap_or(server_name)
            .to_string();
        let server_name =
            ServerName::try_from(name.clone()).map_err(|_| ChannelError::InvalidServerName(name))?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(Arc::clone(roots))
            .with_no_client_auth();

        let mut session = ClientConnection::new(Arc::new(config), server_name)?;
        let mut socket = self.dial(address)?;
        socket
            .set_read_timeout(Some(self.dial_timeout))
            .and_then(|_| socket.set_write_timeout(Some(self.dial_timeout)))
            .map_err(|source| ChannelError::Dial {
                address: address.to_string(),
                source,
            })?;

        while session.is_handshaking() {
            session
                .complete_io(&mut socket)
                .map_err(|source| ChannelError::Handshake {
                    address: address.to_string(),
                    source,
                })?;
        }

        socket
            .set_read_timeout(None)
            .and_then(|_| socket.set_write_timeout(None))
            .map_err(|source| ChannelError::Dial {
                address: address.to_string(),
                source,
            })?;

        Ok(Connection::Tls(Box::new(StreamOwned::new(session, socket))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer};
    use rustls::{ServerConfig, ServerConnection};
    use std::net::TcpListener;

    fn echo_once(listener: TcpListener) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).unwrap();
            socket.write_all(&buf).unwrap();
        })
    }

    #[test]
    fn plain_connection_round_trips() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = echo_once(listener);

        let mut conn = ChannelProvider::insecure(Duration::from_secs(3))
            .connect(&addr, "localhost", false)
            .unwrap();
        assert!(!conn.is_secure());
        conn.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        server.join().unwrap();
    }

    #[test]
    fn secure_without_roots_is_rejected() {
        let err = ChannelProvider::insecure(Duration::from_secs(1))
            .connect("127.0.0.1:1", "localhost", true)
            .unwrap_err();
        assert!(matches!(err, ChannelError::NoRootStore));
    }

    #[test]
    fn refused_dial_is_dial_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let err = ChannelProvider::insecure(Duration::from_secs(1))
            .connect(&addr, "localhost", false)
            .unwrap_err();
        assert!(matches!(err, ChannelError::Dial { .. }));
    }

    #[test]
    fn tls_connection_validates_against_root_store() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        let server_config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(cert.der().to_vec())],
            PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap(),
        )
        .unwrap();
        let server_config = Arc::new(server_config);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let session = ServerConnection::new(server_config).unwrap();
            let mut tls = StreamOwned::new(session, socket);
            let mut buf = [0u8; 5];
            tls.read_exact(&mut buf).unwrap();
            tls.write_all(&buf).unwrap();
            tls.flush().unwrap();
        });

        let roots = TlsRootStore::from_pem(cert.pem().as_bytes()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = SecurityConfig {
            tls_enabled: true,
            tls_root_cert_path: Some(dir.path().join("unused.pem")),
            ..SecurityConfig::default()
        };

        let mut conn = ChannelProvider::new(&config, Some(roots))
            .connect(&addr, "localhost", true)
            .unwrap();
        assert!(conn.is_secure());
        conn.write_all(b"sealt").unwrap();
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"sealt");
        server.join().unwrap();
    }

    #[test]
    fn tls_with_unknown_root_fails_handshake() {
        let served = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let other = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        let server_config = Arc::new(
            ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()
                .unwrap()
                .with_no_client_auth()
                .with_single_cert(
                    vec![CertificateDer::from(served.cert.der().to_vec())],
                    PrivateKeyDer::try_from(served.key_pair.serialize_der()).unwrap(),
                )
                .unwrap(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut session = ServerConnection::new(server_config).unwrap();
            // The client aborts the handshake; any error here is expected.
            while session.is_handshaking() {
                if session.complete_io(&mut socket).is_err() {
                    break;
                }
            }
        });

        let roots = TlsRootStore::from_pem(other.cert.pem().as_bytes()).unwrap();
        let provider = ChannelProvider {
            roots: Some(roots.roots()),
            dial_timeout: Duration::from_secs(3),
            server_name_override: None,
        };
        let err = provider.connect(&addr, "localhost", true).unwrap_err();
        assert!(matches!(err, ChannelError::Handshake { .. }));
        server.join().unwrap();
    }
}
