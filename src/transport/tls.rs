//! TLS over TCP using rustls.
//!
//! Server certificates are checked against the webpki root set, optionally
//! extended with a PEM bundle from the configuration.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use super::tcp::TcpConnector;
use super::{Connector, Stream};
use crate::error::{PinwireError, Result};

/// A TLS session over a TCP socket.
pub struct TlsStream {
    inner: StreamOwned<ClientConnection, TcpStream>,
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Stream for TlsStream {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        Stream::set_timeout(&mut self.inner.sock, timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.conn.send_close_notify();
        // best effort: the peer may already be gone
        let _ = self.inner.flush();
        match self.inner.sock.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

/// Opens TLS sessions to the broker.
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
}

impl TlsConnector {
    /// Trust the webpki roots plus every certificate in `ca_cert`, if given.
    pub fn new(ca_cert: Option<&Path>) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        if let Some(path) = ca_cert {
            let reader = BufReader::new(File::open(path)?);
            for cert in CertificateDer::pem_reader_iter(reader) {
                let cert = cert.map_err(|e| PinwireError::Tls(format!("bad PEM in {}: {e}", path.display())))?;
                roots
                    .add(cert)
                    .map_err(|e| PinwireError::Tls(format!("bad CA certificate: {e}")))?;
            }
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| PinwireError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            config: Arc::new(config),
        })
    }
}

impl Connector for TlsConnector {
    fn open(&self, server: &str, port: u16, timeout: Duration) -> Result<Box<dyn Stream>> {
        let name = ServerName::try_from(server.to_string())
            .map_err(|e| PinwireError::Tls(format!("invalid server name {server:?}: {e}")))?;
        let conn = ClientConnection::new(Arc::clone(&self.config), name)
            .map_err(|e| PinwireError::Tls(e.to_string()))?;

        let mut sock = TcpConnector::connect(server, port, timeout)?;
        Stream::set_timeout(&mut sock, timeout)?;

        let mut inner = StreamOwned::new(conn, sock);
        // drive the handshake now so certificate errors surface on connect
        while inner.conn.is_handshaking() {
            inner
                .conn
                .complete_io(&mut inner.sock)
                .map_err(|e| PinwireError::Tls(format!("handshake with {server}: {e}")))?;
        }

        Ok(Box::new(TlsStream { inner }))
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_with_webpki_roots() {
        assert!(TlsConnector::new(None).is_ok());
    }

    #[test]
    fn test_missing_ca_file() {
        let err = TlsConnector::new(Some(Path::new("/nonexistent/ca.pem"))).err().unwrap();
        assert!(matches!(err, PinwireError::Io(_)));
    }

    #[test]
    fn test_invalid_server_name() {
        let connector = TlsConnector::new(None).unwrap();
        let err = connector
            .open("not a host name", 443, Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(matches!(err, PinwireError::Tls(_)));
    }
}
