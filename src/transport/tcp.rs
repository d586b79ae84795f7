//! Plain TCP transport with native socket timeouts.

use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{Connector, Stream};
use crate::error::Result;

/// Smallest timeout handed to the socket; zero would mean "block forever".
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

impl Stream for TcpStream {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        let timeout = timeout.max(MIN_TIMEOUT);
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }

    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

/// Connects plain TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    /// Resolve `server:port` and connect to the first reachable address.
    pub fn connect(server: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
        let timeout = timeout.max(MIN_TIMEOUT);
        let mut last_err = None;

        for addr in (server, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "TCP connect failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {server}:{port}"),
            )
        }))
    }
}

impl Connector for TcpConnector {
    fn open(&self, server: &str, port: u16, timeout: Duration) -> Result<Box<dyn Stream>> {
        let stream = Self::connect(server, port, timeout)?;
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_connect_and_timeout_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut stream = TcpConnector
            .open("127.0.0.1", port, Duration::from_secs(1))
            .unwrap();
        let (mut server, _) = listener.accept().unwrap();

        stream.set_timeout(Duration::ZERO).unwrap();
        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(super::super::is_transient(err.kind()));

        server.write_all(b"hi").unwrap();
        stream.set_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(stream.read(&mut buf).unwrap(), 2);

        stream.close().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(TcpConnector
            .open("127.0.0.1", port, Duration::from_millis(200))
            .is_err());
    }
}
