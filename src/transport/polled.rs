//! Poll-driven timeouts for non-blocking streams.
//!
//! Some streams cannot bound a blocking call natively. [`PolledStream`]
//! puts them in non-blocking mode and retries `WouldBlock` in a short
//! sleep loop until the deadline passes.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use super::tcp::TcpConnector;
use super::{Connector, Stream};
use crate::error::Result;

/// Pause between readiness polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Wraps a non-blocking stream and emulates read/write timeouts.
#[derive(Debug)]
pub struct PolledStream<S> {
    inner: Option<S>,
    timeout: Duration,
}

impl<S: Read + Write + Send> PolledStream<S> {
    /// Wrap a stream that is already non-blocking.
    pub fn new(inner: S) -> Self {
        Self {
            inner: Some(inner),
            timeout: Duration::ZERO,
        }
    }

    /// Current emulated timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Unwrap the inner stream, if still open.
    pub fn into_inner(self) -> Option<S> {
        self.inner
    }

    fn poll<T>(&mut self, mut op: impl FnMut(&mut S) -> io::Result<T>) -> io::Result<T> {
        let deadline = Instant::now() + self.timeout;
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        loop {
            match op(inner) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::from(io::ErrorKind::TimedOut));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                other => return other,
            }
        }
    }
}

impl PolledStream<TcpStream> {
    /// Switch a TCP socket to non-blocking mode and wrap it.
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write + Send> Read for PolledStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.poll(|s| s.read(buf))
    }
}

impl<S: Read + Write + Send> Write for PolledStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.poll(|s| s.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.poll(|s| s.flush())
    }
}

impl<S: Read + Write + Send> Stream for PolledStream<S> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        // dropping the inner stream closes it
        self.inner = None;
        Ok(())
    }
}

/// Connects TCP sockets and drives them in non-blocking mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolledTcpConnector;

impl Connector for PolledTcpConnector {
    fn open(&self, server: &str, port: u16, timeout: Duration) -> Result<Box<dyn Stream>> {
        let tcp = TcpConnector::connect(server, port, timeout)?;
        let mut stream = PolledStream::from_tcp(tcp)?;
        stream.set_timeout(timeout)?;
        Ok(Box::new(stream))
    }
}
