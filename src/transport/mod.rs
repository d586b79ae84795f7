//! Transport module - byte streams to the broker.
//!
//! Provides abstraction over:
//! - Plain TCP sockets with native timeouts ([`TcpStream`](std::net::TcpStream))
//! - Non-blocking streams driven by a poll loop ([`PolledStream`])
//! - Scripted in-memory streams for tests ([`MemoryStream`])
//! - TLS over TCP ([`TlsStream`], feature `tls`)
//!
//! On top sits [`Link`], which adds bounded send retries and
//! timeout-tolerant receives.

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::Result;

mod link;
mod memory;
mod polled;
mod tcp;
#[cfg(feature = "tls")]
mod tls;

pub use link::{Link, SendReport, SEND_BACKOFF, SEND_RETRIES};
pub use memory::{MemoryConnector, MemoryStream};
pub use polled::{PolledStream, PolledTcpConnector};
pub use tcp::TcpConnector;
#[cfg(feature = "tls")]
pub use tls::{TlsConnector, TlsStream};

/// A bidirectional byte stream whose blocking time can be bounded.
///
/// Reads that hit the timeout fail with `TimedOut` or `WouldBlock`;
/// a read of 0 bytes means the peer closed the stream.
pub trait Stream: Read + Write + Send {
    /// Bound the time a single read or write may block.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Close the stream. Further I/O fails.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens streams to the broker.
pub trait Connector: Send {
    /// Open a stream to `server:port`, giving up after `timeout`.
    fn open(&self, server: &str, port: u16, timeout: Duration) -> Result<Box<dyn Stream>>;
}

/// True for errors that mean "try again later" rather than "gone".
#[inline]
pub fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
