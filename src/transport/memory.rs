//! In-memory transport for testing.
//!
//! Provides deterministic, scriptable behavior in place of a real broker:
//! queued inbound chunks, recorded writes, injected write failures, and an
//! optional responder that answers each written frame.
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//! use pinwire_client::transport::MemoryStream;
//!
//! let stream = MemoryStream::new();
//! let mut client_side = stream.clone();
//!
//! stream.push_inbound(b"hello");
//! let mut buf = [0u8; 16];
//! assert_eq!(client_side.read(&mut buf).unwrap(), 5);
//!
//! client_side.write_all(b"world").unwrap();
//! assert_eq!(stream.written(), [b"world".to_vec()]);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{Connector, Stream};
use crate::error::{PinwireError, Result};

/// Builds the reply to one written chunk (empty for no reply).
type Responder = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Builds the stream for one connection attempt.
type StreamFactory = Arc<dyn Fn() -> io::Result<MemoryStream> + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    write_failures: VecDeque<io::ErrorKind>,
    write_cap: Option<usize>,
    responder: Option<Responder>,
    timeout: Option<Duration>,
    remote_closed: bool,
    closed: bool,
}

/// Scripted stream. Clones share the same state, so a test keeps one handle
/// and gives another to the client.
///
/// An empty inbound queue reads as a timeout; once the remote side is closed
/// and the queue drained, reads return 0 (EOF).
#[derive(Clone, Default)]
pub struct MemoryStream {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream that answers every written chunk with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let stream = Self::new();
        stream.lock().responder = Some(Arc::new(responder));
        stream
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes for the client to read. Each call is delivered by
    /// separate reads.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.lock().inbound.push_back(bytes.to_vec());
    }

    /// Every chunk written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Drain the written chunks.
    pub fn take_written(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.lock().written)
    }

    /// Make the next `count` writes fail with `kind`.
    pub fn fail_writes(&self, kind: io::ErrorKind, count: usize) {
        let mut state = self.lock();
        state.write_failures.extend(std::iter::repeat(kind).take(count));
    }

    /// Accept at most `accept` bytes on the next write, ahead of any
    /// injected failures.
    pub fn short_write(&self, accept: usize) {
        self.lock().write_cap = Some(accept);
    }

    /// Simulate the broker closing the connection.
    pub fn close_remote(&self) {
        self.lock().remote_closed = true;
    }

    /// True once the client closed its side.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Last timeout the client set.
    pub fn timeout(&self) -> Option<Duration> {
        self.lock().timeout
    }
}

impl fmt::Debug for MemoryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryStream")
            .field("inbound", &state.inbound.len())
            .field("written", &state.written.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }

        let Some(mut chunk) = state.inbound.pop_front() else {
            if state.remote_closed {
                return Ok(0);
            }
            return Err(io::ErrorKind::TimedOut.into());
        };

        let n = buf.len().min(chunk.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            state.inbound.push_front(chunk);
        }
        Ok(n)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if state.remote_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let n = match state.write_cap.take() {
            Some(cap) => cap.min(buf.len()),
            None => {
                if let Some(kind) = state.write_failures.pop_front() {
                    return Err(kind.into());
                }
                buf.len()
            }
        };

        state.written.push(buf[..n].to_vec());
        if let Some(responder) = state.responder.clone() {
            let reply = responder(&buf[..n]);
            if !reply.is_empty() {
                state.inbound.push_back(reply);
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Stream for MemoryStream {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.lock().timeout = Some(timeout);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

/// Hands out [`MemoryStream`]s, one per connection attempt.
///
/// Clones share the factory and the record of opened streams.
#[derive(Clone)]
pub struct MemoryConnector {
    factory: StreamFactory,
    opened: Arc<Mutex<Vec<MemoryStream>>>,
}

impl MemoryConnector {
    /// Build each connection's stream with `factory`. An `Err` from the
    /// factory is reported as a failed connect.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> io::Result<MemoryStream> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every connection attempt gets a stream answering with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let responder: Responder = Arc::new(responder);
        Self::new(move || {
            let responder = Arc::clone(&responder);
            Ok(MemoryStream::with_responder(move |chunk: &[u8]| responder(chunk)))
        })
    }

    /// Streams opened so far, oldest first.
    pub fn opened(&self) -> Vec<MemoryStream> {
        self.opened.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Most recently opened stream.
    pub fn last(&self) -> Option<MemoryStream> {
        self.opened().pop()
    }
}

impl fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("opened", &self.opened().len())
            .finish()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, _server: &str, _port: u16, _timeout: Duration) -> Result<Box<dyn Stream>> {
        let stream = (self.factory)().map_err(PinwireError::Io)?;
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(stream.clone());
        Ok(Box::new(stream))
    }
}
