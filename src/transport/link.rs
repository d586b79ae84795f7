//! Link: the client's view of one open stream.
//!
//! Sends are retried a bounded number of times on transient errors and then
//! dropped silently; receives turn timeouts into empty reads.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::{is_transient, Stream};
use crate::env::Clock;
use crate::error::{PinwireError, Result};

/// Retries after the first failed send attempt.
pub const SEND_RETRIES: usize = 3;

/// Pause between send attempts.
pub const SEND_BACKOFF: Duration = Duration::from_millis(2);

/// Outcome of [`Link::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Bytes written, or `None` if the frame did not go out whole.
    pub written: Option<usize>,
    /// Start of the last attempt.
    pub attempted_at: Instant,
    /// Bytes already on the wire when a send gave up mid-frame. The stream
    /// is out of sync with the broker after this.
    pub partial: Option<usize>,
}

/// An open stream plus retry policy.
pub struct Link {
    stream: Box<dyn Stream>,
    clock: Arc<dyn Clock>,
    read_buf: Vec<u8>,
}

impl Link {
    /// Wrap an open stream.
    pub fn new(stream: Box<dyn Stream>, clock: Arc<dyn Clock>) -> Self {
        Self {
            stream,
            clock,
            read_buf: Vec::new(),
        }
    }

    /// Write one complete frame.
    ///
    /// Would-block and timed-out errors are retried up to [`SEND_RETRIES`]
    /// times, [`SEND_BACKOFF`] apart, resuming after the bytes already
    /// written. Any other error gives up at once. Failure is reported as
    /// `written: None`, never as `Err`; `partial` tells whether the stream
    /// was left mid-frame.
    pub fn send(&mut self, data: &[u8]) -> SendReport {
        let mut offset = 0;
        let mut retries = 0;
        loop {
            let attempted_at = self.clock.now();
            match self.write_from(data, &mut offset) {
                Ok(()) => {
                    return SendReport {
                        written: Some(data.len()),
                        attempted_at,
                        partial: None,
                    }
                }
                Err(e) if is_transient(e.kind()) && retries < SEND_RETRIES => {
                    retries += 1;
                    tracing::debug!(attempt = retries, offset, error = %e, "Send failed, retrying");
                    self.clock.sleep(SEND_BACKOFF);
                }
                Err(e) => {
                    tracing::warn!(len = data.len(), offset, error = %e, "Dropping frame after send failure");
                    let cut = offset > 0 && offset < data.len();
                    return SendReport {
                        written: None,
                        attempted_at,
                        partial: cut.then_some(offset),
                    };
                }
            }
        }
    }

    /// Write `data[offset..]`, advancing `offset` past every accepted byte.
    fn write_from(&mut self, data: &[u8], offset: &mut usize) -> io::Result<()> {
        while *offset < data.len() {
            match self.stream.write(&data[*offset..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => *offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.stream.flush()
    }

    /// One bounded read of at most `max` bytes.
    ///
    /// A timeout yields empty bytes. End of stream yields
    /// `PinwireError::ConnectionClosed`; other I/O errors propagate.
    pub fn receive(&mut self, max: usize, timeout: Duration) -> Result<Bytes> {
        self.stream.set_timeout(timeout)?;

        self.read_buf.resize(max, 0);
        match self.stream.read(&mut self.read_buf) {
            Ok(0) if max > 0 => Err(PinwireError::ConnectionClosed),
            Ok(n) => Ok(Bytes::copy_from_slice(&self.read_buf[..n])),
            Err(e) if is_transient(e.kind()) => Ok(Bytes::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Set the stream timeout used by subsequent sends.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        Ok(self.stream.set_timeout(timeout)?)
    }

    /// Close the stream. Errors are logged, not returned.
    pub fn close(mut self) {
        if let Err(e) = self.stream.close() {
            tracing::debug!(error = %e, "Error closing stream");
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}
