//! Error types for pinwire-client.

use std::fmt;

use thiserror::Error;

use crate::protocol::MsgType;
use crate::session::SessionState;

/// Frame-level violations. Always fatal to the current receive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Message id 0 is reserved and never valid on the wire.
    #[error("invalid id: message id 0 is reserved")]
    InvalidId,

    /// Declared body length is at or above the configured limit.
    #[error("body too long: length {length} >= limit {max}")]
    BodyTooLong {
        /// Length declared in the header (or produced by the encoder).
        length: usize,
        /// Limit in effect.
        max: usize,
    },

    /// Type byte is not one of the recognized message kinds.
    #[error("unknown type: {0}")]
    UnknownType(u8),

    /// Malformed bytes: short header, truncated body, invalid UTF-8.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Handshake stage an [`AuthError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Login with the auth token.
    Login,
    /// Heartbeat interval / buffer size declaration.
    Heartbeat,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Login => f.write_str("login"),
            Stage::Heartbeat => f.write_str("heartbeat"),
        }
    }
}

/// Handshake failures. Fatal to the current connection attempt only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Broker answered the login with the invalid-token status.
    #[error("invalid auth token")]
    InvalidToken,

    /// Broker answered with a non-success status.
    #[error("{stage} rejected with status {status}")]
    Rejected {
        /// Stage that was rejected.
        stage: Stage,
        /// Status carried by the response.
        status: u16,
    },

    /// First reply was not a response frame.
    #[error("unexpected {msg_type:?} reply during {stage}")]
    UnexpectedReply {
        /// Stage being awaited.
        stage: Stage,
        /// Kind of frame that arrived instead.
        msg_type: MsgType,
    },

    /// No reply arrived within the handshake timeout.
    #[error("{stage} reply timed out")]
    Timeout {
        /// Stage being awaited.
        stage: Stage,
    },
}

/// Main error type for all pinwire operations.
#[derive(Debug, Error)]
pub enum PinwireError {
    /// I/O error on the socket or while reading config files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config values failed validation.
    #[error("invalid config: {0}")]
    Config(String),

    /// Malformed or disallowed frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Handshake failure.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// A send gave up after part of the frame reached the socket.
    #[error("frame cut off after {written} of {len} bytes")]
    PartialWrite {
        /// Bytes that went out.
        written: usize,
        /// Frame length.
        len: usize,
    },

    /// Operation needs an open socket.
    #[error("not connected")]
    NotConnected,

    /// Session transition attempted from the wrong state.
    #[error("invalid state {state:?} for {operation}")]
    InvalidState {
        /// State the session was in.
        state: SessionState,
        /// Transition that was attempted.
        operation: &'static str,
    },

    /// TLS setup failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Failure reported by a user event handler.
    #[error("handler error: {0}")]
    Handler(String),

    /// Explicit stop request. Escapes `Client::run` instead of being
    /// turned into a reconnect.
    #[error("interrupted")]
    Interrupted,
}

impl PinwireError {
    /// True for the explicit stop request.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, PinwireError::Interrupted)
    }
}

/// Result type alias using PinwireError.
pub type Result<T> = std::result::Result<T, PinwireError>;
