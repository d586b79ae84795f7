//! Wire format encoding and decoding.
//!
//! Implements the 5-byte header format:
//! ```text
//! ┌──────────┬──────────┬──────────┐
//! │ Type     │ Msg ID   │ Length   │
//! │ 1 byte   │ 2 bytes  │ 2 bytes  │
//! │          │ uint16 BE│ uint16 BE│
//! └──────────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The body that follows is a list
//! of UTF-8 tokens separated by a single NUL byte. Response frames carry no
//! body; their length field holds the status code instead.

use crate::error::ProtocolError;

/// Header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// Default inbound body limit in bytes.
pub const DEFAULT_MAX_BODY: usize = 1024;

/// Reserved message ID (never valid on the wire).
pub const RESERVED_MSG_ID: u16 = 0;

/// Token separator inside a body.
pub const TOKEN_SEPARATOR: u8 = 0;

/// Response status: success.
pub const STATUS_SUCCESS: u16 = 200;

/// Response status: the auth token is not known to the broker.
pub const STATUS_INVALID_TOKEN: u16 = 9;

/// Recognized message kinds and their stable wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    /// Acknowledgment; the length field carries a status code.
    Response = 0,
    /// Device login with auth token.
    Login = 2,
    /// Keep-alive probe, answered with a success response.
    Ping = 6,
    /// Post to a social feed.
    Tweet = 12,
    /// Send an email.
    Email = 13,
    /// Push notification to the app.
    Notify = 14,
    /// Command forwarded from another device.
    Bridge = 15,
    /// Ask the broker to resend stored pin values.
    HardwareSync = 16,
    /// Library metadata, RTC, heartbeat settings.
    Internal = 17,
    /// Widget property update.
    Property = 19,
    /// Virtual pin read/write.
    Hardware = 20,
    /// Event log entry.
    EventLog = 64,
}

impl MsgType {
    /// Map a wire code to a message kind.
    pub fn from_u8(code: u8) -> Option<Self> {
        let kind = match code {
            0 => MsgType::Response,
            2 => MsgType::Login,
            6 => MsgType::Ping,
            12 => MsgType::Tweet,
            13 => MsgType::Email,
            14 => MsgType::Notify,
            15 => MsgType::Bridge,
            16 => MsgType::HardwareSync,
            17 => MsgType::Internal,
            19 => MsgType::Property,
            20 => MsgType::Hardware,
            64 => MsgType::EventLog,
            _ => return None,
        };
        Some(kind)
    }

    /// Wire code of this kind.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether body bytes follow the header on the wire.
    #[inline]
    pub fn has_body(self) -> bool {
        self != MsgType::Response
    }

    /// Whether the body is split into tokens on decode.
    #[inline]
    pub fn has_tokens(self) -> bool {
        !matches!(self, MsgType::Response | MsgType::Ping)
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw type byte (see [`MsgType`]).
    pub msg_type: u8,
    /// Message identifier (1-0xFFFF, 0 reserved).
    pub msg_id: u16,
    /// Body length, or status code for responses.
    pub length: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(msg_type: MsgType, msg_id: u16, length: u16) -> Self {
        Self {
            msg_type: msg_type.as_u8(),
            msg_id,
            length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use pinwire_client::protocol::{Header, MsgType};
    ///
    /// let header = Header::new(MsgType::Hardware, 1, 14);
    /// assert_eq!(header.encode(), [0x14, 0x00, 0x01, 0x00, 0x0e]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (5 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.msg_type;
        buf[1..3].copy_from_slice(&self.msg_id.to_be_bytes());
        buf[3..5].copy_from_slice(&self.length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            msg_type: buf[0],
            msg_id: u16::from_be_bytes([buf[1], buf[2]]),
            length: u16::from_be_bytes([buf[3], buf[4]]),
        })
    }

    /// Validate the header and resolve its message kind.
    ///
    /// Checks, in order:
    /// - Message ID is not 0
    /// - Declared length is below `max_body`
    /// - Type byte is a recognized kind
    pub fn validate(&self, max_body: usize) -> Result<MsgType, ProtocolError> {
        if self.msg_id == RESERVED_MSG_ID {
            return Err(ProtocolError::InvalidId);
        }

        if usize::from(self.length) >= max_body {
            return Err(ProtocolError::BodyTooLong {
                length: usize::from(self.length),
                max: max_body,
            });
        }

        MsgType::from_u8(self.msg_type).ok_or(ProtocolError::UnknownType(self.msg_type))
    }

    /// Number of body bytes that follow this header on the wire.
    #[inline]
    pub fn body_len(&self) -> usize {
        match MsgType::from_u8(self.msg_type) {
            Some(kind) if !kind.has_body() => 0,
            _ => usize::from(self.length),
        }
    }

    /// Status code of a response header.
    #[inline]
    pub fn status(&self) -> u16 {
        self.length
    }
}
