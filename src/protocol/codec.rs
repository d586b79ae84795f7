//! Frame codec: message id allocation, encoding and single-frame decoding.
//!
//! The id sequence is owned by one [`FrameCodec`] (one per client); it is
//! never shared between sessions.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::message::{join_tokens, Message};
use super::wire_format::{Header, MsgType, HEADER_SIZE, RESERVED_MSG_ID};
use crate::error::ProtocolError;

/// Monotonic message id sequence: 1, 2, .., 0xFFFF, 1, ..
#[derive(Debug, Clone, Default)]
pub struct MessageIds {
    last: u16,
}

impl MessageIds {
    /// Create a sequence whose first id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sequence that continues after `last`.
    pub fn starting_after(last: u16) -> Self {
        Self { last }
    }

    /// Allocate the next id. Never returns 0.
    pub fn next_id(&mut self) -> u16 {
        self.last = if self.last == u16::MAX { 1 } else { self.last + 1 };
        self.last
    }

    /// Most recently allocated id (0 before the first allocation).
    pub fn last(&self) -> u16 {
        self.last
    }
}

/// Encodes outbound frames, allocating ids as needed.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    ids: MessageIds,
}

impl FrameCodec {
    /// Create a codec with a fresh id sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec around an existing id sequence.
    pub fn with_ids(ids: MessageIds) -> Self {
        Self { ids }
    }

    /// Allocate the next message id.
    pub fn next_id(&mut self) -> u16 {
        self.ids.next_id()
    }

    /// Id sequence state.
    pub fn ids(&self) -> &MessageIds {
        &self.ids
    }

    /// Encode a frame: header followed by NUL-joined tokens.
    ///
    /// Without an explicit `msg_id` the next sequence id is used. An
    /// explicit id of 0 is rejected.
    ///
    /// # Example
    ///
    /// ```
    /// use pinwire_client::protocol::{FrameCodec, MsgType};
    ///
    /// let mut codec = FrameCodec::new();
    /// let frame = codec.encode(MsgType::Login, None, ["1234"]).unwrap();
    /// assert_eq!(&frame[..], b"\x02\x00\x01\x00\x041234");
    /// ```
    pub fn encode<I, T>(
        &mut self,
        msg_type: MsgType,
        msg_id: Option<u16>,
        tokens: I,
    ) -> Result<Bytes, ProtocolError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        if msg_id == Some(RESERVED_MSG_ID) {
            return Err(ProtocolError::InvalidId);
        }

        let body = join_tokens(tokens.into_iter().map(|t| t.to_string()));
        let length = u16::try_from(body.len()).map_err(|_| ProtocolError::BodyTooLong {
            length: body.len(),
            max: usize::from(u16::MAX),
        })?;

        let msg_id = match msg_id {
            Some(id) => id,
            None => self.ids.next_id(),
        };

        let header = Header::new(msg_type, msg_id, length);
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        buf.put_slice(&header.encode());
        buf.put_slice(&body);
        Ok(buf.freeze())
    }

    /// Encode a header-only frame (responses carry their status in the
    /// length field).
    pub fn encode_header(&mut self, msg_type: MsgType, msg_id: Option<u16>, length: u16) -> Result<Bytes, ProtocolError> {
        let msg_id = match msg_id {
            Some(RESERVED_MSG_ID) => return Err(ProtocolError::InvalidId),
            Some(id) => id,
            None => self.ids.next_id(),
        };
        Ok(Bytes::copy_from_slice(&Header::new(msg_type, msg_id, length).encode()))
    }
}

/// Decode one frame from the front of `bytes`.
///
/// Checks run in this order: header present, id non-zero, declared length
/// below `max_body`, type recognized, body present. Bytes after the
/// declared body are ignored.
pub fn decode(bytes: &[u8], max_body: usize) -> Result<Message, ProtocolError> {
    let header = Header::decode(bytes).ok_or_else(|| {
        ProtocolError::Parse(format!(
            "need {HEADER_SIZE} header bytes, got {}",
            bytes.len()
        ))
    })?;

    let msg_type = header.validate(max_body)?;

    let body_len = header.body_len();
    let body = bytes
        .get(HEADER_SIZE..HEADER_SIZE + body_len)
        .ok_or_else(|| {
            ProtocolError::Parse(format!(
                "truncated body: declared {body_len}, got {}",
                bytes.len() - HEADER_SIZE
            ))
        })?;

    Message::from_parts(&header, msg_type, body)
}
