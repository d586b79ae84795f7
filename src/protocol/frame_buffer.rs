//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 5 bytes
//! - `WaitingForBody`: Header validated, need N more body bytes
//!
//! # Example
//!
//! ```
//! use pinwire_client::protocol::{FrameBuffer, FrameCodec};
//!
//! let mut codec = FrameCodec::new();
//! let frame = codec.virtual_write(4, ["on"]).unwrap();
//!
//! let mut buffer = FrameBuffer::new();
//! assert!(buffer.push(&frame[..3]).unwrap().is_empty());
//! let messages = buffer.push(&frame[3..]).unwrap();
//! assert_eq!(messages[0].tokens, ["vw", "4", "on"]);
//! ```

use bytes::BytesMut;

use super::message::Message;
use super::wire_format::{Header, MsgType, DEFAULT_MAX_BODY, HEADER_SIZE};
use crate::error::ProtocolError;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 5 bytes).
    WaitingForHeader,
    /// Header validated, waiting for body bytes.
    WaitingForBody {
        header: Header,
        msg_type: MsgType,
        remaining: usize,
    },
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
///
/// Every header is validated against the inbound body limit as soon as it
/// is complete, before its body arrives.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Inbound body limit (exclusive).
    max_body: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default body limit.
    pub fn new() -> Self {
        Self::with_max_body(DEFAULT_MAX_BODY)
    }

    /// Create a new frame buffer with a custom body limit.
    pub fn with_max_body(max_body: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_body + HEADER_SIZE),
            state: State::WaitingForHeader,
            max_body,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns the first protocol violation found. The buffer should be
    /// cleared afterwards; the stream position is no longer trustworthy.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Message>, ProtocolError> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(message) = self.try_extract_one()? {
            messages.push(message);
        }

        Ok(messages)
    }

    /// Try to extract a single message from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(message))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    fn try_extract_one(&mut self) -> Result<Option<Message>, ProtocolError> {
        match &self.state {
            State::WaitingForHeader => {
                let Some(header) = Header::decode(&self.buffer) else {
                    return Ok(None);
                };

                let msg_type = header.validate(self.max_body)?;

                // Consume header bytes
                let _ = self.buffer.split_to(HEADER_SIZE);

                let remaining = header.body_len();
                if remaining == 0 {
                    return Message::from_parts(&header, msg_type, &[]).map(Some);
                }

                self.state = State::WaitingForBody {
                    header,
                    msg_type,
                    remaining,
                };

                self.try_extract_one()
            }

            State::WaitingForBody {
                header,
                msg_type,
                remaining,
            } => {
                if self.buffer.len() < *remaining {
                    return Ok(None);
                }

                let (header, msg_type) = (*header, *msg_type);
                let body = self.buffer.split_to(*remaining).freeze();
                self.state = State::WaitingForHeader;

                Message::from_parts(&header, msg_type, &body).map(Some)
            }
        }
    }

    /// Number of buffered bytes not yet consumed.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Inbound body limit.
    pub fn max_body(&self) -> usize {
        self.max_body
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, STATUS_SUCCESS};

    /// Helper to create a valid hardware frame as bytes.
    fn make_frame_bytes(msg_id: u16, body: &[u8]) -> Vec<u8> {
        let header = Header::new(MsgType::Hardware, msg_id, body.len() as u16);
        build_frame(&header, body)
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let messages = buffer.push(&make_frame_bytes(42, b"vw\x001\x00on")).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].msg_id, 42);
        assert_eq!(messages[0].tokens, ["vw", "1", "on"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = make_frame_bytes(1, b"first");
        combined.extend(build_frame(&Header::new(MsgType::Ping, 2, 0), b""));
        combined.extend(make_frame_bytes(3, b"third"));

        let messages = buffer.push(&combined).unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].msg_id, 1);
        assert_eq!(messages[1].msg_type, MsgType::Ping);
        assert_eq!(messages[2].tokens, ["third"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(42, b"test");

        let messages = buffer.push(&frame_bytes[..3]).unwrap();
        assert!(messages.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        let messages = buffer.push(&frame_bytes[3..]).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_body() {
        let mut buffer = FrameBuffer::new();
        let body = b"vw\x0012\x00a longer value that arrives in pieces";
        let frame_bytes = make_frame_bytes(42, body);

        let partial_len = HEADER_SIZE + 10;
        assert!(buffer.push(&frame_bytes[..partial_len]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForBody");

        let messages = buffer.push(&frame_bytes[partial_len..]).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tokens[2], "a longer value that arrives in pieces");
    }

    #[test]
    fn test_response_consumes_no_body() {
        let mut buffer = FrameBuffer::new();
        let mut data = build_frame(&Header::new(MsgType::Response, 1, STATUS_SUCCESS), b"");
        data.extend(make_frame_bytes(2, b"vr\x007"));

        let messages = buffer.push(&data).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_success());
        assert_eq!(messages[1].tokens, ["vr", "7"]);
    }

    #[test]
    fn test_body_limit_checked_on_header() {
        let mut buffer = FrameBuffer::with_max_body(100);
        let header = Header::new(MsgType::Hardware, 42, 1000);

        let err = buffer.push(&header.encode()).unwrap_err();
        assert!(err.to_string().starts_with("body too long"));
    }

    #[test]
    fn test_invalid_id_rejected() {
        let mut buffer = FrameBuffer::new();
        let err = buffer.push(&make_frame_bytes(0, b"vw")).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidId);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(42, b"test");

        buffer.push(&frame_bytes[..HEADER_SIZE + 1]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForBody");

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(42, b"hi");

        let mut all = Vec::new();
        for byte in &frame_bytes {
            all.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tokens, ["hi"]);
    }
}
