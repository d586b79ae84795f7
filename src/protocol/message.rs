//! Decoded message with typed accessors.
//!
//! A [`Message`] is one frame after header validation and body tokenizing.
//!
//! # Example
//!
//! ```
//! use pinwire_client::protocol::{build_frame, decode, Header, MsgType};
//!
//! let frame = build_frame(&Header::new(MsgType::Hardware, 2, 7), b"vw\x004\x001");
//! let msg = decode(&frame, 1024).unwrap();
//!
//! assert_eq!(msg.msg_type, MsgType::Hardware);
//! assert_eq!(msg.tokens, ["vw", "4", "1"]);
//! ```

use bytes::{BufMut, BytesMut};

use super::wire_format::{Header, MsgType, HEADER_SIZE, STATUS_SUCCESS, TOKEN_SEPARATOR};
use crate::error::ProtocolError;

/// A complete decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message kind.
    pub msg_type: MsgType,
    /// Message identifier (never 0).
    pub msg_id: u16,
    /// Header length field: body length, or status for responses.
    pub length: u16,
    /// Body tokens. Empty for responses and pings.
    pub tokens: Vec<String>,
}

impl Message {
    /// Build a message from a validated header and its body bytes.
    pub fn from_parts(header: &Header, msg_type: MsgType, body: &[u8]) -> Result<Self, ProtocolError> {
        let tokens = if msg_type.has_tokens() {
            parse_tokens(body)?
        } else {
            Vec::new()
        };

        Ok(Self {
            msg_type,
            msg_id: header.msg_id,
            length: header.length,
            tokens,
        })
    }

    /// Status code if this is a response.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        (self.msg_type == MsgType::Response).then_some(self.length)
    }

    /// Check if this is a success response.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status() == Some(STATUS_SUCCESS)
    }

    /// First body token, if any.
    #[inline]
    pub fn command(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }
}

/// Split a body on NUL into UTF-8 tokens.
///
/// An empty body yields no tokens.
pub fn parse_tokens(body: &[u8]) -> Result<Vec<String>, ProtocolError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split(|&b| b == TOKEN_SEPARATOR)
        .map(|raw| {
            std::str::from_utf8(raw)
                .map(str::to_owned)
                .map_err(|e| ProtocolError::Parse(format!("invalid UTF-8 in body: {e}")))
        })
        .collect()
}

/// Join tokens with NUL into a body.
pub fn join_tokens<I, T>(tokens: I) -> BytesMut
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut body = BytesMut::new();
    for (i, token) in tokens.into_iter().enumerate() {
        if i > 0 {
            body.put_u8(TOKEN_SEPARATOR);
        }
        body.put_slice(token.as_ref().as_bytes());
    }
    body
}

/// Build a complete frame as a single byte vector.
///
/// Encodes header and appends body into a contiguous buffer.
pub fn build_frame(header: &Header, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::STATUS_INVALID_TOKEN;

    #[test]
    fn test_parse_tokens_splits_on_nul() {
        let tokens = parse_tokens(b"test\x001234\x00745\x00abcde").unwrap();
        assert_eq!(tokens, ["test", "1234", "745", "abcde"]);
    }

    #[test]
    fn test_parse_tokens_unicode() {
        let tokens = parse_tokens("ёж".as_bytes()).unwrap();
        assert_eq!(tokens, ["ёж"]);
    }

    #[test]
    fn test_parse_tokens_invalid_utf8() {
        let err = parse_tokens(&[0xd1, 0x00, 0xff]).unwrap_err();
        assert!(err.to_string().starts_with("parse error"));
    }

    #[test]
    fn test_parse_tokens_empty_body() {
        assert!(parse_tokens(b"").unwrap().is_empty());
    }

    #[test]
    fn test_join_tokens() {
        let body = join_tokens(["vw", "127", "abc", "123"]);
        assert_eq!(&body[..], b"vw\x00127\x00abc\x00123");
        assert!(join_tokens(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_response_status_accessors() {
        let ok = Header::new(MsgType::Response, 3, STATUS_SUCCESS);
        let msg = Message::from_parts(&ok, MsgType::Response, &[]).unwrap();
        assert_eq!(msg.status(), Some(200));
        assert!(msg.is_success());
        assert!(msg.tokens.is_empty());

        let bad = Header::new(MsgType::Response, 3, STATUS_INVALID_TOKEN);
        let msg = Message::from_parts(&bad, MsgType::Response, &[]).unwrap();
        assert!(!msg.is_success());
    }

    #[test]
    fn test_ping_body_is_not_tokenized() {
        let header = Header::new(MsgType::Ping, 4, 4);
        let msg = Message::from_parts(&header, MsgType::Ping, b"junk").unwrap();
        assert!(msg.tokens.is_empty());
        assert_eq!(msg.status(), None);
    }

    #[test]
    fn test_build_frame() {
        let header = Header::new(MsgType::Login, 1, 4);
        let bytes = build_frame(&header, b"1234");
        assert_eq!(bytes, b"\x02\x00\x01\x00\x041234");
    }
}
