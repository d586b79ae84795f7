//! Protocol module - wire format, framing, and message builders.
//!
//! This module implements the binary protocol spoken with the broker:
//! - 5-byte header encoding/decoding
//! - Message id allocation and frame encoding
//! - Frame buffer for accumulating partial reads
//! - Message struct with typed accessors

mod codec;
mod frame_buffer;
mod message;
mod messages;
mod wire_format;

pub use codec::{decode, FrameCodec, MessageIds};
pub use frame_buffer::FrameBuffer;
pub use message::{build_frame, join_tokens, parse_tokens, Message};
pub use messages::{CMD_VIRTUAL_READ, CMD_VIRTUAL_WRITE, DEVICE_LABEL, VERSION};
pub use wire_format::{
    Header, MsgType, DEFAULT_MAX_BODY, HEADER_SIZE, RESERVED_MSG_ID, STATUS_INVALID_TOKEN,
    STATUS_SUCCESS, TOKEN_SEPARATOR,
};
