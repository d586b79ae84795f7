//! Builders for every outbound message kind.
//!
//! Body layouts are fixed by convention, e.g. a virtual pin write is
//! `["vw", pin, values..]` in a hardware frame.

use std::fmt;

use bytes::Bytes;

use super::codec::FrameCodec;
use super::wire_format::MsgType;
use crate::error::ProtocolError;

/// Library version reported in the heartbeat declaration.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Device label reported in the heartbeat declaration.
pub const DEVICE_LABEL: &str = "rust";

/// Pin write command token.
pub const CMD_VIRTUAL_WRITE: &str = "vw";

/// Pin read command token.
pub const CMD_VIRTUAL_READ: &str = "vr";

impl FrameCodec {
    /// Login with an auth token.
    pub fn login(&mut self, token: &str) -> Result<Bytes, ProtocolError> {
        self.encode(MsgType::Login, None, [token])
    }

    /// Keep-alive ping.
    pub fn ping(&mut self) -> Result<Bytes, ProtocolError> {
        self.encode(MsgType::Ping, None, Vec::<&str>::new())
    }

    /// Heartbeat interval and inbound buffer declaration.
    pub fn heartbeat(&mut self, heartbeat_secs: u64, max_body: usize) -> Result<Bytes, ProtocolError> {
        let heartbeat = heartbeat_secs.to_string();
        let buffer = max_body.to_string();
        self.encode(
            MsgType::Internal,
            None,
            [
                "ver",
                VERSION,
                "buff-in",
                buffer.as_str(),
                "h-beat",
                heartbeat.as_str(),
                "dev",
                DEVICE_LABEL,
            ],
        )
    }

    /// Response to message `msg_id`; the status rides in the length field.
    pub fn response(&mut self, msg_id: u16, status: u16) -> Result<Bytes, ProtocolError> {
        self.encode_header(MsgType::Response, Some(msg_id), status)
    }

    /// Write values to a virtual pin.
    pub fn virtual_write<I, T>(&mut self, pin: u16, values: I) -> Result<Bytes, ProtocolError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let head = [CMD_VIRTUAL_WRITE.to_string(), pin.to_string()];
        let values = values.into_iter().map(|v| v.to_string());
        self.encode(MsgType::Hardware, None, head.into_iter().chain(values))
    }

    /// Ask the broker to resend the stored values of `pins`.
    pub fn virtual_sync<I>(&mut self, pins: I) -> Result<Bytes, ProtocolError>
    where
        I: IntoIterator<Item = u16>,
    {
        let pins = pins.into_iter().map(|p| p.to_string());
        self.encode(
            MsgType::HardwareSync,
            None,
            std::iter::once(CMD_VIRTUAL_READ.to_string()).chain(pins),
        )
    }

    /// Send an email through the broker.
    pub fn email(&mut self, to: &str, subject: &str, body: &str) -> Result<Bytes, ProtocolError> {
        self.encode(MsgType::Email, None, [to, subject, body])
    }

    /// Push notification to the app.
    pub fn notify(&mut self, msg: &str) -> Result<Bytes, ProtocolError> {
        self.encode(MsgType::Notify, None, [msg])
    }

    /// Post to the linked social feed.
    pub fn tweet(&mut self, msg: &str) -> Result<Bytes, ProtocolError> {
        self.encode(MsgType::Tweet, None, [msg])
    }

    /// Update a widget property bound to `pin`.
    pub fn set_property<I, T>(&mut self, pin: u16, property: &str, values: I) -> Result<Bytes, ProtocolError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let head = [pin.to_string(), property.to_string()];
        let values = values.into_iter().map(|v| v.to_string());
        self.encode(MsgType::Property, None, head.into_iter().chain(values))
    }

    /// Internal command, e.g. `["rtc", "sync"]`.
    pub fn internal<I, T>(&mut self, tokens: I) -> Result<Bytes, ProtocolError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.encode(MsgType::Internal, None, tokens)
    }

    /// Event log entry with an optional description.
    pub fn log_event(&mut self, event: &str, description: Option<&str>) -> Result<Bytes, ProtocolError> {
        self.encode(MsgType::EventLog, None, std::iter::once(event).chain(description))
    }
}
