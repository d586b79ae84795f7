//! Device: the connection-side half of a [`Client`](crate::Client).
//!
//! Owns the socket, the session bookkeeping and the frame codec. Handlers
//! receive `&mut Device`, so every send operation here is usable from inside
//! a handler:
//!
//! ```no_run
//! use pinwire_client::{Client, ClientConfig, Device, Event};
//!
//! let mut client = Client::builder(ClientConfig::new("token"))
//!     .on_read(5, |device: &mut Device, _event: &Event| {
//!         device.virtual_write(5, ["23.4"]);
//!         Ok(())
//!     })
//!     .build()?;
//! loop {
//!     client.run()?;
//! }
//! # Ok::<(), pinwire_client::PinwireError>(())
//! ```
//!
//! All send operations return the number of bytes written, or `None` when
//! the device is not connected or the link gave up.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::config::ClientConfig;
use crate::env::{Clock, LogSink};
use crate::error::{AuthError, PinwireError, ProtocolError, Result, Stage};
use crate::protocol::{
    FrameBuffer, FrameCodec, Message, MsgType, STATUS_INVALID_TOKEN, STATUS_SUCCESS,
};
use crate::session::{Liveness, Session, SessionState};
use crate::transport::{Connector, Link};

/// Pause after an empty read while waiting for a handshake reply.
const HANDSHAKE_POLL: Duration = Duration::from_millis(1);

/// Socket, session and codec for one device.
pub struct Device {
    config: ClientConfig,
    session: Session,
    codec: FrameCodec,
    link: Option<Link>,
    connector: Box<dyn Connector>,
    clock: Arc<dyn Clock>,
    log_sink: Option<LogSink>,
    /// Partial inbound frames.
    buffer: FrameBuffer,
    /// Decoded but not yet processed messages.
    pending: VecDeque<Message>,
    /// Set when the stream was left mid-frame; cleared by teardown.
    fault: Option<PinwireError>,
}

impl Device {
    pub(crate) fn new(
        config: ClientConfig,
        connector: Box<dyn Connector>,
        clock: Arc<dyn Clock>,
        log_sink: Option<LogSink>,
    ) -> Self {
        let session = Session::new(clock.now(), config.heartbeat(), config.max_body_bytes);
        let buffer = FrameBuffer::with_max_body(config.max_body_bytes);
        Self {
            config,
            session,
            codec: FrameCodec::new(),
            link: None,
            connector,
            clock,
            log_sink,
            buffer,
            pending: VecDeque::new(),
            fault: None,
        }
    }

    /// Settings in effect.
    #[inline]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session bookkeeping.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current session state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// True when a socket is open and both handshake stages succeeded.
    #[inline]
    pub fn connected(&self) -> bool {
        self.link.is_some() && self.session.is_authenticated()
    }

    /// Clock used for every timestamp and wait.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Write values to a virtual pin.
    pub fn virtual_write<I, T>(&mut self, pin: u16, values: I) -> Option<usize>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.send_with(|codec| codec.virtual_write(pin, values))
    }

    /// Ask the broker to resend the stored values of `pins`; they arrive as
    /// ordinary pin writes.
    pub fn virtual_sync<I>(&mut self, pins: I) -> Option<usize>
    where
        I: IntoIterator<Item = u16>,
    {
        self.send_with(|codec| codec.virtual_sync(pins))
    }

    /// Send an email through the broker.
    pub fn email(&mut self, to: &str, subject: &str, body: &str) -> Option<usize> {
        self.send_with(|codec| codec.email(to, subject, body))
    }

    /// Push notification to the app.
    pub fn notify(&mut self, msg: &str) -> Option<usize> {
        self.send_with(|codec| codec.notify(msg))
    }

    /// Post to the linked social feed.
    pub fn tweet(&mut self, msg: &str) -> Option<usize> {
        self.send_with(|codec| codec.tweet(msg))
    }

    /// Update a widget property bound to `pin`.
    pub fn set_property<I, T>(&mut self, pin: u16, property: &str, values: I) -> Option<usize>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.send_with(|codec| codec.set_property(pin, property, values))
    }

    /// Internal command, e.g. `["rtc", "sync"]`.
    pub fn internal<I, T>(&mut self, tokens: I) -> Option<usize>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.send_with(|codec| codec.internal(tokens))
    }

    /// Event log entry.
    pub fn log_event(&mut self, event: &str, description: Option<&str>) -> Option<usize> {
        self.send_with(|codec| codec.log_event(event, description))
    }

    /// Build and send a frame if connected.
    fn send_with<F>(&mut self, build: F) -> Option<usize>
    where
        F: FnOnce(&mut FrameCodec) -> std::result::Result<Bytes, ProtocolError>,
    {
        if !self.connected() {
            tracing::debug!(state = ?self.state(), "Not connected, frame not sent");
            return None;
        }

        match build(&mut self.codec) {
            Ok(frame) => self.transmit(&frame),
            Err(e) => {
                tracing::warn!(error = %e, "Frame not encoded");
                None
            }
        }
    }

    /// Hand bytes to the link and record the attempt.
    ///
    /// Nothing more is sent once a frame was cut off.
    fn transmit(&mut self, frame: &[u8]) -> Option<usize> {
        if self.fault.is_some() {
            tracing::debug!(len = frame.len(), "Stream out of sync, frame not sent");
            return None;
        }

        let link = self.link.as_mut()?;
        let report = link.send(frame);
        self.session.record_send(report.attempted_at);
        if let Some(written) = report.partial {
            self.fault = Some(PinwireError::PartialWrite {
                written,
                len: frame.len(),
            });
        }
        report.written
    }

    /// Take the error that left the stream unusable, if any.
    pub(crate) fn take_fault(&mut self) -> Result<()> {
        match self.fault.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Answer message `msg_id` with `status`.
    pub(crate) fn respond(&mut self, msg_id: u16, status: u16) -> Option<usize> {
        match self.codec.response(msg_id, status) {
            Ok(frame) => self.transmit(&frame),
            Err(e) => {
                tracing::warn!(msg_id, error = %e, "Response not encoded");
                None
            }
        }
    }

    /// Forward a lifecycle line to tracing and the log sink.
    pub(crate) fn log(&self, line: &str) {
        tracing::info!("{line}");
        if let Some(sink) = &self.log_sink {
            sink.emit(line);
        }
    }

    /// Check liveness, sending a ping when one is due.
    ///
    /// Returns false once the broker is considered gone.
    pub fn is_alive(&mut self) -> bool {
        let now = self.clock.now();
        match self.session.check_liveness(now) {
            Liveness::Alive => true,
            Liveness::PingDue => {
                if let Ok(frame) = self.codec.ping() {
                    self.transmit(&frame);
                }
                self.session.record_ping(now);
                true
            }
            Liveness::Dead => false,
        }
    }

    /// Open a socket and run both handshake stages.
    pub(crate) fn establish(&mut self) -> Result<()> {
        self.teardown();

        let (server, port) = (self.config.server.clone(), self.config.port);
        let stream = self
            .connector
            .open(&server, port, self.config.handshake_timeout())?;
        self.link = Some(Link::new(stream, Arc::clone(&self.clock)));
        self.session.start_connecting(self.clock.now())?;
        self.log(&format!("Connected to {server}:{port}"));

        let login = self.codec.login(&self.config.token)?;
        self.handshake(&login, Stage::Login)?;
        self.session.login_accepted()?;
        self.log("Access granted");

        let heartbeat = self
            .codec
            .heartbeat(self.config.heartbeat_secs, self.config.max_body_bytes)?;
        self.handshake(&heartbeat, Stage::Heartbeat)?;
        self.session.heartbeat_accepted()?;
        self.log(&format!(
            "Heartbeat = {}s, max body = {} bytes",
            self.config.heartbeat_secs, self.config.max_body_bytes
        ));

        Ok(())
    }

    /// Send one handshake frame and require a success response.
    fn handshake(&mut self, frame: &[u8], stage: Stage) -> Result<()> {
        let msg_id = self.codec.ids().last();
        if self.transmit(frame).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("{stage} frame not sent"),
            )
            .into());
        }

        let reply = self.await_reply(stage, msg_id)?;
        match reply.status() {
            Some(STATUS_SUCCESS) => Ok(()),
            Some(STATUS_INVALID_TOKEN) if stage == Stage::Login => Err(AuthError::InvalidToken.into()),
            Some(status) => Err(AuthError::Rejected { stage, status }.into()),
            None => Err(AuthError::UnexpectedReply {
                stage,
                msg_type: reply.msg_type,
            }
            .into()),
        }
    }

    /// First message to arrive within the handshake timeout, skipping
    /// responses to ids other than `msg_id`.
    fn await_reply(&mut self, stage: Stage, msg_id: u16) -> Result<Message> {
        let deadline = self.clock.now() + self.config.handshake_timeout();
        loop {
            if let Some(message) = self.pending.pop_front() {
                if message.msg_type == MsgType::Response && message.msg_id != msg_id {
                    tracing::warn!(
                        %stage,
                        expected = msg_id,
                        got = message.msg_id,
                        "Ignoring response to another message"
                    );
                    continue;
                }
                return Ok(message);
            }

            let now = self.clock.now();
            if now >= deadline {
                return Err(AuthError::Timeout { stage }.into());
            }

            if self.receive(deadline - now)? == 0 {
                self.clock.sleep(HANDSHAKE_POLL);
            }
        }
    }

    /// One bounded read; decoded messages are queued.
    ///
    /// Returns the number of bytes read (0 on timeout).
    pub(crate) fn receive(&mut self, timeout: Duration) -> Result<usize> {
        let link = self.link.as_mut().ok_or(PinwireError::NotConnected)?;
        let bytes = link.receive(self.config.max_body_bytes, timeout)?;
        if bytes.is_empty() {
            return Ok(0);
        }

        self.session.record_receive(self.clock.now());
        let messages = self.buffer.push(&bytes)?;
        tracing::trace!(bytes = bytes.len(), messages = messages.len(), "Received");
        self.pending.extend(messages);
        Ok(bytes.len())
    }

    /// Next decoded message not yet processed.
    pub(crate) fn next_message(&mut self) -> Option<Message> {
        self.pending.pop_front()
    }

    /// Close the socket and forget all connection state.
    pub(crate) fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.session.reset();
        self.buffer.clear();
        self.pending.clear();
        self.fault = None;
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("server", &self.config.server)
            .field("port", &self.config.port)
            .field("state", &self.session.state())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
