//! Client builder and runtime loop.
//!
//! The [`ClientBuilder`] provides a fluent API for registering event
//! handlers and building the client. The [`Client`] manages the lifecycle:
//! 1. Open a socket to the broker
//! 2. Log in with the auth token, then declare the heartbeat
//! 3. Read frames and dispatch them to handlers
//! 4. Ping when idle, reconnect when the broker goes quiet
//!
//! Nothing runs in the background: the caller drives everything by calling
//! [`Client::run`] in its own loop. A connected call returns within the read
//! timeout; a call that has to connect first may block for up to
//! `connect_timeout_secs`.
//!
//! # Example
//!
//! ```no_run
//! use pinwire_client::{Client, ClientConfig, Device, Event};
//!
//! fn main() -> Result<(), pinwire_client::PinwireError> {
//!     let mut client = Client::builder(ClientConfig::new("my-auth-token"))
//!         .on_write_all(|_device: &mut Device, event: &Event| {
//!             println!("{} <- {:?}", event.key, event.values);
//!             Ok(())
//!         })
//!         .on_connect(|device: &mut Device, _event: &Event| {
//!             device.virtual_sync([1, 2]);
//!             Ok(())
//!         })
//!         .build()?;
//!
//!     loop {
//!         client.run()?;
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::device::Device;
use crate::env::{Clock, LogSink, SystemClock};
use crate::error::{PinwireError, Result};
use crate::handler::{
    internal_key, read_key, route, write_key, Event, EventRegistry, Handler, Route,
    CONNECT_EVENT, DISCONNECT_EVENT, READ_ALL_EVENT, WRITE_ALL_EVENT,
};
use crate::protocol::{Message, STATUS_SUCCESS};
use crate::transport::{Connector, PolledTcpConnector, TcpConnector};

/// Reason logged when the liveness check gives up on the broker.
pub const OFFLINE_REASON: &str = "server is offline";

/// Builder for configuring and creating a client.
///
/// Register handlers with the fluent API, then call `build()`.
pub struct ClientBuilder {
    config: ClientConfig,
    registry: EventRegistry,
    connector: Option<Box<dyn Connector>>,
    clock: Option<Arc<dyn Clock>>,
    log_sink: Option<LogSink>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: EventRegistry::new(),
            connector: None,
            clock: None,
            log_sink: None,
        }
    }

    /// Register a handler under an arbitrary event key.
    ///
    /// `"write v*"` and `"read v*"` register every pin.
    pub fn on<H: Handler>(mut self, key: &str, handler: H) -> Self {
        self.registry.register(key, handler);
        self
    }

    /// Register a handler for writes to `pin`.
    pub fn on_write<H: Handler>(self, pin: u16, handler: H) -> Self {
        let key = write_key(pin);
        self.on(&key, handler)
    }

    /// Register a handler for reads of `pin`.
    pub fn on_read<H: Handler>(self, pin: u16, handler: H) -> Self {
        let key = read_key(pin);
        self.on(&key, handler)
    }

    /// Register one handler for writes to every pin.
    pub fn on_write_all<H: Handler>(self, handler: H) -> Self {
        self.on(WRITE_ALL_EVENT, handler)
    }

    /// Register one handler for reads of every pin.
    pub fn on_read_all<H: Handler>(self, handler: H) -> Self {
        self.on(READ_ALL_EVENT, handler)
    }

    /// Register a handler for internal messages on `topic`
    /// (e.g. `"rtc"`, `"acon"`).
    pub fn on_internal<H: Handler>(self, topic: &str, handler: H) -> Self {
        let key = internal_key(topic);
        self.on(&key, handler)
    }

    /// Register a handler fired after every successful connect.
    pub fn on_connect<H: Handler>(self, handler: H) -> Self {
        self.on(CONNECT_EVENT, handler)
    }

    /// Register a handler fired after every disconnect.
    pub fn on_disconnect<H: Handler>(self, handler: H) -> Self {
        self.on(DISCONNECT_EVENT, handler)
    }

    /// Open sockets through `connector` instead of plain TCP / TLS.
    pub fn connector<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    /// Use `clock` for every timestamp and wait.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Forward lifecycle log lines to `sink`.
    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.log_sink = Some(LogSink::new(sink));
        self
    }

    /// Validate the configuration and build the client.
    ///
    /// Does not connect; the first `run()` does.
    pub fn build(self) -> Result<Client> {
        self.config.validate()?;

        let connector = match self.connector {
            Some(connector) => connector,
            None => default_connector(&self.config)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(Client {
            device: Device::new(self.config, connector, clock, self.log_sink),
            registry: self.registry,
        })
    }
}

fn default_connector(config: &ClientConfig) -> Result<Box<dyn Connector>> {
    if !config.tls {
        if config.poll_io {
            return Ok(Box::new(PolledTcpConnector));
        }
        return Ok(Box::new(TcpConnector));
    }

    #[cfg(feature = "tls")]
    {
        let connector = crate::transport::TlsConnector::new(config.tls_ca_cert.as_deref())?;
        Ok(Box::new(connector))
    }

    #[cfg(not(feature = "tls"))]
    {
        Err(PinwireError::Config(
            "tls = true needs the `tls` cargo feature".into(),
        ))
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// A device client.
///
/// Owns the [`Device`] (socket, session, codec) and the handler registry.
#[derive(Debug)]
pub struct Client {
    device: Device,
    registry: EventRegistry,
}

impl Client {
    /// Create a new client builder.
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// The device half: send operations and session state.
    #[inline]
    pub fn device(&mut self) -> &mut Device {
        &mut self.device
    }

    /// Registered handlers.
    #[inline]
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// True when authenticated and the socket is open.
    #[inline]
    pub fn connected(&self) -> bool {
        self.device.connected()
    }

    /// Register a handler after build. Returns the number of keys written.
    pub fn register_handler<H: Handler>(&mut self, key: &str, handler: H) -> usize {
        self.registry.register(key, handler)
    }

    /// Write values to a virtual pin.
    pub fn virtual_write<I, T>(&mut self, pin: u16, values: I) -> Option<usize>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.device.virtual_write(pin, values)
    }

    /// Ask the broker to resend the stored values of `pins`.
    pub fn virtual_sync<I>(&mut self, pins: I) -> Option<usize>
    where
        I: IntoIterator<Item = u16>,
    {
        self.device.virtual_sync(pins)
    }

    /// Send an email through the broker.
    pub fn email(&mut self, to: &str, subject: &str, body: &str) -> Option<usize> {
        self.device.email(to, subject, body)
    }

    /// Push notification to the app.
    pub fn notify(&mut self, msg: &str) -> Option<usize> {
        self.device.notify(msg)
    }

    /// Post to the linked social feed.
    pub fn tweet(&mut self, msg: &str) -> Option<usize> {
        self.device.tweet(msg)
    }

    /// Update a widget property bound to `pin`.
    pub fn set_property<I, T>(&mut self, pin: u16, property: &str, values: I) -> Option<usize>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.device.set_property(pin, property, values)
    }

    /// Internal command, e.g. `["rtc", "sync"]`.
    pub fn internal<I, T>(&mut self, tokens: I) -> Option<usize>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.device.internal(tokens)
    }

    /// Event log entry.
    pub fn log_event(&mut self, event: &str, description: Option<&str>) -> Option<usize> {
        self.device.log_event(event, description)
    }

    /// Connect, retrying until success or until `timeout` has elapsed.
    ///
    /// Every failed attempt runs [`disconnect`](Self::disconnect) and then
    /// waits the task period. On success the `connect` handler fires.
    ///
    /// Returns `Ok(false)` on timeout. Only `PinwireError::Interrupted`
    /// from a lifecycle handler is returned as an error.
    pub fn connect(&mut self, timeout: Duration) -> Result<bool> {
        let clock = Arc::clone(self.device.clock());
        let deadline = clock.now() + timeout;

        loop {
            if self.connected() {
                return Ok(true);
            }

            match self.device.establish() {
                Ok(()) => {
                    let keys = self.registry.keys().join(", ");
                    self.device.log(&format!("Registered events: [{keys}]"));
                    self.fire_lifecycle(CONNECT_EVENT)?;
                    return Ok(true);
                }
                Err(e) => {
                    self.disconnect(Some(&e.to_string()))?;
                    clock.sleep(self.device.config().task_period());
                }
            }

            if clock.now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Close the socket, reset the session, wait the reconnect delay and
    /// fire the `disconnect` handler.
    pub fn disconnect(&mut self, reason: Option<&str>) -> Result<()> {
        self.device.teardown();

        if let Some(reason) = reason {
            tracing::warn!(reason, "Connection closed");
            self.device.log(&format!("Connection closed: {reason}"));
        }

        let delay = self.device.config().reconnect_delay();
        self.device.clock().sleep(delay);
        self.fire_lifecycle(DISCONNECT_EVENT)
    }

    /// Check liveness, pinging the broker when idle.
    ///
    /// Returns false once nothing has been received for 1.5 heartbeats.
    pub fn is_alive(&mut self) -> bool {
        self.device.is_alive()
    }

    /// One iteration of the client loop.
    ///
    /// When disconnected this connects, blocking for up to
    /// `connect_timeout_secs`. Otherwise it reads once within the read
    /// timeout, processes every decoded message and checks liveness.
    ///
    /// Any failure is logged and turned into a disconnect; only
    /// `PinwireError::Interrupted` is returned.
    pub fn run(&mut self) -> Result<()> {
        if !self.connected() {
            let timeout = self.device.config().connect_timeout();
            self.connect(timeout)?;
            return Ok(());
        }

        match self.poll() {
            Ok(()) => Ok(()),
            Err(e) if e.is_interrupt() => Err(e),
            Err(e) => {
                tracing::error!(error = %e, "Client loop error");
                self.disconnect(Some(&e.to_string()))
            }
        }
    }

    fn poll(&mut self) -> Result<()> {
        // a frame cut off since the last call leaves the broker mid-frame
        self.device.take_fault()?;

        let timeout = self.device.config().read_timeout();
        self.device.receive(timeout)?;

        while let Some(message) = self.device.next_message() {
            self.process(&message)?;
        }
        self.device.take_fault()?;

        if !self.is_alive() {
            self.disconnect(Some(OFFLINE_REASON))?;
        }
        Ok(())
    }

    /// Act on one inbound message.
    ///
    /// Pings are answered with exactly one success response carrying the
    /// same id. Pin and internal messages fire their handlers. Responses
    /// are only logged.
    pub fn process(&mut self, message: &Message) -> Result<()> {
        match route(message) {
            Route::Ack { msg_id, status } => {
                tracing::debug!(msg_id, status, "Response received");
            }
            Route::PingReply { msg_id } => {
                self.device.respond(msg_id, STATUS_SUCCESS);
            }
            Route::Handler(event) => {
                self.call_handler(&event.key, &event)?;
            }
            Route::Drop => {
                tracing::debug!(msg_type = ?message.msg_type, tokens = ?message.tokens, "Message dropped");
            }
        }
        Ok(())
    }

    /// Invoke the handler registered under `key`. A missing handler is a
    /// no-op.
    pub fn call_handler(&mut self, key: &str, event: &Event) -> Result<()> {
        let Some(handler) = self.registry.get(key) else {
            return Ok(());
        };

        tracing::debug!(key, values = ?event.values, "Event");
        handler.call(&mut self.device, event)
    }

    /// Fire a lifecycle handler; only interrupts escape.
    fn fire_lifecycle(&mut self, key: &str) -> Result<()> {
        match self.call_handler(key, &Event::lifecycle(key)) {
            Err(e) if e.is_interrupt() => Err(e),
            Err(e) => {
                tracing::error!(key, error = %e, "Lifecycle handler failed");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}
