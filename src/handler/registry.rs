//! Event registry for dispatching inbound messages by event key.
//!
//! Keys are lower-cased on registration and lookup. Registering a key twice
//! silently replaces the first handler.
//!
//! The two wildcard keys `"write v*"` and `"read v*"` expand eagerly into
//! one entry per pin `1..=PIN_MAX`, all sharing a single handler.
//!
//! # Example
//!
//! ```
//! use pinwire_client::handler::{EventRegistry, Event};
//! use pinwire_client::Device;
//!
//! let mut registry = EventRegistry::new();
//!
//! registry.register("write V4", |_device: &mut Device, event: &Event| {
//!     println!("V4 <- {:?}", event.values);
//!     Ok(())
//! });
//! registry.register("read v*", |device: &mut Device, event: &Event| {
//!     if let Some(pin) = event.pin {
//!         device.virtual_write(pin, [42]);
//!     }
//!     Ok(())
//! });
//!
//! assert!(registry.contains("write v4"));
//! assert_eq!(registry.len(), 33);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Event;
use crate::device::Device;
use crate::error::Result;

/// Highest virtual pin covered by wildcard registration.
pub const PIN_MAX: u16 = 32;

/// Lifecycle key fired after a successful connect.
pub const CONNECT_EVENT: &str = "connect";

/// Lifecycle key fired after every disconnect.
pub const DISCONNECT_EVENT: &str = "disconnect";

/// Wildcard key for writes to any pin.
pub const WRITE_ALL_EVENT: &str = "write v*";

/// Wildcard key for reads of any pin.
pub const READ_ALL_EVENT: &str = "read v*";

const WRITE_PREFIX: &str = "write v";
const READ_PREFIX: &str = "read v";
const INTERNAL_PREFIX: &str = "internal_";

/// Key for writes to `pin`.
pub fn write_key(pin: impl fmt::Display) -> String {
    format!("{WRITE_PREFIX}{pin}").to_lowercase()
}

/// Key for reads of `pin`.
pub fn read_key(pin: impl fmt::Display) -> String {
    format!("{READ_PREFIX}{pin}").to_lowercase()
}

/// Key for internal messages on `topic`.
pub fn internal_key(topic: &str) -> String {
    format!("{INTERNAL_PREFIX}{topic}").to_lowercase()
}

/// Trait for event handlers.
///
/// Handlers get the [`Device`] so they can answer (e.g. write the value a
/// read asked for). Returning `PinwireError::Interrupted` stops
/// `Client::run`; any other error is logged.
pub trait Handler: Send + Sync + 'static {
    /// Handle one event.
    fn call(&self, device: &mut Device, event: &Event) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Device, &Event) -> Result<()> + Send + Sync + 'static,
{
    fn call(&self, device: &mut Device, event: &Event) -> Result<()> {
        self(device, event)
    }
}

/// Handler shared between wildcard entries.
pub type SharedHandler = Arc<dyn Handler>;

/// Registry mapping event keys to handlers.
#[derive(Clone, Default)]
pub struct EventRegistry {
    /// Handlers by lower-cased key.
    handlers: HashMap<String, SharedHandler>,
}

impl EventRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `key`, expanding wildcards.
    ///
    /// Returns the number of entries written.
    pub fn register<H: Handler>(&mut self, key: &str, handler: H) -> usize {
        self.register_shared(key, Arc::new(handler))
    }

    /// Register an already shared handler under `key`, expanding wildcards.
    pub fn register_shared(&mut self, key: &str, handler: SharedHandler) -> usize {
        let key = key.to_lowercase();

        let prefix = match key.as_str() {
            WRITE_ALL_EVENT => Some(WRITE_PREFIX),
            READ_ALL_EVENT => Some(READ_PREFIX),
            _ => None,
        };

        let Some(prefix) = prefix else {
            tracing::debug!(key = %key, "Registered event handler");
            self.handlers.insert(key, handler);
            return 1;
        };

        for pin in 1..=PIN_MAX {
            self.handlers
                .insert(format!("{prefix}{pin}"), Arc::clone(&handler));
        }
        tracing::debug!(key = %key, count = PIN_MAX, "Registered wildcard event handler");
        usize::from(PIN_MAX)
    }

    /// Get the handler for `key`.
    pub fn get(&self, key: &str) -> Option<SharedHandler> {
        self.handlers.get(&key.to_lowercase()).cloned()
    }

    /// Check if `key` has a handler.
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(&key.to_lowercase())
    }

    /// Remove the handler for `key`.
    pub fn remove(&mut self, key: &str) -> Option<SharedHandler> {
        self.handlers.remove(&key.to_lowercase())
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
