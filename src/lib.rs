//! # pinwire-client
//!
//! Device-side client for a small binary virtual-pin protocol, spoken over
//! TCP (optionally TLS) with a cloud broker.
//!
//! A device logs in with an auth token, declares its heartbeat interval and
//! then exchanges pin values: the broker (and the apps behind it) write and
//! read virtual pins, the device answers and pushes values of its own.
//!
//! ## Architecture
//!
//! - **Protocol**: 5-byte header + NUL-separated UTF-8 tokens ([`protocol`])
//! - **Transport**: byte streams with bounded blocking, retrying sends ([`transport`])
//! - **Session**: handshake states and liveness bookkeeping ([`session`])
//! - **Dispatch**: event keys like `"write v4"` mapped to handlers ([`handler`])
//! - **Facade**: [`Client`] drives everything from the caller's own loop
//!
//! ## Example
//!
//! ```no_run
//! use pinwire_client::{Client, ClientConfig, Device, Event};
//!
//! let config = ClientConfig::from_json_file("device.json")?;
//! let mut client = Client::builder(config)
//!     .on_write(4, |device: &mut Device, event: &Event| {
//!         // echo the value back to pin 5
//!         device.virtual_write(5, &event.values);
//!         Ok(())
//!     })
//!     .build()?;
//!
//! loop {
//!     client.run()?;
//! }
//! # Ok::<(), pinwire_client::PinwireError>(())
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod session;
pub mod transport;

mod client;
mod device;

pub use client::{Client, ClientBuilder, OFFLINE_REASON};
pub use config::ClientConfig;
pub use device::Device;
pub use error::{AuthError, PinwireError, ProtocolError, Result, Stage};
pub use handler::{Event, Handler};
