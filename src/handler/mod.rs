//! Handler module - inbound routing and event dispatch.
//!
//! Provides:
//! - [`EventRegistry`] - maps event keys to handlers, with wildcard pins
//! - [`route`] - decides which key an inbound message fires
//! - [`Event`] - what a handler receives

mod event;
mod registry;

pub use event::{route, Event, Route};
pub use registry::{
    internal_key, read_key, write_key, EventRegistry, Handler, SharedHandler, CONNECT_EVENT,
    DISCONNECT_EVENT, PIN_MAX, READ_ALL_EVENT, WRITE_ALL_EVENT,
};
