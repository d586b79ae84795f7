//! Inbound routing: which event key (if any) a decoded message fires.

use std::str::FromStr;

use super::registry::{internal_key, read_key, write_key};
use crate::protocol::{Message, MsgType, CMD_VIRTUAL_READ, CMD_VIRTUAL_WRITE};

/// Payload handed to an event handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Key the handler was found under.
    pub key: String,
    /// Pin number for pin reads/writes, if it parsed.
    pub pin: Option<u16>,
    /// Values following the command tokens.
    pub values: Vec<String>,
}

impl Event {
    /// Event with no pin and no values (lifecycle events).
    pub fn lifecycle(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    /// Value at `index` as a string.
    #[inline]
    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Value at `index` parsed as `T`.
    pub fn parse<T: FromStr>(&self, index: usize) -> Option<T> {
        self.value(index).and_then(|v| v.parse().ok())
    }
}

/// What to do with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Response to one of our messages; only logged.
    Ack {
        /// Id it answers.
        msg_id: u16,
        /// Status from the length field.
        status: u16,
    },
    /// Answer with a success response carrying the same id.
    PingReply {
        /// Id to echo.
        msg_id: u16,
    },
    /// Invoke the handler registered under `event.key`, if any.
    Handler(Event),
    /// Nothing to do.
    Drop,
}

/// Route a decoded message.
///
/// - hardware/bridge `["vw", pin, values..]` → `write v<pin>` with the values
/// - hardware/bridge `["vr", pin]` → `read v<pin>` with no values
/// - internal `[cmd, topic, values..]` → `internal_<topic>` with the values
///
/// Anything else, including too few tokens, is dropped.
pub fn route(message: &Message) -> Route {
    match message.msg_type {
        MsgType::Response => Route::Ack {
            msg_id: message.msg_id,
            status: message.length,
        },
        MsgType::Ping => Route::PingReply {
            msg_id: message.msg_id,
        },
        MsgType::Hardware | MsgType::Bridge => route_pin(&message.tokens),
        MsgType::Internal => match message.tokens.as_slice() {
            [_, topic, values @ ..] => Route::Handler(Event {
                key: internal_key(topic),
                pin: None,
                values: values.to_vec(),
            }),
            _ => Route::Drop,
        },
        _ => Route::Drop,
    }
}

fn route_pin(tokens: &[String]) -> Route {
    let [command, pin, values @ ..] = tokens else {
        return Route::Drop;
    };

    let (key, values) = match command.as_str() {
        CMD_VIRTUAL_WRITE => (write_key(pin), values.to_vec()),
        CMD_VIRTUAL_READ => (read_key(pin), Vec::new()),
        _ => return Route::Drop,
    };

    Route::Handler(Event {
        key,
        pin: pin.parse().ok(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(msg_type: MsgType, tokens: &[&str]) -> Message {
        Message {
            msg_type,
            msg_id: 9,
            length: 0,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_hardware_write_routes_to_write_key() {
        let route = route(&message(MsgType::Hardware, &["vw", "127", "abc", "123"]));
        assert_eq!(
            route,
            Route::Handler(Event {
                key: "write v127".into(),
                pin: Some(127),
                values: vec!["abc".into(), "123".into()],
            })
        );
    }

    #[test]
    fn test_bridge_read_routes_without_values() {
        let route = route(&message(MsgType::Bridge, &["vr", "5", "ignored"]));
        let Route::Handler(event) = route else {
            panic!("expected handler route, got {route:?}");
        };
        assert_eq!(event.key, "read v5");
        assert_eq!(event.pin, Some(5));
        assert!(event.values.is_empty());
    }

    #[test]
    fn test_internal_uses_second_token_as_topic() {
        let route = route(&message(MsgType::Internal, &["rtc", "sync", "1700000000"]));
        let Route::Handler(event) = route else {
            panic!("expected handler route, got {route:?}");
        };
        assert_eq!(event.key, "internal_sync");
        assert_eq!(event.parse::<u64>(0), Some(1_700_000_000));
    }

    #[test]
    fn test_short_bodies_dropped() {
        assert_eq!(route(&message(MsgType::Hardware, &["vw"])), Route::Drop);
        assert_eq!(route(&message(MsgType::Internal, &["acon"])), Route::Drop);
        assert_eq!(route(&message(MsgType::Hardware, &[])), Route::Drop);
    }

    #[test]
    fn test_unknown_command_dropped() {
        assert_eq!(route(&message(MsgType::Hardware, &["dw", "3", "1"])), Route::Drop);
    }

    #[test]
    fn test_other_kinds_dropped() {
        assert_eq!(route(&message(MsgType::Notify, &["hi"])), Route::Drop);
        assert_eq!(route(&message(MsgType::Login, &["token"])), Route::Drop);
    }

    #[test]
    fn test_ping_and_response() {
        let mut ping = message(MsgType::Ping, &[]);
        ping.msg_id = 77;
        assert_eq!(route(&ping), Route::PingReply { msg_id: 77 });

        let mut ack = message(MsgType::Response, &[]);
        ack.length = 200;
        assert_eq!(route(&ack), Route::Ack { msg_id: 9, status: 200 });
    }

    #[test]
    fn test_non_numeric_pin_still_routes() {
        let Route::Handler(event) = route(&message(MsgType::Hardware, &["vw", "X", "1"])) else {
            panic!("expected handler route");
        };
        assert_eq!(event.key, "write vx");
        assert_eq!(event.pin, None);
    }
}
