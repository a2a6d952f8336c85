/// Minimal Socket.IO v5 / Engine.IO v4 text framing.
///
/// Only what a read-only event subscriber needs: the Engine.IO handshake and
/// heartbeat, namespace connect, and `EVENT` packets. Binary attachments and
/// acknowledgements are not supported.

use crate::shared::error::FrameError;

/// Client -> server: reply to a server ping
pub const ENGINE_PONG: &str = "3";

/// Client -> server: connect to the default namespace
pub const CONNECT_DEFAULT_NAMESPACE: &str = "40";

/// A decoded text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake (`0{...}`)
    Open(serde_json::Value),
    /// Engine.IO close (`1`)
    Close,
    /// Engine.IO heartbeat ping (`2`), must be answered with `ENGINE_PONG`
    Ping,
    /// Engine.IO pong (`3`)
    Pong,
    /// Engine.IO noop (`6`)
    Noop,
    /// Socket.IO namespace connected (`40`)
    Connected { namespace: String },
    /// Socket.IO namespace disconnected (`41`)
    Disconnected { namespace: String },
    /// Socket.IO event (`42["name", ...args]`)
    Event {
        namespace: String,
        name: String,
        args: Vec<serde_json::Value>,
    },
    /// Socket.IO connect error (`44{...}`)
    ConnectError {
        namespace: String,
        message: String,
    },
}

impl Packet {
    /// Decode an Engine.IO text frame.
    pub fn decode(frame: &str) -> Result<Self, FrameError> {
        let mut chars = frame.chars();
        let engine_type = chars.next().ok_or(FrameError::Empty)?;
        let rest = chars.as_str();

        match engine_type {
            '0' => Ok(Packet::Open(
                serde_json::from_str(rest).unwrap_or(serde_json::Value::Null),
            )),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => decode_socket_packet(rest),
            '6' => Ok(Packet::Noop),
            other => Err(FrameError::UnknownEnginePacket(other)),
        }
    }

    /// Event payload when this is an event with the given name
    pub fn event_payload(&self, event: &str) -> Option<&serde_json::Value> {
        match self {
            Packet::Event { name, args, .. } if name == event => args.first(),
            _ => None,
        }
    }
}

fn decode_socket_packet(body: &str) -> Result<Packet, FrameError> {
    let mut chars = body.chars();
    let socket_type = chars.next().ok_or(FrameError::Empty)?;
    let (namespace, data) = split_namespace(chars.as_str());

    match socket_type {
        '0' => Ok(Packet::Connected { namespace }),
        '1' => Ok(Packet::Disconnected { namespace }),
        '2' => decode_event(namespace, skip_ack_id(data)),
        '4' => {
            let message = serde_json::from_str::<serde_json::Value>(data)
                .ok()
                .and_then(|value| {
                    value
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| data.to_string());
            Ok(Packet::ConnectError { namespace, message })
        }
        other => Err(FrameError::UnknownSocketPacket(other)),
    }
}

/// `/admin,rest` -> (`/admin`, `rest`); default namespace is `/`
fn split_namespace(data: &str) -> (String, &str) {
    if data.starts_with('/') {
        match data.split_once(',') {
            Some((namespace, rest)) => (namespace.to_string(), rest),
            None => (data.to_string(), ""),
        }
    } else {
        ("/".to_string(), data)
    }
}

fn skip_ack_id(data: &str) -> &str {
    data.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(namespace: String, data: &str) -> Result<Packet, FrameError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(data).map_err(|e| FrameError::InvalidEvent(e.to_string()))?;

    let mut values = values.into_iter();
    let name = match values.next() {
        Some(serde_json::Value::String(name)) => name,
        Some(other) => {
            return Err(FrameError::InvalidEvent(format!(
                "event name is not a string: {other}"
            )))
        }
        None => return Err(FrameError::InvalidEvent("empty event array".to_string())),
    };

    Ok(Packet::Event {
        namespace,
        name,
        args: values.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_frames() {
        struct TestCase {
            input: &'static str,
            expected: Result<Packet, FrameError>,
        }

        let tests = vec![
            TestCase {
                // TC0: engine open
                input: r#"0{"sid":"abc","pingInterval":25000}"#,
                expected: Ok(Packet::Open(json!({"sid": "abc", "pingInterval": 25000}))),
            },
            TestCase {
                // TC1: ping
                input: "2",
                expected: Ok(Packet::Ping),
            },
            TestCase {
                // TC2: namespace connect ack with sid
                input: r#"40{"sid":"xyz"}"#,
                expected: Ok(Packet::Connected {
                    namespace: "/".to_string(),
                }),
            },
            TestCase {
                // TC3: event on default namespace
                input: r#"42["tradeCreated",{"mint":"m1"}]"#,
                expected: Ok(Packet::Event {
                    namespace: "/".to_string(),
                    name: "tradeCreated".to_string(),
                    args: vec![json!({"mint": "m1"})],
                }),
            },
            TestCase {
                // TC4: event with namespace and ack id
                input: r#"42/feed,7["tradeCreated",1,2]"#,
                expected: Ok(Packet::Event {
                    namespace: "/feed".to_string(),
                    name: "tradeCreated".to_string(),
                    args: vec![json!(1), json!(2)],
                }),
            },
            TestCase {
                // TC5: connect error
                input: r#"44{"message":"Not authorized"}"#,
                expected: Ok(Packet::ConnectError {
                    namespace: "/".to_string(),
                    message: "Not authorized".to_string(),
                }),
            },
            TestCase {
                // TC6: empty frame
                input: "",
                expected: Err(FrameError::Empty),
            },
            TestCase {
                // TC7: unknown engine packet
                input: "9",
                expected: Err(FrameError::UnknownEnginePacket('9')),
            },
            TestCase {
                // TC8: unknown socket packet
                input: "47",
                expected: Err(FrameError::UnknownSocketPacket('7')),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Packet::decode(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_decode_invalid_event() {
        assert!(matches!(
            Packet::decode(r#"42[1,2]"#),
            Err(FrameError::InvalidEvent(_))
        ));
        assert!(matches!(
            Packet::decode(r#"42[]"#),
            Err(FrameError::InvalidEvent(_))
        ));
        assert!(matches!(
            Packet::decode(r#"42{"#),
            Err(FrameError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_event_payload() {
        let packet = Packet::decode(r#"42["tradeCreated",{"mint":"m1"}]"#).unwrap();
        assert_eq!(
            packet.event_payload("tradeCreated"),
            Some(&json!({"mint": "m1"}))
        );
        assert_eq!(packet.event_payload("other"), None);
        assert_eq!(Packet::Ping.event_payload("tradeCreated"), None);
    }
}
