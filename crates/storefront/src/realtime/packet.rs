//! Engine.IO v4 / Socket.IO v4 text packet codec.
//!
//! Only the text framing used over the websocket transport is supported.
//! Acks and binary attachments (Socket.IO types 3, 5 and 6) are rejected.
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                   ping / pong
//! 40{"token":".."}                                        socket connect
//! 42["customerNotification",{...}]                        socket event
//! 42/admin,7["newOrder",{...}]                            namespaced, with ack id
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors decoding a packet.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown Engine.IO packet type {0:?}")]
    UnknownEngineType(char),

    #[error("unsupported Socket.IO packet type {0:?}")]
    UnsupportedSocketType(char),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event payload must be an array starting with the event name")]
    MalformedEvent,
}

/// Engine.IO `open` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub upgrades: Vec<String>,
}

/// An Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Noop,
}

/// A Socket.IO packet, carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

/// The default namespace.
pub const ROOT_NAMESPACE: &str = "/";

impl SocketPacket {
    /// Connect to the root namespace with an auth payload.
    #[must_use]
    pub fn connect(auth: Option<Value>) -> Self {
        Self::Connect {
            namespace: ROOT_NAMESPACE.to_string(),
            data: auth,
        }
    }

    /// Emit an event on the root namespace without an ack.
    #[must_use]
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        Self::Event {
            namespace: ROOT_NAMESPACE.to_string(),
            ack: None,
            name: name.to_string(),
            args,
        }
    }

    fn decode(raw: &str) -> Result<Self, PacketError> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();
        if !matches!(kind, '0' | '1' | '2' | '4') {
            return Err(PacketError::UnsupportedSocketType(kind));
        }

        let (namespace, rest) = split_namespace(rest);
        let (ack, payload) = split_ack(rest);
        let data = if payload.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(payload)?)
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = data else {
                    return Err(PacketError::MalformedEvent);
                };
                if items.is_empty() {
                    return Err(PacketError::MalformedEvent);
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(PacketError::MalformedEvent);
                };
                Ok(Self::Event {
                    namespace,
                    ack,
                    name,
                    args: items,
                })
            }
            _ => Ok(Self::ConnectError { namespace, data }),
        }
    }

    fn encode_into(&self, out: &mut String) {
        let (kind, namespace) = match self {
            Self::Connect { namespace, .. } => ('0', namespace),
            Self::Disconnect { namespace } => ('1', namespace),
            Self::Event { namespace, .. } => ('2', namespace),
            Self::ConnectError { namespace, .. } => ('4', namespace),
        };
        out.push(kind);
        if namespace != ROOT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        match self {
            Self::Connect { data, .. } | Self::ConnectError { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            Self::Disconnect { .. } => {}
            Self::Event {
                ack, name, args, ..
            } => {
                if let Some(id) = ack {
                    out.push_str(&id.to_string());
                }
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                out.push_str(&Value::Array(items).to_string());
            }
        }
    }
}

/// Split a leading `/namespace,` off the packet body.
fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (ROOT_NAMESPACE.to_string(), rest);
    }
    match rest.find(',') {
        Some(comma) => {
            let (ns, tail) = rest.split_at(comma);
            (ns.to_string(), tail.get(1..).unwrap_or_default())
        }
        None => (rest.to_string(), ""),
    }
}

/// Split leading ack digits off the payload.
fn split_ack(rest: &str) -> (Option<u64>, &str) {
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return (None, rest);
    }
    let (id, payload) = rest.split_at(digits);
    (id.parse().ok(), payload)
}

impl EnginePacket {
    /// Decode one websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`PacketError`] for empty frames, unknown types or bad JSON.
    pub fn decode(raw: &str) -> Result<Self, PacketError> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(rest.to_string())),
            '3' => Ok(Self::Pong(rest.to_string())),
            '4' => Ok(Self::Message(SocketPacket::decode(rest)?)),
            '6' => Ok(Self::Noop),
            other => Err(PacketError::UnknownEngineType(other)),
        }
    }

    /// Encode as a websocket text frame.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Open(handshake) => {
                out.push('0');
                out.push_str(&serde_json::to_string(handshake).unwrap_or_default());
            }
            Self::Close => out.push('1'),
            Self::Ping(payload) => {
                out.push('2');
                out.push_str(payload);
            }
            Self::Pong(payload) => {
                out.push('3');
                out.push_str(payload);
            }
            Self::Message(packet) => {
                out.push('4');
                packet.encode_into(&mut out);
            }
            Self::Noop => out.push('6'),
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(handshake) = packet else {
            panic!("expected open, got {packet:?}");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.ping_interval, 25_000);
        assert_eq!(handshake.ping_timeout, 20_000);
    }

    #[test]
    fn test_ping_pong() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
        assert_eq!(EnginePacket::decode("3beat").unwrap(), EnginePacket::Pong("beat".into()));
        assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
    }

    #[test]
    fn test_connect_encoding() {
        let packet = EnginePacket::Message(SocketPacket::connect(Some(json!({"token": "abc"}))));
        assert_eq!(packet.encode(), r#"40{"token":"abc"}"#);
        assert_eq!(
            EnginePacket::Message(SocketPacket::connect(None)).encode(),
            "40"
        );
    }

    #[test]
    fn test_connect_ack() {
        let packet = EnginePacket::decode(r#"40{"sid":"wZX3oN0bSVIhsaknAAAI"}"#).unwrap();
        let EnginePacket::Message(SocketPacket::Connect { namespace, data }) = packet else {
            panic!("expected connect");
        };
        assert_eq!(namespace, "/");
        assert_eq!(data.unwrap()["sid"], "wZX3oN0bSVIhsaknAAAI");
    }

    #[test]
    fn test_event_encoding() {
        let join = EnginePacket::Message(SocketPacket::event("joinCustomer", vec![json!("u1")]));
        assert_eq!(join.encode(), r#"42["joinCustomer","u1"]"#);

        let admin = EnginePacket::Message(SocketPacket::event("joinAdmin", vec![]));
        assert_eq!(admin.encode(), r#"42["joinAdmin"]"#);
    }

    #[test]
    fn test_decode_event() {
        let packet =
            EnginePacket::decode(r#"42["customerNotification",{"_id":"n1","title":"Shipped"}]"#)
                .unwrap();
        let EnginePacket::Message(SocketPacket::Event { name, args, ack, .. }) = packet else {
            panic!("expected event");
        };
        assert_eq!(name, "customerNotification");
        assert_eq!(ack, None);
        assert_eq!(args.len(), 1);
        assert_eq!(args[0]["_id"], "n1");
    }

    #[test]
    fn test_decode_namespaced_event_with_ack() {
        let packet = EnginePacket::decode(r#"42/admin,7["newOrder",{"orderId":"o9"}]"#).unwrap();
        let EnginePacket::Message(SocketPacket::Event {
            namespace,
            ack,
            name,
            ..
        }) = packet
        else {
            panic!("expected event");
        };
        assert_eq!(namespace, "/admin");
        assert_eq!(ack, Some(7));
        assert_eq!(name, "newOrder");
    }

    #[test]
    fn test_namespaced_encoding() {
        let packet = EnginePacket::Message(SocketPacket::Event {
            namespace: "/admin".to_string(),
            ack: Some(3),
            name: "joinAdmin".to_string(),
            args: vec![],
        });
        assert_eq!(packet.encode(), r#"42/admin,3["joinAdmin"]"#);
    }

    #[test]
    fn test_connect_error() {
        let packet = EnginePacket::decode(r#"44{"message":"Not authorized"}"#).unwrap();
        assert!(matches!(
            packet,
            EnginePacket::Message(SocketPacket::ConnectError { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_packets() {
        assert!(matches!(EnginePacket::decode(""), Err(PacketError::Empty)));
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(PacketError::UnknownEngineType('9'))
        ));
        assert!(matches!(
            EnginePacket::decode("45-[\"x\"]"),
            Err(PacketError::UnsupportedSocketType('5'))
        ));
        assert!(matches!(
            EnginePacket::decode(r#"42{"not":"an array"}"#),
            Err(PacketError::MalformedEvent)
        ));
        assert!(matches!(EnginePacket::decode("42[1,2]"), Err(PacketError::MalformedEvent)));
        assert!(matches!(EnginePacket::decode("42[oops"), Err(PacketError::Json(_))));
    }
}
