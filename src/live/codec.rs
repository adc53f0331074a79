//! Socket.IO v4 packets carried in Engine.IO v4 text frames.
//!
//! Only the text encoding is handled. Binary attachments are rejected.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;

/// Engine.IO `open` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the connection may stay silent before it is considered dead.
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        payload: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack: Option<u64>,
        name: String,
        /// First argument of the event, `Null` when there is none.
        data: Value,
    },
    Ack {
        namespace: String,
        ack: u64,
        data: Value,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

pub fn decode(frame: &str) -> Result<Packet, AppError> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| AppError::Channel("empty frame".to_string()))?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping(rest.to_string())),
        '3' => Ok(Packet::Pong(rest.to_string())),
        '4' => decode_socket(rest).map(Packet::Message),
        '5' => Ok(Packet::Upgrade),
        '6' => Ok(Packet::Noop),
        other => Err(AppError::Channel(format!(
            "unknown engine packet type: {}",
            other
        ))),
    }
}

fn decode_socket(body: &str) -> Result<SocketPacket, AppError> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| AppError::Channel("empty socket packet".to_string()))?;
    let mut rest = chars.as_str();

    let mut namespace = "/".to_string();
    if rest.starts_with('/') {
        let (ns, tail) = match rest.find(',') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        namespace = ns.to_string();
        rest = tail;
    }

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let ack = if digits > 0 {
        let id = rest[..digits]
            .parse::<u64>()
            .map_err(|e| AppError::Channel(format!("bad ack id: {}", e)))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let payload: Option<Value> = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str(rest)?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, payload }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args = match payload {
                Some(Value::Array(args)) => args.into_iter(),
                _ => return Err(AppError::Channel("event without argument list".to_string())),
            };
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => return Err(AppError::Channel("event without a name".to_string())),
            };
            Ok(SocketPacket::Event {
                namespace,
                ack,
                name,
                data: args.next().unwrap_or(Value::Null),
            })
        }
        '3' => Ok(SocketPacket::Ack {
            namespace,
            ack: ack.ok_or_else(|| AppError::Channel("ack without id".to_string()))?,
            data: payload.unwrap_or(Value::Null),
        }),
        '4' => {
            let message = match payload {
                Some(Value::Object(map)) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connection refused")
                    .to_string(),
                Some(Value::String(s)) => s,
                _ => "connection refused".to_string(),
            };
            Ok(SocketPacket::ConnectError { namespace, message })
        }
        '5' | '6' => Err(AppError::Channel(
            "binary packets are not supported".to_string(),
        )),
        other => Err(AppError::Channel(format!(
            "unknown socket packet type: {}",
            other
        ))),
    }
}

pub fn encode_pong(data: &str) -> String {
    format!("3{}", data)
}

/// Namespace connect request. The default namespace is written as `40`.
pub fn encode_connect(namespace: &str) -> String {
    if namespace == "/" || namespace.is_empty() {
        "40".to_string()
    } else {
        format!("40{},", namespace)
    }
}

pub fn encode_event(name: &str, data: &Value) -> String {
    format!("42{}", Value::Array(vec![Value::String(name.to_string()), data.clone()]))
}

/// `http(s)://host[/]` to the Engine.IO WebSocket endpoint on that host.
pub fn endpoint_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/socket.io/?EIO=4&transport=websocket", base)
}
