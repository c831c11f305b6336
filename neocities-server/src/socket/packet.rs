//! Engine.IO v4 / Socket.IO v5 text packets, as spoken by `socket.io-client`.

use crate::{errors::packet_error::PacketError, events::ServerEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    pub max_payload: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        args: Vec<Value>,
        ack: Option<u64>,
    },
    ConnectError(Value),
}

impl Packet {
    pub const NOOP: &'static str = "6";

    pub fn event(event: &ServerEvent) -> Result<Self, PacketError> {
        Ok(Packet::Event {
            name: event.name().to_string(),
            args: vec![event.payload()?],
            ack: None,
        })
    }

    pub fn encode(&self) -> Result<String, PacketError> {
        let encoded = match self {
            Packet::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => Packet::NOOP.to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(payload)) => format!("40{payload}"),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, args, ack } => {
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());

                let ack = ack.map(|id| id.to_string()).unwrap_or_default();
                format!("42{ack}{}", Value::Array(array))
            }
            Packet::ConnectError(payload) => format!("44{payload}"),
        };

        Ok(encoded)
    }

    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => decode_message(rest),
            '5' | '6' => Ok(Packet::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

fn decode_message(text: &str) -> Result<Packet, PacketError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = strip_namespace(chars.as_str())?;

    match kind {
        '0' => {
            if rest.is_empty() {
                Ok(Packet::Connect(None))
            } else {
                Ok(Packet::Connect(Some(serde_json::from_str(rest)?)))
            }
        }
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let (ack, payload) = rest.split_at(digits);
            let ack = ack.parse::<u64>().ok();

            let mut args: Vec<Value> = serde_json::from_str(payload)?;
            if args.is_empty() {
                return Err(PacketError::MissingEventName);
            }

            let Value::String(name) = args.remove(0) else {
                return Err(PacketError::MissingEventName);
            };

            Ok(Packet::Event { name, args, ack })
        }
        '4' => Ok(Packet::ConnectError(serde_json::from_str(rest)?)),
        '3' | '5' | '6' => Err(PacketError::Unsupported(kind)),
        other => Err(PacketError::UnknownType(other)),
    }
}

/// Strips a `/nsp,` prefix. Only the main namespace is served.
fn strip_namespace(text: &str) -> Result<&str, PacketError> {
    if !text.starts_with('/') {
        return Ok(text);
    }

    let (namespace, rest) = text.split_once(',').unwrap_or((text, ""));
    if namespace != "/" {
        return Err(PacketError::UnsupportedNamespace(namespace.to_string()));
    }

    Ok(rest)
}
