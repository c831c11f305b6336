use crate::{
    errors::session_error::SessionError,
    models::{client::ClientId, player_view::PlayerView, resource::Resource, role::Role},
    session::chat::ChatMessage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Events a game client emits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    PlayerSelected(Role),
    PlayerReady,
    ChatMessage { message: String },
}

#[derive(Deserialize)]
struct ChatPayload {
    message: String,
}

impl ClientEvent {
    pub fn parse(name: &str, args: Vec<Value>) -> Result<Self, SessionError> {
        let payload = args.into_iter().next().unwrap_or(Value::Null);
        let malformed = |error: serde_json::Error| {
            SessionError::MalformedPayload(format!("{name}: {error}"))
        };

        match name {
            "playerSelected" => Ok(ClientEvent::PlayerSelected(
                serde_json::from_value(payload).map_err(malformed)?,
            )),
            "playerReady" => Ok(ClientEvent::PlayerReady),
            "chatMessage" => {
                let ChatPayload { message } = serde_json::from_value(payload).map_err(malformed)?;
                Ok(ClientEvent::ChatMessage { message })
            }
            _ => Err(SessionError::MalformedPayload(format!("Unknown event: {name}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RosterSnapshot {
    /// Identifier of the client receiving the snapshot.
    pub id: ClientId,
    pub players: BTreeMap<ClientId, PlayerView>,
    pub time: u64,
}

/// Events the server emits to game clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    CurrentPlayers(RosterSnapshot),
    ResourcesAssigned(Vec<Resource>),
    RoleUnavailable { role: Role },
    Rejected { reason: String },
    ReceiveMessage(ChatMessage),
    TimerUpdate(u64),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::CurrentPlayers(_) => "currentPlayers",
            ServerEvent::ResourcesAssigned(_) => "resourcesAssigned",
            ServerEvent::RoleUnavailable { .. } => "roleUnavailable",
            ServerEvent::Rejected { .. } => "rejected",
            ServerEvent::ReceiveMessage(_) => "receiveMessage",
            ServerEvent::TimerUpdate(_) => "timerUpdate",
        }
    }

    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            ServerEvent::CurrentPlayers(snapshot) => serde_json::to_value(snapshot),
            ServerEvent::ResourcesAssigned(resources) => serde_json::to_value(resources),
            ServerEvent::RoleUnavailable { role } => Ok(json!({ "role": role })),
            ServerEvent::Rejected { reason } => Ok(json!({ "reason": reason })),
            ServerEvent::ReceiveMessage(message) => serde_json::to_value(message),
            ServerEvent::TimerUpdate(time) => Ok(json!(time)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_events() {
        assert_eq!(
            ClientEvent::parse("playerSelected", vec![json!("hazmat")]),
            Ok(ClientEvent::PlayerSelected(Role::Hazmat))
        );
        assert_eq!(
            ClientEvent::parse("playerReady", vec![]),
            Ok(ClientEvent::PlayerReady)
        );
        assert_eq!(
            ClientEvent::parse("chatMessage", vec![json!({ "message": "on my way" })]),
            Ok(ClientEvent::ChatMessage {
                message: "on my way".to_string()
            })
        );
    }

    #[test]
    fn rejects_malformed_client_events() {
        for (name, args) in [
            ("playerSelected", vec![json!("paramedic")]),
            ("playerSelected", vec![]),
            ("chatMessage", vec![json!("hello")]),
            ("chatMessage", vec![json!({ "text": "hello" })]),
            ("teleport", vec![]),
        ] {
            assert!(
                matches!(
                    ClientEvent::parse(name, args),
                    Err(SessionError::MalformedPayload(_))
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn server_event_payloads() {
        let resources = ServerEvent::ResourcesAssigned(vec![Resource::new("Fire Engine")]);
        assert_eq!(resources.name(), "resourcesAssigned");
        assert_eq!(resources.payload().unwrap(), json!([{ "name": "Fire Engine" }]));

        let timer = ServerEvent::TimerUpdate(42);
        assert_eq!(timer.payload().unwrap(), json!(42));

        let unavailable = ServerEvent::RoleUnavailable { role: Role::Police };
        assert_eq!(unavailable.payload().unwrap(), json!({ "role": "police" }));
    }
}
