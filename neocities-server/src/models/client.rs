use crate::{events::ServerEvent, models::role::Role};
use log::trace;
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        ClientId(guid_create::GUID::rand().to_string().to_lowercase())
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        ClientId(value.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Connected,
    SelectingRole,
    RoleAssigned,
    Ready,
}

/// Lifecycle of a client within a session. Only a disconnect leaves `Ready`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    SelectingRole,
    RoleAssigned(Role),
    Ready(Role),
}

impl ClientState {
    pub fn phase(&self) -> Phase {
        match self {
            ClientState::Connected => Phase::Connected,
            ClientState::SelectingRole => Phase::SelectingRole,
            ClientState::RoleAssigned(_) => Phase::RoleAssigned,
            ClientState::Ready(_) => Phase::Ready,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            ClientState::RoleAssigned(role) | ClientState::Ready(role) => Some(*role),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ClientState::Ready(_))
    }
}

#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub state: ClientState,
    outbound: mpsc::UnboundedSender<ServerEvent>,
}

impl Client {
    pub fn new(id: ClientId, outbound: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Client {
            id,
            state: ClientState::Connected,
            outbound,
        }
    }

    /// Queues an event for the client's socket. Delivery is not acknowledged.
    pub fn send(&self, event: ServerEvent) {
        if self.outbound.send(event).is_err() {
            trace!("Dropping event for {}, socket already closed", self.id);
        }
    }
}
