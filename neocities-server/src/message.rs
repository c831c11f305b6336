use crate::{
    events::{ClientEvent, ServerEvent},
    models::{client::ClientId, role::Role},
    session::session::SessionStats,
};
use tokio::sync::{mpsc, oneshot};

/// Inbox of the session coordinator.
#[derive(Debug)]
pub enum Message {
    Connect {
        client_tx: mpsc::UnboundedSender<ServerEvent>,
        reply: oneshot::Sender<ClientId>,
    },

    Disconnect(ClientId),

    PlayerSelected {
        client_id: ClientId,
        role: Role,
    },

    PlayerReady(ClientId),

    ChatMessage {
        client_id: ClientId,
        message: String,
    },

    GetStats(oneshot::Sender<SessionStats>),
}

impl Message {
    pub fn from_client_event(client_id: ClientId, event: ClientEvent) -> Self {
        match event {
            ClientEvent::PlayerSelected(role) => Message::PlayerSelected { client_id, role },
            ClientEvent::PlayerReady => Message::PlayerReady(client_id),
            ClientEvent::ChatMessage { message } => Message::ChatMessage { client_id, message },
        }
    }
}
