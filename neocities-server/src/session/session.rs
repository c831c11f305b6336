use crate::{
    errors::session_error::SessionError,
    events::{RosterSnapshot, ServerEvent},
    models::{
        client::{ClientId, ClientState},
        player_view::PlayerView,
        resource::ResourceBundles,
        role::Role,
    },
    session::{
        chat::{self, ChatMessage},
        clock::SessionClock,
        registry::ConnectionRegistry,
        roles::RoleTable,
    },
};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, trace, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub players: usize,
    pub ready: usize,
    pub roles: BTreeMap<Role, ClientId>,
    pub time: u64,
    pub started_at: String,
}

/// State of one running game. Owned by a single coordinator task.
pub struct Session {
    registry: ConnectionRegistry,
    roles: RoleTable,
    clock: SessionClock,
    bundles: ResourceBundles,
    chat_max_length: usize,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(bundles: ResourceBundles, chat_max_length: usize) -> Self {
        Session {
            registry: ConnectionRegistry::default(),
            roles: RoleTable::default(),
            clock: SessionClock::default(),
            bundles,
            chat_max_length,
            started_at: Utc::now(),
        }
    }

    pub fn connect(&mut self, outbound: mpsc::UnboundedSender<ServerEvent>) -> ClientId {
        let id = self.registry.register(outbound);
        info!("{id} joined, {} connected", self.registry.len());

        self.broadcast_roster();
        id
    }

    pub fn disconnect(&mut self, id: &ClientId) -> Result<(), SessionError> {
        let client = self.registry.remove(id)?;
        if let Some(role) = client.state.role() {
            self.roles.release(role, id);
            info!("{id} released {role}");
        }

        if self.registry.is_empty() {
            info!("{id} left, session is empty");
        } else {
            info!("{id} left, {} connected", self.registry.len());
        }

        self.broadcast_roster();
        Ok(())
    }

    pub fn select_role(&mut self, id: &ClientId, role: Role) -> Result<(), SessionError> {
        {
            let client = self.registry.get_mut(id)?;
            if client.state.role().is_some() {
                return Err(SessionError::RoleAlreadyAssigned);
            }
            client.state = ClientState::SelectingRole;
        }

        self.roles.claim(role, id)?;

        let client = self.registry.get_mut(id)?;
        client.state = ClientState::RoleAssigned(role);
        client.send(ServerEvent::ResourcesAssigned(
            self.bundles.bundle(role).to_vec(),
        ));
        info!("{id} claimed {role}");

        self.broadcast_roster();
        Ok(())
    }

    pub fn ready(&mut self, id: &ClientId) -> Result<(), SessionError> {
        let time = self.clock.elapsed();
        let client = self.registry.get_mut(id)?;

        match client.state {
            ClientState::RoleAssigned(role) => {
                client.state = ClientState::Ready(role);
                client.send(ServerEvent::TimerUpdate(time));
                info!("{id} is ready as {role}");
            }
            ClientState::Ready(_) => return Err(SessionError::AlreadyReady),
            ClientState::Connected | ClientState::SelectingRole => {
                return Err(SessionError::NoRoleAssigned);
            }
        }

        self.broadcast_roster();
        Ok(())
    }

    pub fn chat(&mut self, id: &ClientId, message: String) -> Result<(), SessionError> {
        let sender = PlayerView::from(self.registry.get(id)?);
        let message = chat::validate(message, self.chat_max_length)?;
        trace!("Chat {id}: {message}");

        self.registry
            .broadcast(&ServerEvent::ReceiveMessage(ChatMessage { sender, message }));
        Ok(())
    }

    /// Advances the clock and sends the new value to every ready client.
    pub fn tick(&mut self) -> u64 {
        let time = self.clock.advance();
        for client in self.registry.clients().filter(|client| client.state.is_ready()) {
            client.send(ServerEvent::TimerUpdate(time));
        }
        time
    }

    /// Reports a failed event back to the client that sent it, when it is owed a reply.
    pub fn settle(&self, id: &ClientId, result: Result<(), SessionError>) {
        let Err(error) = result else {
            return;
        };

        match error.reply() {
            Some(reply) => {
                warn!("Rejecting event from {id}: {error}");
                if let Ok(client) = self.registry.get(id) {
                    client.send(reply);
                }
            }
            None => warn!("Dropping event from {id}: {error}"),
        }
    }

    pub fn client_state(&self, id: &ClientId) -> Option<ClientState> {
        self.registry.get(id).ok().map(|client| client.state)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            players: self.registry.len(),
            ready: self
                .registry
                .clients()
                .filter(|client| client.state.is_ready())
                .count(),
            roles: self.roles.occupants().clone(),
            time: self.clock.elapsed(),
            started_at: self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    fn broadcast_roster(&self) {
        let players = self.registry.roster();
        let time = self.clock.elapsed();

        for client in self.registry.clients() {
            client.send(ServerEvent::CurrentPlayers(RosterSnapshot {
                id: client.id.clone(),
                players: players.clone(),
                time,
            }));
        }
    }
}
