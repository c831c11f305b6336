use crate::{
    errors::session_error::SessionError,
    events::ServerEvent,
    models::{
        client::{Client, ClientId},
        player_view::PlayerView,
    },
};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: BTreeMap<ClientId, Client>,
}

impl ConnectionRegistry {
    pub fn register(&mut self, outbound: mpsc::UnboundedSender<ServerEvent>) -> ClientId {
        let mut id = ClientId::generate();
        while self.clients.contains_key(&id) {
            id = ClientId::generate();
        }

        self.clients
            .insert(id.clone(), Client::new(id.clone(), outbound));
        id
    }

    pub fn remove(&mut self, id: &ClientId) -> Result<Client, SessionError> {
        self.clients
            .remove(id)
            .ok_or(SessionError::UnknownClient(id.clone()))
    }

    pub fn get(&self, id: &ClientId) -> Result<&Client, SessionError> {
        self.clients
            .get(id)
            .ok_or(SessionError::UnknownClient(id.clone()))
    }

    pub fn get_mut(&mut self, id: &ClientId) -> Result<&mut Client, SessionError> {
        self.clients
            .get_mut(id)
            .ok_or(SessionError::UnknownClient(id.clone()))
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn broadcast(&self, event: &ServerEvent) {
        for client in self.clients.values() {
            client.send(event.clone());
        }
    }

    pub fn roster(&self) -> BTreeMap<ClientId, PlayerView> {
        self.clients
            .iter()
            .map(|(id, client)| (id.clone(), PlayerView::from(client)))
            .collect()
    }
}
