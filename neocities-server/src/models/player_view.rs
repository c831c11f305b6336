use crate::models::{
    client::{Client, ClientId, Phase},
    role::Role,
};
use serde::Serialize;

/// What other players see of a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub id: ClientId,
    pub character: Option<Role>,
    pub state: Phase,
}

impl From<&Client> for PlayerView {
    fn from(client: &Client) -> Self {
        PlayerView {
            id: client.id.clone(),
            character: client.state.role(),
            state: client.state.phase(),
        }
    }
}
