use crate::{
    events::ServerEvent,
    models::{client::ClientId, role::Role},
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Role {0} is already taken")]
    RoleUnavailable(Role),
    #[error("Unknown client {0}")]
    UnknownClient(ClientId),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("A role is already assigned")]
    RoleAlreadyAssigned,
    #[error("No role has been assigned yet")]
    NoRoleAssigned,
    #[error("Already ready")]
    AlreadyReady,
}

impl SessionError {
    /// The reply owed to the client that triggered the error, if any.
    pub fn reply(&self) -> Option<ServerEvent> {
        match self {
            SessionError::RoleUnavailable(role) => {
                Some(ServerEvent::RoleUnavailable { role: *role })
            }
            SessionError::UnknownClient(_) | SessionError::MalformedPayload(_) => None,
            SessionError::RoleAlreadyAssigned
            | SessionError::NoRoleAssigned
            | SessionError::AlreadyReady => Some(ServerEvent::Rejected {
                reason: self.to_string(),
            }),
        }
    }
}
