use crate::{
    errors::session_error::SessionError,
    models::{client::ClientId, role::Role},
};
use std::collections::{BTreeMap, btree_map::Entry};

/// Which client holds each role. A role has at most one holder.
#[derive(Debug, Default)]
pub struct RoleTable {
    occupants: BTreeMap<Role, ClientId>,
}

impl RoleTable {
    pub fn claim(&mut self, role: Role, id: &ClientId) -> Result<(), SessionError> {
        match self.occupants.entry(role) {
            Entry::Occupied(_) => Err(SessionError::RoleUnavailable(role)),
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
                Ok(())
            }
        }
    }

    /// Frees `role` if `id` holds it.
    pub fn release(&mut self, role: Role, id: &ClientId) -> bool {
        if self.occupants.get(&role) != Some(id) {
            return false;
        }

        self.occupants.remove(&role);
        true
    }

    pub fn occupants(&self) -> &BTreeMap<Role, ClientId> {
        &self.occupants
    }
}
