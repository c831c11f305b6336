pub mod chat;
pub mod clock;
pub mod coordinator;
pub mod registry;
pub mod roles;
pub mod session;
