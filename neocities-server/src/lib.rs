pub mod config;
pub mod errors;
pub mod events;
pub mod http;
pub mod message;
pub mod models;
pub mod session;
pub mod socket;
