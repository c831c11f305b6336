pub mod client;
pub mod player_view;
pub mod resource;
pub mod role;
