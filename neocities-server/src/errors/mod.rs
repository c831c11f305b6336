pub mod config_error;
pub mod connection_error;
pub mod packet_error;
pub mod session_error;
