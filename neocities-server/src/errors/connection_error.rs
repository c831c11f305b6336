use crate::errors::packet_error::PacketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Client disconnected")]
    Closed,
    #[error("Client did not answer or read in time")]
    PingTimeout,
    #[error("Client sent {0} bytes, over the payload limit")]
    PayloadTooLarge(usize),
    #[error("Could not send to client over socket: {0}")]
    Send(axum::Error),
    #[error("Could not receive from client socket: {0}")]
    Receive(axum::Error),
    #[error("Could not encode packet: {0}")]
    Encode(PacketError),
    #[error("Session coordinator is gone")]
    CoordinatorGone,
}
