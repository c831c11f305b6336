use thiserror::Error;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Empty packet")]
    Empty,
    #[error("Unknown packet type: {0}")]
    UnknownType(char),
    #[error("Unsupported packet type: {0}")]
    Unsupported(char),
    #[error("Unsupported namespace: {0}")]
    UnsupportedNamespace(String),
    #[error("Event has no name")]
    MissingEventName,
    #[error("Invalid packet payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}
