use crate::{errors::session_error::SessionError, models::player_view::PlayerView};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender: PlayerView,
    pub message: String,
}

pub fn validate(message: String, max_length: usize) -> Result<String, SessionError> {
    if message.trim().is_empty() {
        return Err(SessionError::MalformedPayload(
            "Chat message is empty".to_string(),
        ));
    }

    let length = message.chars().count();
    if length > max_length {
        return Err(SessionError::MalformedPayload(format!(
            "Chat message has {length} characters, limit is {max_length}"
        )));
    }

    Ok(message)
}
