//! Text-frame encoding and decoding.

use serde::Deserialize;

use crate::constants::MAX_MESSAGE_SIZE;
use crate::messages::{AuthMessage, Command, CommandFrame, ServerMessage};

/// Errors from encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("message too large ({0} bytes)")]
    TooLarge(usize),
}

/// Serializes `command` under the given id.
pub fn encode_command(id: u64, command: &Command) -> Result<String, ProtocolError> {
    #[derive(serde::Serialize)]
    struct Borrowed<'a> {
        id: u64,
        #[serde(flatten)]
        command: &'a Command,
    }
    Ok(serde_json::to_string(&Borrowed { id, command })?)
}

/// Serializes the `auth` handshake reply.
pub fn encode_auth(access_token: &str) -> Result<String, ProtocolError> {
    let msg = AuthMessage {
        access_token: access_token.to_string(),
    };
    Ok(serde_json::to_string(&msg)?)
}

/// Decodes one inbound text frame.
///
/// A well-formed frame whose `type` is not one of
/// [`ServerMessage::KNOWN_TYPES`] yields [`ProtocolError::UnknownType`] so the
/// caller can log it distinctly from malformed input.
pub fn decode(text: &str) -> Result<ServerMessage, ProtocolError> {
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(text.len()));
    }

    match serde_json::from_str::<ServerMessage>(text) {
        Ok(msg) => Ok(msg),
        Err(err) => {
            #[derive(Deserialize)]
            struct TypeTag {
                #[serde(rename = "type")]
                msg_type: String,
            }
            match serde_json::from_str::<TypeTag>(text) {
                Ok(tag) if !ServerMessage::KNOWN_TYPES.contains(&tag.msg_type.as_str()) => {
                    Err(ProtocolError::UnknownType(tag.msg_type))
                }
                _ => Err(ProtocolError::Json(err)),
            }
        }
    }
}

/// Parses a frame produced by [`encode_command`]. Used by hub simulators.
pub fn decode_command(text: &str) -> Result<CommandFrame, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
