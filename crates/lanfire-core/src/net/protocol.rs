use serde::Deserialize;

use super::messages::{ClientMessage, ServerMessage};

/// Fixed simulation broadcast rate in Hz.
pub const TICK_RATE_HZ: u32 = 20;

/// Maximum inbound frame size in bytes. Client messages are tiny; anything
/// larger is dropped unparsed.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    MissingType,
    UnknownMessageType(String),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::MissingType => write!(f, "message has no string `type` field"),
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t:?}"),
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a `ServerMessage` as a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a `ClientMessage` as a JSON text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Decode an inbound text frame into a `ClientMessage`.
///
/// The `type` tag is checked before the payload so unknown kinds are
/// reported distinctly from malformed payloads.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Err(ProtocolError::MissingType);
    };
    if !ClientMessage::TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownMessageType(kind.to_string()));
    }
    ClientMessage::deserialize(value).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode a server text frame. Used by Rust clients and tests.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}
