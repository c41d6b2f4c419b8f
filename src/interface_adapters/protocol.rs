// Wire protocol DTOs for the room service WebSocket.

use crate::domain::LeaderboardEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Messages this client sends to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    // Current rep count for this participant.
    Update { count: u32 },
    // Keepalive; the room does not answer it.
    Ping,
}

/// Messages the room broadcasts to its members.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Join(RosterPayload),
    Leave(RosterPayload),
    Leaderboard(RosterPayload),
    // Any other message type is accepted and ignored.
    #[serde(other)]
    Other,
}

/// Player list carried by roster messages. Kept raw so a malformed list degrades to empty
/// instead of rejecting the whole message.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RosterPayload {
    #[serde(default)]
    pub players: serde_json::Value,
}

impl RosterPayload {
    pub fn entries(&self) -> Vec<LeaderboardEntry> {
        match &self.players {
            serde_json::Value::Array(items) => items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| LeaderboardEntry::deserialize(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl ServerMessage {
    /// The leaderboard this message replaces the local one with, if it carries one.
    pub fn into_roster(self) -> Option<Vec<LeaderboardEntry>> {
        match self {
            ServerMessage::Join(payload)
            | ServerMessage::Leave(payload)
            | ServerMessage::Leaderboard(payload) => Some(payload.entries()),
            ServerMessage::Other => None,
        }
    }
}

/// Inbound payload could not be decoded as a room message.
#[derive(Debug)]
pub struct MessageFormatError(pub serde_json::Error);

impl fmt::Display for MessageFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed room message: {}", self.0)
    }
}

impl std::error::Error for MessageFormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Decodes one inbound text frame. The payload must be a JSON object with a string `type`.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, MessageFormatError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(MessageFormatError)?;
    if !value.get("type").is_some_and(serde_json::Value::is_string) {
        return Err(MessageFormatError(serde::de::Error::custom(
            "expected an object with a string `type`",
        )));
    }
    ServerMessage::deserialize(value).map_err(MessageFormatError)
}
