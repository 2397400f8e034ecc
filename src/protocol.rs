//! JSON framing for the relay's WebSocket events.
//!
//! Every text frame carries one envelope of the form
//! `{"event": "<name>", "data": <payload>}`.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identity::Pseudonym;

/// Private greeting sent once a connection is registered
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub username: Pseudonym,
    pub online_count: usize,
}

/// A stamped chat message as fanned out to every connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub username: Pseudonym,
    pub text: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    Welcome(Welcome),
    System(String),
    Message(ChatMessage),
    Error(String),
}

impl ServerEvent {
    pub fn joined(username: &Pseudonym, online: usize) -> Self {
        ServerEvent::System(format!("{} joined the chat ({} online)", username, online))
    }

    pub fn left(username: &Pseudonym, online: usize) -> Self {
        ServerEvent::System(format!("{} left the chat ({} online)", username, online))
    }

    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Events a client may send. The payload is left unvalidated here.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Message(Value),
}

impl ClientEvent {
    /// `None` for anything that is not a well-formed envelope with a known event
    pub fn parse(frame: &str) -> Option<Self> {
        let envelope: Envelope = serde_json::from_str(frame).ok()?;
        match envelope.event.as_str() {
            "message" => Some(ClientEvent::Message(envelope.data)),
            _ => None,
        }
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2026-10-17T09:30:00.123Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
