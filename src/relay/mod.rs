//! Broadcast relay: validation, stamping and fan-out of chat traffic.
//!
//! `BroadcastState` owns everything that changes as clients come and go
//! (presence, admission windows and the message sequence). It has no interior
//! locking; the `hub` module gives it a single owning task.
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::ConnectionId;
use crate::error::Rejection;
use crate::identity::Pseudonym;
use crate::limiters::AdmissionController;
use crate::presence::{Outbox, PresenceRegistry};
use crate::protocol::{self, ChatMessage, ServerEvent, Welcome};
use crate::settings::RelaySettings;

pub mod hub;

pub use hub::{HubHandle, RelayEvent, Session};

/// What happened to one incoming message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Delivered { id: u64 },
    Rejected(Rejection),
}

/// Point-in-time view of the relay, recomputed on every request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub online: usize,
    pub messages_sent: u64,
}

#[derive(Debug)]
pub struct BroadcastState {
    settings: RelaySettings,
    presence: PresenceRegistry,
    admission: AdmissionController,
    next_message_id: u64,
}

impl BroadcastState {
    pub fn new(settings: RelaySettings) -> Self {
        Self::with_presence(settings, PresenceRegistry::new())
    }

    pub fn with_presence(settings: RelaySettings, presence: PresenceRegistry) -> Self {
        let admission = AdmissionController::new(settings.admission.clone());
        Self {
            settings,
            presence,
            admission,
            next_message_id: 0,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Id the next delivered message will carry; also the number delivered so far
    pub fn next_message_id(&self) -> u64 {
        self.next_message_id
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            online: self.presence.live_count(),
            messages_sent: self.next_message_id,
        }
    }

    /// Register the connection, welcome it privately and announce it to everyone.
    ///
    /// A connection that is already registered keeps its name and no notices
    /// are repeated.
    pub fn connect(&mut self, connection_id: ConnectionId, outbox: Outbox) -> Pseudonym {
        if let Some(existing) = self.presence.pseudonym(connection_id) {
            return existing.clone();
        }
        let username = self.presence.register(connection_id, outbox);
        let online = self.presence.live_count();
        self.presence.send_to(
            connection_id,
            ServerEvent::Welcome(Welcome {
                username: username.clone(),
                online_count: online,
            }),
        );
        self.presence
            .broadcast(ServerEvent::joined(&username, online));
        username
    }

    /// Validate one `message` payload and fan it out if it passes.
    ///
    /// Checks run in order and stop at the first failure: payload shape,
    /// sender registration, admission window, then text length. Only the
    /// admission and length failures notify the sender.
    pub fn handle_incoming(
        &mut self,
        connection_id: ConnectionId,
        payload: &Value,
        now: Instant,
    ) -> Outcome {
        let Some(text) = message_text(payload) else {
            return Outcome::Rejected(Rejection::MalformedInput);
        };
        let Some(username) = self.presence.pseudonym(connection_id).cloned() else {
            return Outcome::Rejected(Rejection::UnregisteredSender);
        };
        if !self.admission.try_admit(connection_id, now) {
            return self.reject(connection_id, Rejection::RateLimitExceeded);
        }
        // Length is measured in UTF-16 code units, as browsers count it
        if text.encode_utf16().count() > self.settings.max_text_chars {
            return self.reject(connection_id, Rejection::MessageTooLong);
        }

        let id = self.next_message_id;
        self.next_message_id += 1;
        let message = ChatMessage {
            id,
            username,
            text: text.to_string(),
            timestamp: protocol::format_timestamp(Utc::now()),
        };
        self.presence.broadcast(ServerEvent::Message(message));
        Outcome::Delivered { id }
    }

    /// Tear down everything held for the connection and tell the others.
    /// Unknown connections are released quietly.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Result<Pseudonym, Rejection> {
        let removed = self.presence.unregister(connection_id);
        self.admission.release(connection_id);
        let username = removed.ok_or(Rejection::UnregisteredDisconnect)?;
        let online = self.presence.live_count();
        self.presence.broadcast(ServerEvent::left(&username, online));
        Ok(username)
    }

    fn reject(&self, connection_id: ConnectionId, rejection: Rejection) -> Outcome {
        if let Some(notice) = rejection.user_message(self.settings.max_text_chars) {
            self.presence
                .send_to(connection_id, ServerEvent::Error(notice));
        }
        Outcome::Rejected(rejection)
    }
}

/// Non-empty string `text` of an object payload
fn message_text(payload: &Value) -> Option<&str> {
    payload
        .as_object()?
        .get("text")?
        .as_str()
        .filter(|text| !text.is_empty())
}
