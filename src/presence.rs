//! Who is online right now.
//!
//! The registry is the only holder of the live connection set: every fan-out
//! walks it, and the online count is always its current size.
use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::connection::ConnectionId;
use crate::identity::{self, Pseudonym};
use crate::protocol::ServerEvent;
use crate::settings::OUTBOX_CAPACITY;

/// Queue drained by a connection's socket writer
pub type Outbox = mpsc::Sender<Arc<ServerEvent>>;
pub type Inbox = mpsc::Receiver<Arc<ServerEvent>>;

pub fn outbox() -> (Outbox, Inbox) {
    outbox_with_capacity(OUTBOX_CAPACITY)
}

/// Events beyond `capacity` that the writer has not drained yet are dropped
pub fn outbox_with_capacity(capacity: usize) -> (Outbox, Inbox) {
    mpsc::channel(capacity)
}

#[derive(Debug)]
pub struct Connection {
    pseudonym: Pseudonym,
    outbox: Outbox,
}

impl Connection {
    pub fn pseudonym(&self) -> &Pseudonym {
        &self.pseudonym
    }

    /// Never waits on a slow reader: a full outbox loses this event.
    /// A closed outbox means the writer is gone; its disconnect is already on the way.
    fn deliver(&self, event: Arc<ServerEvent>) -> bool {
        match self.outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(pseudonym = %self.pseudonym, "Outbox full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Debug)]
pub struct PresenceRegistry {
    connections: HashMap<ConnectionId, Connection>,
    rng: StdRng,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic pseudonyms, for tests
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            connections: HashMap::new(),
            rng,
        }
    }

    /// Register a connection and return its pseudonym.
    /// Registering a live connection again keeps the name it already has.
    pub fn register(&mut self, connection_id: ConnectionId, outbox: Outbox) -> Pseudonym {
        if let Some(existing) = self.connections.get(&connection_id) {
            return existing.pseudonym.clone();
        }
        let pseudonym = identity::allocate(&mut self.rng);
        self.connections.insert(
            connection_id,
            Connection {
                pseudonym: pseudonym.clone(),
                outbox,
            },
        );
        pseudonym
    }

    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<Pseudonym> {
        self.connections
            .remove(&connection_id)
            .map(|connection| connection.pseudonym)
    }

    pub fn live_count(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn pseudonym(&self, connection_id: ConnectionId) -> Option<&Pseudonym> {
        self.connections
            .get(&connection_id)
            .map(Connection::pseudonym)
    }

    /// Deliver to a single connection; false if it is not registered or its writer is gone
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&connection_id) {
            Some(connection) => connection.deliver(Arc::new(event)),
            None => false,
        }
    }

    /// Deliver to every live connection; returns how many accepted it
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0;
        for (connection_id, connection) in &self.connections {
            if connection.deliver(Arc::clone(&event)) {
                delivered += 1;
            } else {
                debug!(%connection_id, "Outbox unavailable, skipping fan-out");
            }
        }
        delivered
    }
}
