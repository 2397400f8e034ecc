//! Single-owner event loop for the relay.
//!
//! Socket tasks never touch `BroadcastState`. They push `RelayEvent`s into one
//! unbounded channel and the hub applies them strictly in arrival order.
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BroadcastState, Outcome, PresenceSnapshot};
use crate::connection::{ConnectionId, ConnectionIdGenerator};
use crate::error::{Rejection, Result};
use crate::hub_error;
use crate::presence::Outbox;

#[derive(Debug)]
pub enum RelayEvent {
    Connect {
        connection_id: ConnectionId,
        outbox: Outbox,
    },
    Incoming {
        connection_id: ConnectionId,
        payload: Value,
        received_at: Instant,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<PresenceSnapshot>,
    },
}

pub struct Hub {
    state: BroadcastState,
    events: mpsc::UnboundedReceiver<RelayEvent>,
}

impl Hub {
    pub fn new(state: BroadcastState) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self { state, events: rx };
        let handle = HubHandle {
            events: tx,
            ids: Arc::new(ConnectionIdGenerator::new()),
        };
        (hub, handle)
    }

    /// Start the loop on the tokio runtime. The task ends, handing back its
    /// state, once every `HubHandle` and `Session` is gone.
    pub fn spawn(state: BroadcastState) -> (HubHandle, JoinHandle<BroadcastState>) {
        let (hub, handle) = Self::new(state);
        (handle, tokio::spawn(hub.run()))
    }

    pub async fn run(mut self) -> BroadcastState {
        while let Some(event) = self.events.recv().await {
            self.dispatch(event);
        }
        debug!("All relay handles dropped, hub stopping");
        self.state
    }

    fn dispatch(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connect {
                connection_id,
                outbox,
            } => {
                let username = self.state.connect(connection_id, outbox);
                info!(
                    %connection_id,
                    %username,
                    online = self.state.presence().live_count(),
                    "User connected"
                );
            }
            RelayEvent::Incoming {
                connection_id,
                payload,
                received_at,
            } => match self
                .state
                .handle_incoming(connection_id, &payload, received_at)
            {
                Outcome::Delivered { id } => {
                    debug!(%connection_id, message_id = id, "Message broadcast");
                }
                Outcome::Rejected(rejection) => {
                    debug!(%connection_id, %rejection, "Message rejected");
                }
            },
            RelayEvent::Disconnect { connection_id } => {
                match self.state.disconnect(connection_id) {
                    Ok(username) => info!(
                        %connection_id,
                        %username,
                        online = self.state.presence().live_count(),
                        "User disconnected"
                    ),
                    Err(Rejection::UnregisteredDisconnect) => {
                        debug!(%connection_id, "Disconnect for unregistered connection")
                    }
                    Err(rejection) => warn!(%connection_id, %rejection, "Unexpected disconnect result"),
                }
            }
            RelayEvent::Snapshot { reply } => {
                // The asker may have given up; nothing to do then
                let _ = reply.send(self.state.snapshot());
            }
        }
    }
}

/// Cheap, cloneable entry point into a running hub
#[derive(Clone, Debug)]
pub struct HubHandle {
    events: mpsc::UnboundedSender<RelayEvent>,
    ids: Arc<ConnectionIdGenerator>,
}

impl HubHandle {
    /// Register a new connection whose traffic goes to `outbox`.
    ///
    /// The returned `Session` unregisters the connection when dropped, so
    /// teardown happens exactly once however the socket task ends.
    pub fn open(&self, outbox: Outbox) -> Result<Session> {
        let connection_id = self.ids.next_id();
        self.send(RelayEvent::Connect {
            connection_id,
            outbox,
        })?;
        Ok(Session {
            connection_id,
            events: self.events.clone(),
        })
    }

    pub async fn snapshot(&self) -> Result<PresenceSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayEvent::Snapshot { reply })?;
        rx.await
            .map_err(|_| hub_error!("hub stopped before answering snapshot"))
    }

    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }

    fn send(&self, event: RelayEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| hub_error!("relay event loop is not running"))
    }
}

/// One registered connection. Dropping it disconnects.
#[derive(Debug)]
pub struct Session {
    connection_id: ConnectionId,
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl Session {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queue a client `message` payload for validation by the hub
    pub fn submit(&self, payload: Value) -> Result<()> {
        self.events
            .send(RelayEvent::Incoming {
                connection_id: self.connection_id,
                payload,
                received_at: Instant::now(),
            })
            .map_err(|_| hub_error!("relay event loop is not running"))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let disconnect = RelayEvent::Disconnect {
            connection_id: self.connection_id,
        };
        if self.events.send(disconnect).is_err() {
            debug!(connection_id = %self.connection_id, "Hub already stopped at disconnect");
        }
    }
}
