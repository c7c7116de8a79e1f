//! Room membership and message routing, independent of the socket layer.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::{Connection, ConnectionId, ConnectionState, Outbound};
use crate::error::AppError;
use crate::metrics::{RelaySnapshot, RelayStats};
use crate::room::{Broadcast, Member, RoomRegistry};
use crate::signaling::SignalingMessage;

/// What the relay did with one inbound frame. Never reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Joined {
        meeting_id: String,
        participant_id: String,
    },
    Relayed(Broadcast),
    Malformed,
    UnknownRoom,
    Closed,
}

/// Shared handle to the room registry. Cheap to clone, one per connection task.
#[derive(Debug, Clone, Default)]
pub struct Relay {
    registry: Arc<Mutex<RoomRegistry>>,
    stats: Arc<RelayStats>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted channel. Nothing is sent to the client.
    pub async fn on_connect(&self, outbound: Outbound) -> Connection {
        let id = self.registry.lock().await.allocate_id();
        self.stats.connection_opened();
        debug!("{} connected", id);
        Connection::new(id, outbound)
    }

    pub async fn on_message(&self, conn: &mut Connection, raw: &str) -> Dispatch {
        if conn.is_closed() {
            return Dispatch::Closed;
        }

        let message = match SignalingMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("{}: dropping frame: {}", conn.id(), AppError::from(e));
                self.stats.malformed();
                return Dispatch::Malformed;
            }
        };

        match message {
            SignalingMessage::Join { meeting_id, from } => self.join(conn, meeting_id, from).await,
            SignalingMessage::Relay {
                meeting_id: Some(meeting_id),
            } => self.forward(conn.id(), &meeting_id, raw).await,
            SignalingMessage::Relay { meeting_id: None } => {
                debug!("{}: message without meetingId dropped", conn.id());
                self.stats.unknown_room();
                Dispatch::UnknownRoom
            }
        }
    }

    /// Binary frames are handled as text when they decode as UTF-8.
    pub async fn on_bytes(&self, conn: &mut Connection, raw: Vec<u8>) -> Dispatch {
        match String::from_utf8(raw) {
            Ok(text) => self.on_message(conn, &text).await,
            Err(e) if !conn.is_closed() => {
                warn!("{}: dropping binary frame: {}", conn.id(), e);
                self.stats.malformed();
                Dispatch::Malformed
            }
            Err(_) => Dispatch::Closed,
        }
    }

    /// Removes the connection from its room, if any. Safe to call more than once.
    pub async fn on_close(&self, conn: &mut Connection) {
        if conn.is_closed() {
            return;
        }

        {
            let mut registry = self.registry.lock().await;
            if let Some(meeting_id) = conn.meeting_id() {
                registry.leave(meeting_id, conn.id());
                if registry.get(meeting_id).is_none() {
                    debug!("room {} is empty, removed", meeting_id);
                }
            }
            registry.release_id(conn.id());
        }

        debug!("{} closed ({})", conn.id(), conn.state());
        conn.set_state(ConnectionState::Closed);
        self.stats.connection_closed();
    }

    async fn join(&self, conn: &mut Connection, meeting_id: String, from: Option<String>) -> Dispatch {
        let participant_id = from.unwrap_or_else(|| conn.id().to_string());
        let member = Member::new(participant_id.clone(), conn.outbound().clone());

        {
            let mut registry = self.registry.lock().await;
            if let Some(previous) = conn.meeting_id().filter(|prev| *prev != meeting_id) {
                registry.leave(previous, conn.id());
                debug!("{} left {}", conn.id(), previous);
            }
            registry.join(&meeting_id, conn.id(), member);
        }

        info!("{} joined {} as {}", conn.id(), meeting_id, participant_id);
        conn.set_state(ConnectionState::Joined {
            meeting_id: meeting_id.clone(),
            participant_id: participant_id.clone(),
        });
        self.stats.joined();

        Dispatch::Joined {
            meeting_id,
            participant_id,
        }
    }

    async fn forward(&self, sender: ConnectionId, meeting_id: &str, raw: &str) -> Dispatch {
        // Held across the fan-out so one sender's messages reach each peer queue in order.
        let registry = self.registry.lock().await;

        let Some(room) = registry.get(meeting_id) else {
            debug!("{}: no room {}, dropped", sender, meeting_id);
            self.stats.unknown_room();
            return Dispatch::UnknownRoom;
        };

        let outcome = room.broadcast(sender, &Message::Text(raw.to_owned()));
        drop(registry);

        self.stats.relayed(outcome.delivered, outcome.skipped);
        Dispatch::Relayed(outcome)
    }

    /// Members of `meeting_id`, or `None` if no such room exists.
    pub async fn room_members(&self, meeting_id: &str) -> Option<Vec<ConnectionId>> {
        self.registry
            .lock()
            .await
            .get(meeting_id)
            .map(|room| room.member_ids())
    }

    pub async fn participant(&self, meeting_id: &str, id: ConnectionId) -> Option<String> {
        self.registry
            .lock()
            .await
            .get(meeting_id)
            .and_then(|room| room.member(id))
            .map(|member| member.participant_id.clone())
    }

    /// Connections accepted and not yet closed.
    pub async fn live_connections(&self) -> usize {
        self.registry.lock().await.live_connections()
    }

    pub async fn room_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub fn stats(&self) -> RelaySnapshot {
        self.stats.snapshot()
    }
}
