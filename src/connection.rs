use std::fmt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Queue feeding a connection's socket writer.
pub type Outbound = mpsc::Sender<Message>;

/// Server-generated, opaque connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{:016x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Lobby,
    Joined {
        meeting_id: String,
        participant_id: String,
    },
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Lobby => write!(f, "Lobby"),
            ConnectionState::Joined { meeting_id, .. } => write!(f, "Joined({})", meeting_id),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// One accepted client channel.
///
/// Owned by the task serving the socket; the room registry only holds a clone of
/// its outbound queue.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    outbound: Outbound,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, outbound: Outbound) -> Self {
        Self {
            id,
            state: ConnectionState::Lobby,
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn meeting_id(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Joined { meeting_id, .. } => Some(meeting_id),
            _ => None,
        }
    }

    pub fn participant_id(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Joined { participant_id, .. } => Some(participant_id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    pub(crate) fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }
}
