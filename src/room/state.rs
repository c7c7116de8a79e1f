use log::{debug, warn};
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::{ConnectionId, Outbound};

/// A connection as seen from inside a room.
#[derive(Debug, Clone)]
pub struct Member {
    pub participant_id: String,
    outbound: Outbound,
}

impl Member {
    pub fn new(participant_id: String, outbound: Outbound) -> Self {
        Self {
            participant_id,
            outbound,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Outcome of fanning one message out to a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Broadcast {
    pub delivered: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct Room {
    id: String,
    members: HashMap<ConnectionId, Member>,
}

impl Room {
    pub fn new(id: String) -> Self {
        Self {
            id,
            members: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds or replaces the member; returns the previous entry for `id`.
    pub fn add_member(&mut self, id: ConnectionId, member: Member) -> Option<Member> {
        self.members.insert(id, member)
    }

    pub fn remove_member(&mut self, id: ConnectionId) -> Option<Member> {
        self.members.remove(&id)
    }

    pub fn member(&self, id: ConnectionId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn member_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.members.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Enqueues `message` for every open member except `sender`.
    ///
    /// Never waits: a member whose queue is closed or full misses this message and
    /// stays in the room.
    pub fn broadcast(&self, sender: ConnectionId, message: &Message) -> Broadcast {
        let mut outcome = Broadcast::default();

        for (id, member) in self.members.iter().filter(|(id, _)| **id != sender) {
            if !member.is_open() {
                debug!("room {}: skipping {}, channel not open", self.id, id);
                outcome.skipped += 1;
                continue;
            }

            match member.outbound.try_send(message.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("room {}: outbound queue of {} is full, dropping", self.id, id);
                    outcome.skipped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("room {}: {} closed during forward", self.id, id);
                    outcome.skipped += 1;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn member(name: &str, capacity: usize) -> (Member, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Member::new(name.to_string(), tx), rx)
    }

    #[test]
    fn broadcast_skips_sender() {
        let mut room = Room::new("m1".into());
        let (alice, mut alice_rx) = member("alice", 4);
        let (bob, mut bob_rx) = member("bob", 4);
        room.add_member(ConnectionId::from(1), alice);
        room.add_member(ConnectionId::from(2), bob);

        let outcome = room.broadcast(ConnectionId::from(1), &Message::Text("hi".into()));
        assert_eq!(outcome, Broadcast { delivered: 1, skipped: 0 });
        assert_eq!(bob_rx.try_recv().unwrap(), Message::Text("hi".into()));
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn closed_member_is_skipped_not_removed() {
        let mut room = Room::new("m1".into());
        let (bob, bob_rx) = member("bob", 4);
        room.add_member(ConnectionId::from(2), bob);
        drop(bob_rx);

        let outcome = room.broadcast(ConnectionId::from(1), &Message::Text("hi".into()));
        assert_eq!(outcome, Broadcast { delivered: 0, skipped: 1 });
        assert!(room.member(ConnectionId::from(2)).is_some());
    }

    #[test]
    fn full_queue_drops_only_that_forward() {
        let mut room = Room::new("m1".into());
        let (slow, mut slow_rx) = member("slow", 1);
        let (fast, mut fast_rx) = member("fast", 4);
        room.add_member(ConnectionId::from(2), slow);
        room.add_member(ConnectionId::from(3), fast);

        room.broadcast(ConnectionId::from(1), &Message::Text("one".into()));
        let outcome = room.broadcast(ConnectionId::from(1), &Message::Text("two".into()));
        assert_eq!(outcome, Broadcast { delivered: 1, skipped: 1 });

        assert_eq!(slow_rx.try_recv().unwrap(), Message::Text("one".into()));
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(fast_rx.try_recv().unwrap(), Message::Text("one".into()));
        assert_eq!(fast_rx.try_recv().unwrap(), Message::Text("two".into()));
    }

    #[test]
    fn add_and_remove_members() {
        let mut room = Room::new("m1".into());
        let (alice, _rx) = member("alice", 1);
        assert!(room.add_member(ConnectionId::from(1), alice.clone()).is_none());
        assert!(room.add_member(ConnectionId::from(1), alice).is_some());
        assert_eq!(room.len(), 1);

        let removed = room.remove_member(ConnectionId::from(1)).unwrap();
        assert_eq!(removed.participant_id, "alice");
        assert!(room.is_empty());
        assert!(room.remove_member(ConnectionId::from(1)).is_none());
    }
}
