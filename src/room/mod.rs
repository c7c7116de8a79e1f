mod state;

pub use state::{Broadcast, Member, Room};

use std::collections::{HashMap, HashSet};

use crate::connection::ConnectionId;

/// Meeting id -> room, plus the set of live connection ids.
///
/// Not synchronised by itself; the relay keeps it behind one lock so that every
/// mutation below is atomic relative to the others.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    live: HashSet<ConnectionId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws a random id not held by any live connection.
    pub fn allocate_id(&mut self) -> ConnectionId {
        loop {
            let id = ConnectionId::random();
            if self.live.insert(id) {
                return id;
            }
        }
    }

    pub fn release_id(&mut self, id: ConnectionId) -> bool {
        self.live.remove(&id)
    }

    pub fn live_connections(&self) -> usize {
        self.live.len()
    }

    /// Adds `id` to `meeting_id`, creating the room on first join.
    pub fn join(&mut self, meeting_id: &str, id: ConnectionId, member: Member) {
        self.rooms
            .entry(meeting_id.to_string())
            .or_insert_with(|| Room::new(meeting_id.to_string()))
            .add_member(id, member);
    }

    /// Removes `id` from `meeting_id`, deleting the room once it is empty.
    pub fn leave(&mut self, meeting_id: &str, id: ConnectionId) -> Option<Member> {
        let room = self.rooms.get_mut(meeting_id)?;
        let removed = room.remove_member(id);
        if room.is_empty() {
            self.rooms.remove(meeting_id);
        }
        removed
    }

    pub fn get(&self, meeting_id: &str) -> Option<&Room> {
        self.rooms.get(meeting_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
