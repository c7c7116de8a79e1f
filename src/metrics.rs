use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the relay counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub joins: u64,
    pub relayed: u64,     // messages that found a room
    pub deliveries: u64,  // per-peer enqueues
    pub skipped: u64,     // per-peer forwards not enqueued
    pub malformed: u64,
    pub unknown_room: u64,
}

impl RelaySnapshot {
    pub fn open_connections(&self) -> u64 {
        self.connections_opened.saturating_sub(self.connections_closed)
    }
}

#[derive(Debug, Default)]
pub struct RelayStats {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    joins: AtomicU64,
    relayed: AtomicU64,
    deliveries: AtomicU64,
    skipped: AtomicU64,
    malformed: AtomicU64,
    unknown_room: AtomicU64,
}

impl RelayStats {
    pub(crate) fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn joined(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn relayed(&self, delivered: usize, skipped: usize) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.skipped.fetch_add(skipped as u64, Ordering::Relaxed);
    }

    pub(crate) fn malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unknown_room(&self) {
        self.unknown_room.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unknown_room: self.unknown_room.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = RelayStats::default();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        stats.relayed(3, 1);
        stats.malformed();

        let snap = stats.snapshot();
        assert_eq!(snap.open_connections(), 1);
        assert_eq!(snap.relayed, 1);
        assert_eq!(snap.deliveries, 3);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.malformed, 1);
        assert_eq!(snap.unknown_room, 0);
    }

    #[test]
    fn snapshot_serializes_as_flat_object() {
        let json = serde_json::to_value(RelaySnapshot::default()).unwrap();
        assert_eq!(json["joins"], 0);
        assert_eq!(json.as_object().map(|o| o.len()), Some(8));
    }
}
