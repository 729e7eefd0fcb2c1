//! Connection Registry
//!
//! Maps each room to the live connections joined to it.
//!
//! A connection belongs to at most one room. Rooms are kept in a `DashMap`,
//! so mutations of one room are serialized by its shard lock while other
//! rooms proceed in parallel. Locks are always taken in the order
//! `memberships` then `rooms`, and never both from `broadcast`.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::infrastructure::metrics;

pub type ConnectionId = Uuid;

/// Sending half of one live connection.
///
/// Payloads are queued on an unbounded channel drained by the socket's
/// writer task; a send fails once that task is gone.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Arc<str>>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<Arc<str>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// A handle together with the receiver its payloads arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Arc<str>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: Arc<str>) -> bool {
        self.sender.send(payload).is_ok()
    }
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Connection {connection} already joined room {current}")]
    AlreadyJoinedElsewhere {
        connection: ConnectionId,
        current: String,
    },
}

/// Result of a `join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection was added to the room
    Joined,
    /// The connection was already in this room
    AlreadyJoined,
}

/// Result of one `broadcast`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Connections whose send failed; they were removed from the room
    pub dropped: usize,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: DashMap<String, HashMap<ConnectionId, ConnectionHandle>>,
    memberships: DashMap<ConnectionId, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room.
    ///
    /// Joining the room the connection is already in is a no-op.
    pub fn join(
        &self,
        room: &str,
        connection: ConnectionHandle,
    ) -> Result<JoinOutcome, RegistryError> {
        let outcome = match self.memberships.entry(connection.id()) {
            Entry::Occupied(current) if current.get() == room => JoinOutcome::AlreadyJoined,
            Entry::Occupied(current) => {
                return Err(RegistryError::AlreadyJoinedElsewhere {
                    connection: connection.id(),
                    current: current.get().clone(),
                });
            }
            Entry::Vacant(slot) => {
                let id = connection.id();
                self.rooms
                    .entry(room.to_owned())
                    .or_default()
                    .insert(id, connection);
                slot.insert(room.to_owned());
                debug!(room, connection_id = %id, "Connection joined");
                JoinOutcome::Joined
            }
        };

        metrics::set_websocket_connections(self.connection_count());
        Ok(outcome)
    }

    /// Remove a connection from a room. Absent connections are ignored.
    pub fn leave(&self, room: &str, connection_id: ConnectionId) {
        let removed = self
            .memberships
            .remove_if(&connection_id, |_, current| current == room)
            .is_some();

        if removed {
            if let Some(mut members) = self.rooms.get_mut(room) {
                members.remove(&connection_id);
            }
            debug!(room, connection_id = %connection_id, "Connection left");
        }

        metrics::set_websocket_connections(self.connection_count());
    }

    /// Deliver a payload to every member of a room.
    ///
    /// Members whose send fails are removed; delivery to the rest continues.
    /// Broadcasting to an empty or unknown room delivers nothing.
    pub fn broadcast(&self, room: &str, payload: Arc<str>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut dropped = Vec::new();

        if let Some(mut members) = self.rooms.get_mut(room) {
            members.retain(|id, connection| {
                if connection.send(payload.clone()) {
                    report.delivered += 1;
                    true
                } else {
                    dropped.push(*id);
                    false
                }
            });
        }

        for id in &dropped {
            self.memberships.remove_if(id, |_, current| current == room);
            debug!(room, connection_id = %id, "Dropped unreachable connection");
        }
        report.dropped = dropped.len();

        trace!(room, delivered = report.delivered, dropped = report.dropped, "Broadcast");
        metrics::record_broadcast(report.delivered, report.dropped);
        if report.dropped > 0 {
            metrics::set_websocket_connections(self.connection_count());
        }
        report
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|members| members.len()).unwrap_or(0)
    }

    /// Room the connection is joined to, if any.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.memberships
            .get(&connection_id)
            .map(|room| room.value().clone())
    }

    /// Rooms known to the registry, including empty ones.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.memberships.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(text: &str) -> Arc<str> {
        Arc::from(text)
    }

    #[test]
    fn join_twice_same_room_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = ConnectionHandle::channel();

        assert_eq!(registry.join("a", conn.clone()), Ok(JoinOutcome::Joined));
        assert_eq!(registry.join("a", conn), Ok(JoinOutcome::AlreadyJoined));
        assert_eq!(registry.member_count("a"), 1);
    }

    #[test]
    fn join_second_room_fails() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = ConnectionHandle::channel();
        registry.join("a", conn.clone()).unwrap();

        let err = registry.join("b", conn.clone()).unwrap_err();

        assert_eq!(
            err,
            RegistryError::AlreadyJoinedElsewhere {
                connection: conn.id(),
                current: "a".into(),
            }
        );
        assert_eq!(registry.member_count("b"), 0);
    }

    #[test]
    fn leave_then_join_elsewhere_succeeds() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = ConnectionHandle::channel();
        registry.join("a", conn.clone()).unwrap();

        registry.leave("a", conn.id());

        assert_eq!(registry.join("b", conn.clone()), Ok(JoinOutcome::Joined));
        assert_eq!(registry.room_of(conn.id()), Some("b".into()));
    }

    #[test]
    fn leave_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = ConnectionHandle::channel();
        registry.join("a", conn.clone()).unwrap();

        registry.leave("a", Uuid::new_v4());
        registry.leave("b", conn.id());

        assert_eq!(registry.member_count("a"), 1);
    }

    #[test]
    fn broadcast_reaches_every_member() {
        let registry = ConnectionRegistry::new();
        let (c1, mut rx1) = ConnectionHandle::channel();
        let (c2, mut rx2) = ConnectionHandle::channel();
        let (gone, mut rx_gone) = ConnectionHandle::channel();
        registry.join("x", c1).unwrap();
        registry.join("x", c2).unwrap();
        registry.join("x", gone.clone()).unwrap();
        registry.leave("x", gone.id());

        let report = registry.broadcast("x", payload(r#"{"text":"hi"}"#));

        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
        assert_eq!(rx1.try_recv().unwrap().as_ref(), r#"{"text":"hi"}"#);
        assert_eq!(rx2.try_recv().unwrap().as_ref(), r#"{"text":"hi"}"#);
        assert!(rx_gone.try_recv().is_err());
    }

    #[test]
    fn failed_send_removes_member_and_continues() {
        let registry = ConnectionRegistry::new();
        let (c1, rx1) = ConnectionHandle::channel();
        let (c2, mut rx2) = ConnectionHandle::channel();
        registry.join("x", c1.clone()).unwrap();
        registry.join("x", c2).unwrap();
        drop(rx1);

        let report = registry.broadcast("x", payload("hi"));

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(rx2.try_recv().unwrap().as_ref(), "hi");
        assert_eq!(registry.member_count("x"), 1);
        assert_eq!(registry.room_of(c1.id()), None);
    }

    #[test]
    fn empty_room_is_kept() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = ConnectionHandle::channel();
        registry.join("x", conn.clone()).unwrap();
        registry.leave("x", conn.id());

        let report = registry.broadcast("x", payload("lost"));

        assert_eq!(report, BroadcastReport::default());
        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.member_count("x"), 0);
    }
}
