//! Broadcast hub: room-per-group pub/sub
//!
//! Transport agnostic. A connection is a bounded `mpsc` queue; the WebSocket
//! layer drains it into a socket, tests drain it directly. Fan-out is
//! best-effort: a full queue drops the message for that connection only, a
//! closed queue unregisters the connection.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::{GroupId, HubMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Connection {
    tx: mpsc::Sender<HubMessage>,
    groups: HashSet<GroupId>,
}

pub struct BroadcastHub {
    buffer: usize,
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<GroupId, HashSet<ConnectionId>>,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Register a new connection; it starts without any room
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<HubMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.connections.insert(
            id,
            Connection {
                tx,
                groups: HashSet::new(),
            },
        );
        debug!(connection = %id, "hub connection registered");
        (id, rx)
    }

    /// Join a group's room. Returns false for an unknown connection.
    pub fn subscribe(&self, connection: ConnectionId, group_id: &GroupId) -> bool {
        let Some(mut conn) = self.connections.get_mut(&connection) else {
            return false;
        };
        conn.groups.insert(group_id.clone());
        drop(conn);

        self.rooms
            .entry(group_id.clone())
            .or_default()
            .insert(connection);

        // Disconnected between the two inserts
        if !self.connections.contains_key(&connection) {
            self.remove_from_room(connection, group_id);
            return false;
        }
        info!(connection = %connection, group = %group_id, "joined group room");
        true
    }

    /// Leave a single room
    pub fn leave(&self, connection: ConnectionId, group_id: &GroupId) {
        if let Some(mut conn) = self.connections.get_mut(&connection) {
            conn.groups.remove(group_id);
        }
        self.remove_from_room(connection, group_id);
    }

    /// Drop the connection from every room (disconnect)
    pub fn unsubscribe(&self, connection: ConnectionId) {
        let Some((_, conn)) = self.connections.remove(&connection) else {
            return;
        };
        for group_id in &conn.groups {
            self.remove_from_room(connection, group_id);
        }
        debug!(connection = %connection, rooms = conn.groups.len(), "hub connection removed");
    }

    fn remove_from_room(&self, connection: ConnectionId, group_id: &GroupId) {
        let now_empty = match self.rooms.get_mut(group_id) {
            Some(mut room) => {
                room.remove(&connection);
                room.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove_if(group_id, |_, room| room.is_empty());
        }
    }

    /// Fan a message out to the group's current subscribers.
    /// Returns how many connections accepted it.
    pub fn publish(&self, message: HubMessage) -> usize {
        let group_id = message.group_id.clone();
        let targets: Vec<ConnectionId> = match self.rooms.get(&group_id) {
            Some(room) => room.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        let mut stale = Vec::new();
        for target in targets {
            let Some(conn) = self.connections.get(&target) else {
                stale.push(target);
                continue;
            };
            match conn.tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(connection = %target, group = %group_id, "subscriber queue full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(target),
            }
        }

        for connection in closed {
            self.unsubscribe(connection);
        }
        for connection in stale {
            self.remove_from_room(connection, &group_id);
        }

        debug!(
            group = %group_id,
            event = %message.event.event_type(),
            seq = message.seq,
            delivered,
            "published"
        );
        delivered
    }

    /// Drop every connection; receivers see their channel close
    pub fn close_all(&self) -> usize {
        let closed = self.connections.len();
        self.connections.clear();
        self.rooms.clear();
        info!(closed, "hub connections closed");
        closed
    }

    pub fn subscriber_count(&self, group_id: &GroupId) -> usize {
        self.rooms.get(group_id).map(|r| r.len()).unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
