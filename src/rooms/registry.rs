//! In-memory registry of live connections, keyed by room id.
//!
//! The single source of truth for "who is here right now" — distinct
//! from the durable participant rows in the transcript store. Each
//! connection handler registers itself after a successful join and
//! deregisters on leave or disconnect. The registry also hands out the
//! two per-room locks (publish, turn); keeping them on the room entry
//! means cross-room operations never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::Message;

/// Inbound frames a client may send on its socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    Join {
        room_id: Uuid,
        user_id: Uuid,
        username: String,
    },
    Chat {
        content: String,
    },
    Leave,
}

/// Outbound frames fanned out to room members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    Chat {
        content: String,
        user_id: Uuid,
        username: String,
        is_assistant: bool,
        timestamp: String,
    },
    Error {
        message: String,
    },
}

impl WsOutgoing {
    pub fn from_message(msg: &Message) -> Self {
        WsOutgoing::Chat {
            content: msg.content.clone(),
            user_id: msg.author_id,
            username: msg.username.clone(),
            is_assistant: msg.is_assistant,
            timestamp: msg.timestamp.and_utc().to_rfc3339(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        WsOutgoing::Error {
            message: message.into(),
        }
    }
}

struct RoomEntry {
    connections: HashMap<Uuid, mpsc::Sender<WsOutgoing>>,
    publish_lock: Arc<tokio::sync::Mutex<()>>,
    turn_lock: Arc<tokio::sync::Mutex<()>>,
}

impl RoomEntry {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            publish_lock: Arc::new(tokio::sync::Mutex::new(())),
            turn_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Registry of live connections and per-room locks.
///
/// The map lock is a plain `std::sync::Mutex` and is never held across
/// an await point; the per-room locks are `tokio::sync::Mutex` and are
/// held across awaits deliberately (that is their job).
pub struct RoomRegistry {
    rooms: Mutex<HashMap<Uuid, RoomEntry>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection's outbound channel under a room.
    pub fn register(&self, room_id: &Uuid, conn_id: Uuid, sender: mpsc::Sender<WsOutgoing>) {
        let mut rooms = self.guard();
        rooms
            .entry(*room_id)
            .or_insert_with(RoomEntry::new)
            .connections
            .insert(conn_id, sender);
    }

    /// Remove one connection. The room entry (and its locks) stays until
    /// the room ends, so an in-flight turn keeps its lock identity.
    pub fn deregister(&self, room_id: &Uuid, conn_id: &Uuid) {
        let mut rooms = self.guard();
        if let Some(entry) = rooms.get_mut(room_id) {
            entry.connections.remove(conn_id);
        }
    }

    /// Drop the whole room entry. Called when a room ends.
    pub fn remove_room(&self, room_id: &Uuid) {
        self.guard().remove(room_id);
    }

    pub fn connection_count(&self, room_id: &Uuid) -> usize {
        self.guard()
            .get(room_id)
            .map(|e| e.connections.len())
            .unwrap_or(0)
    }

    /// Per-room lock serializing persist-then-broadcast.
    pub fn publish_lock(&self, room_id: &Uuid) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            &self
                .guard()
                .entry(*room_id)
                .or_insert_with(RoomEntry::new)
                .publish_lock,
        )
    }

    /// Per-room lock serializing assistant turns.
    pub fn turn_lock(&self, room_id: &Uuid) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            &self
                .guard()
                .entry(*room_id)
                .or_insert_with(RoomEntry::new)
                .turn_lock,
        )
    }

    /// Fan a frame out to every live connection in a room.
    ///
    /// A connection whose channel is closed (disconnected mid-broadcast)
    /// or saturated (consumer stopped draining) is dropped from the room
    /// without failing the broadcast for the others. Returns the number
    /// of connections the frame was delivered to.
    pub fn broadcast(&self, room_id: &Uuid, frame: &WsOutgoing) -> usize {
        let mut rooms = self.guard();
        let Some(entry) = rooms.get_mut(room_id) else {
            return 0;
        };

        let mut stale = Vec::new();
        let mut delivered = 0;
        for (conn_id, sender) in &entry.connections {
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push(*conn_id),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(%conn_id, "Dropping connection with saturated outbound queue");
                    stale.push(*conn_id);
                }
            }
        }
        for conn_id in stale {
            entry.connections.remove(&conn_id);
        }
        delivered
    }

    /// Send a frame to one specific connection in a room. Returns
    /// whether the frame was accepted.
    pub fn send_to(&self, room_id: &Uuid, conn_id: &Uuid, frame: WsOutgoing) -> bool {
        let rooms = self.guard();
        rooms
            .get(room_id)
            .and_then(|e| e.connections.get(conn_id))
            .map(|sender| sender.try_send(frame).is_ok())
            .unwrap_or(false)
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, RoomEntry>> {
        // A poisoned lock only means a panic mid-update; the map itself
        // stays usable.
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
