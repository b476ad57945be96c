//! Room registry for Scribe.
//!
//! The registry maps room keys to rooms. Rooms are created on the first join
//! and deleted the moment their last member leaves.
//!
//! Each room sits behind its map entry's lock. Every read-modify-write on a
//! room, including the fan-out that must be ordered with it, runs while that
//! lock is held. Fan-out only queues payloads; the actual socket writes
//! happen in each connection's writer task with no registry lock held.

use crate::broadcast;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::names::pick_name;
use crate::room::{validate_room_key, Room, RoomKey, DEFAULT_MAX_ROOM_KEY_LENGTH};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use scribe_protocol::ServerMessage;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid room key.
    #[error("Invalid room key: {0}")]
    InvalidRoomKey(&'static str),

    /// Maximum number of rooms reached.
    #[error("Maximum number of rooms reached ({0})")]
    RoomLimitReached(usize),

    /// The connection is already a member of a room.
    #[error("Connection {0} already joined room {1}")]
    AlreadyJoined(ConnectionId, RoomKey),
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of live rooms.
    pub max_rooms: usize,
    /// Maximum room key length in bytes.
    pub max_room_key_length: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_rooms: 10_000,
            max_room_key_length: DEFAULT_MAX_ROOM_KEY_LENGTH,
        }
    }
}

/// Result of joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Display name assigned to the joining connection.
    pub name: String,
    /// Buffer content at join time.
    pub content: String,
    /// Member names after the join, the joiner included.
    pub users: Vec<String>,
}

/// Result of leaving a room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Whether the room still exists.
    pub room_exists: bool,
    /// Remaining member names, empty if the room is gone.
    pub users: Vec<String>,
}

/// The process-wide room registry.
pub struct Registry {
    /// Rooms indexed by key.
    rooms: DashMap<RoomKey, Room>,
    /// Room each connection is in.
    connections: DashMap<ConnectionId, RoomKey>,
    /// Configuration.
    config: RegistryConfig,
}

impl Registry {
    /// Create a new registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        info!("Creating registry with config: {:?}", config);
        Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
            config,
        }
    }

    /// Get the registry configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            connection_count: self.connections.len(),
        }
    }

    /// Add a connection to a room, creating the room if needed.
    ///
    /// The display name is picked while the room is locked, so concurrent
    /// joiners never race on a name.
    ///
    /// # Errors
    ///
    /// Returns an error if the room key is invalid, the room limit is
    /// reached, or the connection is already in a room.
    pub fn join(
        &self,
        room_key: &str,
        handle: ConnectionHandle,
    ) -> Result<JoinOutcome, RegistryError> {
        self.join_with(room_key, handle, |_, _| {})
    }

    /// Join a room and announce it.
    ///
    /// Within the same critical section as the join, queues the `init`
    /// message for the joiner and a `users` update for every member.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::join`].
    pub fn enter(
        &self,
        room_key: &str,
        handle: ConnectionHandle,
    ) -> Result<JoinOutcome, RegistryError> {
        let joiner = handle.clone();
        self.join_with(room_key, handle, move |room, outcome| {
            let init = ServerMessage::init(
                outcome.content.clone(),
                outcome.users.clone(),
                outcome.name.clone(),
            );
            broadcast::send_to(&joiner, &init);

            if let Some(payload) = broadcast::encode(&ServerMessage::users(outcome.users.clone())) {
                broadcast::deliver(room.recipients(None), &payload);
            }
        })
    }

    fn join_with<F>(
        &self,
        room_key: &str,
        handle: ConnectionHandle,
        announce: F,
    ) -> Result<JoinOutcome, RegistryError>
    where
        F: FnOnce(&Room, &JoinOutcome),
    {
        validate_room_key(room_key, self.config.max_room_key_length)
            .map_err(RegistryError::InvalidRoomKey)?;

        let connection_id = handle.id().clone();
        match self.connections.entry(connection_id.clone()) {
            Entry::Occupied(entry) => {
                return Err(RegistryError::AlreadyJoined(
                    connection_id,
                    entry.get().clone(),
                ));
            }
            Entry::Vacant(entry) => {
                entry.insert(room_key.to_string());
            }
        }

        // Soft limit: concurrent creators may overshoot by a few rooms.
        if !self.rooms.contains_key(room_key) && self.rooms.len() >= self.config.max_rooms {
            self.connections.remove(&connection_id);
            warn!(room = %room_key, max_rooms = self.config.max_rooms, "Room limit reached");
            return Err(RegistryError::RoomLimitReached(self.config.max_rooms));
        }

        let mut room = self.rooms.entry(room_key.to_string()).or_insert_with(|| {
            debug!(room = %room_key, "Creating new room");
            Room::new(room_key)
        });

        let name = {
            let in_use: Vec<&str> = room.names().collect();
            pick_name(&in_use, &mut rand::rng())
        };
        room.add_member(handle, name.clone());

        let outcome = JoinOutcome {
            name,
            content: room.content().to_string(),
            users: room.member_names(),
        };
        announce(&room, &outcome);

        debug!(
            room = %room_key,
            connection = %connection_id,
            name = %outcome.name,
            members = room.member_count(),
            "Joined"
        );

        Ok(outcome)
    }

    /// Remove a connection from a room.
    ///
    /// Idempotent. Deletes the room if it ends up empty.
    pub fn leave(&self, room_key: &str, connection_id: &ConnectionId) -> LeaveOutcome {
        self.leave_with(room_key, connection_id, |_| {})
    }

    /// Leave a room and announce it.
    ///
    /// If the room survives, queues a `users` update for the remaining
    /// members within the same critical section as the removal.
    pub fn exit(&self, room_key: &str, connection_id: &ConnectionId) -> LeaveOutcome {
        self.leave_with(room_key, connection_id, |room| {
            if let Some(payload) = broadcast::encode(&ServerMessage::users(room.member_names())) {
                broadcast::deliver(room.recipients(None), &payload);
            }
        })
    }

    fn leave_with<F>(&self, room_key: &str, connection_id: &ConnectionId, announce: F) -> LeaveOutcome
    where
        F: FnOnce(&Room),
    {
        self.connections
            .remove_if(connection_id, |_, key| key.as_str() == room_key);

        let mut remaining = None;
        let removed = self.rooms.remove_if_mut(room_key, |_, room| {
            let was_member = room.remove_member(connection_id).is_some();
            if room.is_empty() {
                return true;
            }
            if was_member {
                announce(room);
            }
            remaining = Some(room.member_names());
            false
        });

        if removed.is_some() {
            debug!(room = %room_key, connection = %connection_id, "Deleted empty room");
            return LeaveOutcome::default();
        }

        match remaining {
            Some(users) => {
                debug!(room = %room_key, connection = %connection_id, members = users.len(), "Left");
                LeaveOutcome {
                    room_exists: true,
                    users,
                }
            }
            None => LeaveOutcome::default(),
        }
    }

    /// Replace a room's buffer content. Last writer wins.
    ///
    /// Returns `false` if the room no longer exists.
    pub fn apply_edit(&self, room_key: &str, content: impl Into<String>) -> bool {
        match self.rooms.get_mut(room_key) {
            Some(mut room) => {
                room.set_content(content);
                true
            }
            None => false,
        }
    }

    /// Replace a room's buffer and relay the edit to every other member.
    ///
    /// Returns the number of members the edit was queued for, or `None` if
    /// the room no longer exists.
    pub fn publish_edit(
        &self,
        room_key: &str,
        sender: &ConnectionId,
        sender_name: &str,
        content: String,
    ) -> Option<usize> {
        let payload = broadcast::encode(&ServerMessage::edit(content.as_str(), sender_name));

        let mut room = self.rooms.get_mut(room_key)?;
        room.set_content(content);

        let delivered = payload
            .map(|payload| broadcast::deliver(room.recipients(Some(sender)), &payload))
            .unwrap_or(0);
        Some(delivered)
    }

    /// Send a message to every member of a room except `exclude`.
    ///
    /// Returns the number of members the message was queued for.
    pub fn broadcast(
        &self,
        room_key: &str,
        message: &ServerMessage,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let Some(payload) = broadcast::encode(message) else {
            return 0;
        };

        self.rooms
            .get(room_key)
            .map(|room| broadcast::deliver(room.recipients(exclude), &payload))
            .unwrap_or(0)
    }

    /// Member display names of a room, empty if the room does not exist.
    #[must_use]
    pub fn snapshot_members(&self, room_key: &str) -> Vec<String> {
        self.rooms
            .get(room_key)
            .map(|room| room.member_names())
            .unwrap_or_default()
    }

    /// Check if a room exists.
    #[must_use]
    pub fn room_exists(&self, room_key: &str) -> bool {
        self.rooms.contains_key(room_key)
    }

    /// Get a room's buffer content.
    #[must_use]
    pub fn room_content(&self, room_key: &str) -> Option<String> {
        self.rooms.get(room_key).map(|room| room.content().to_string())
    }

    /// Get the member count of a room.
    #[must_use]
    pub fn member_count(&self, room_key: &str) -> usize {
        self.rooms
            .get(room_key)
            .map(|room| room.member_count())
            .unwrap_or(0)
    }

    /// Get the room a connection is in.
    #[must_use]
    pub fn room_of(&self, connection_id: &ConnectionId) -> Option<RoomKey> {
        self.connections
            .get(connection_id)
            .map(|key| key.value().clone())
    }

    /// Get all room keys.
    #[must_use]
    pub fn room_keys(&self) -> Vec<RoomKey> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Number of live rooms.
    pub room_count: usize,
    /// Number of joined connections.
    pub connection_count: usize,
}
