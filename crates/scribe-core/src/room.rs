//! Room state for Scribe.
//!
//! A room is one shared text buffer plus the roster of connections editing it.

use crate::connection::{ConnectionHandle, ConnectionId};
use tracing::debug;

/// Default maximum room key length.
pub const DEFAULT_MAX_ROOM_KEY_LENGTH: usize = 256;

/// A room identifier, supplied by the connecting client.
pub type RoomKey = String;

/// Validate a room key.
///
/// # Errors
///
/// Returns an error message if the room key is invalid.
pub fn validate_room_key(key: &str, max_length: usize) -> Result<(), &'static str> {
    if key.is_empty() {
        return Err("Room key cannot be empty");
    }
    if key.len() > max_length {
        return Err("Room key too long");
    }
    if key.chars().any(char::is_control) {
        return Err("Room key contains control characters");
    }
    Ok(())
}

/// A member of a room.
#[derive(Debug, Clone)]
pub struct Member {
    /// Handle used to reach the member.
    pub handle: ConnectionHandle,
    /// Display name assigned on join.
    pub name: String,
}

/// A collaborative room.
#[derive(Debug)]
pub struct Room {
    /// Room key.
    key: RoomKey,
    /// Full buffer content.
    content: String,
    /// Members in join order.
    members: Vec<Member>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(key: impl Into<RoomKey>) -> Self {
        Self {
            key: key.into(),
            content: String::new(),
            members: Vec::new(),
        }
    }

    /// Get the room key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the current buffer content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the buffer content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Get the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn is_member(&self, connection_id: &ConnectionId) -> bool {
        self.members.iter().any(|m| m.handle.id() == connection_id)
    }

    /// Get the display name of a member.
    #[must_use]
    pub fn member_name(&self, connection_id: &ConnectionId) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.handle.id() == connection_id)
            .map(|m| m.name.as_str())
    }

    /// Add a member under the given display name.
    pub fn add_member(&mut self, handle: ConnectionHandle, name: impl Into<String>) {
        let name = name.into();
        debug!(room = %self.key, connection = %handle.id(), name = %name, "Member added");
        self.members.push(Member { handle, name });
    }

    /// Remove a member.
    ///
    /// Returns the removed member, if it was present.
    pub fn remove_member(&mut self, connection_id: &ConnectionId) -> Option<Member> {
        let index = self
            .members
            .iter()
            .position(|m| m.handle.id() == connection_id)?;
        let member = self.members.remove(index);
        debug!(room = %self.key, connection = %connection_id, name = %member.name, "Member removed");
        Some(member)
    }

    /// Display names of all members, in join order.
    #[must_use]
    pub fn member_names(&self) -> Vec<String> {
        self.names().map(str::to_string).collect()
    }

    /// Iterate over member display names, in join order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// Iterate over member handles, optionally leaving one connection out.
    pub fn recipients<'a>(
        &'a self,
        exclude: Option<&'a ConnectionId>,
    ) -> impl Iterator<Item = &'a ConnectionHandle> + 'a {
        self.members
            .iter()
            .map(|m| &m.handle)
            .filter(move |h| Some(h.id()) != exclude)
    }

    /// Check if the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
