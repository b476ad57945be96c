//! Per-connection session state machine.
//!
//! A [`Session`] is bound to one room for its whole life. It joins on
//! [`Session::open`], turns inbound client messages into registry updates and
//! fan-out, and leaves on [`Session::close`] or when dropped. The socket side
//! is left to the caller: it drains the connection's outbound queue and feeds
//! decoded messages into [`Session::dispatch`].

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::registry::{LeaveOutcome, Registry, RegistryError};
use crate::room::RoomKey;
use scribe_protocol::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tracing::{debug, trace};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Member of its room, relaying messages.
    Joined,
    /// Left its room. Further messages are ignored.
    Closed,
}

/// Server-side state for one live connection in one room.
pub struct Session {
    registry: Arc<Registry>,
    room: RoomKey,
    handle: ConnectionHandle,
    name: String,
    state: SessionState,
}

impl Session {
    /// Join a room.
    ///
    /// Queues the `init` message for this connection and a `users` update
    /// for every member, this connection included.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry refuses the join.
    pub fn open(
        registry: Arc<Registry>,
        room: impl Into<RoomKey>,
        handle: ConnectionHandle,
    ) -> Result<Self, RegistryError> {
        let room = room.into();
        let outcome = registry.enter(&room, handle.clone())?;

        debug!(
            room = %room,
            connection = %handle.id(),
            name = %outcome.name,
            "Session joined"
        );

        Ok(Self {
            registry,
            room,
            handle,
            name: outcome.name,
            state: SessionState::Joined,
        })
    }

    /// Display name assigned to this session.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key of the room this session is bound to.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Connection ID of this session.
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        self.handle.id()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one inbound message.
    ///
    /// Returns the number of other members a message was queued for.
    pub fn dispatch(&self, message: ClientMessage) -> usize {
        if self.state == SessionState::Closed {
            return 0;
        }

        match message {
            ClientMessage::Edit { text } => self
                .registry
                .publish_edit(
                    &self.room,
                    self.handle.id(),
                    &self.name,
                    text.unwrap_or_default(),
                )
                .unwrap_or(0),
            ClientMessage::Typing => self.registry.broadcast(
                &self.room,
                &ServerMessage::typing(self.name.as_str()),
                Some(self.handle.id()),
            ),
            ClientMessage::Unknown => {
                trace!(connection = %self.handle.id(), "Ignoring unknown message type");
                0
            }
        }
    }

    /// Leave the room.
    ///
    /// Remaining members are sent the updated roster.
    pub fn close(mut self) -> LeaveOutcome {
        self.shutdown()
    }

    fn shutdown(&mut self) -> LeaveOutcome {
        if self.state == SessionState::Closed {
            return LeaveOutcome::default();
        }
        self.state = SessionState::Closed;

        let outcome = self.registry.exit(&self.room, self.handle.id());
        debug!(
            room = %self.room,
            connection = %self.handle.id(),
            room_exists = outcome.room_exists,
            "Session closed"
        );
        outcome
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PayloadReceiver;

    fn recv(rx: &mut PayloadReceiver) -> ServerMessage {
        let payload = rx.try_recv().expect("expected a queued message");
        serde_json::from_str(&payload).unwrap()
    }

    fn drain(rx: &mut PayloadReceiver) {
        while rx.try_recv().is_ok() {}
    }

    fn open(registry: &Arc<Registry>, room: &str) -> (Session, PayloadReceiver) {
        let (handle, rx) = ConnectionHandle::channel();
        let session = Session::open(registry.clone(), room, handle).unwrap();
        (session, rx)
    }

    #[test]
    fn test_edit_reaches_others_only() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = open(&registry, "r1");
        let (_b, mut rx_b) = open(&registry, "r1");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let delivered = a.dispatch(ClientMessage::edit("hello"));
        assert_eq!(delivered, 1);
        assert_eq!(recv(&mut rx_b), ServerMessage::edit("hello", a.name()));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(registry.room_content("r1").as_deref(), Some("hello"));
    }

    #[test]
    fn test_edit_without_text_clears_buffer() {
        let registry = Arc::new(Registry::new());
        let (a, _rx_a) = open(&registry, "r1");

        a.dispatch(ClientMessage::edit("draft"));
        a.dispatch(ClientMessage::Edit { text: None });
        assert_eq!(registry.room_content("r1").as_deref(), Some(""));
    }

    #[test]
    fn test_typing_reaches_others_only() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = open(&registry, "r1");
        let (_b, mut rx_b) = open(&registry, "r1");
        drain(&mut rx_a);
        drain(&mut rx_b);

        a.dispatch(ClientMessage::Typing);
        assert_eq!(recv(&mut rx_b), ServerMessage::typing(a.name()));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(registry.room_content("r1").as_deref(), Some(""));
    }

    #[test]
    fn test_unknown_message_ignored() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = open(&registry, "r1");
        let (_b, mut rx_b) = open(&registry, "r1");
        drain(&mut rx_a);
        drain(&mut rx_b);

        assert_eq!(a.dispatch(ClientMessage::Unknown), 0);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
        assert_eq!(a.state(), SessionState::Joined);
    }

    #[test]
    fn test_join_sequence() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = open(&registry, "r2");

        match recv(&mut rx_a) {
            ServerMessage::Init { users, your_name, .. } => {
                assert_eq!(users, vec![a.name().to_string()]);
                assert_eq!(your_name, a.name());
            }
            other => panic!("Expected init, got {:?}", other),
        }
        drain(&mut rx_a);

        let (b, mut rx_b) = open(&registry, "r2");
        let both = vec![a.name().to_string(), b.name().to_string()];

        assert_eq!(recv(&mut rx_a), ServerMessage::users(both.clone()));
        match recv(&mut rx_b) {
            ServerMessage::Init { users, .. } => assert_eq!(users, both),
            other => panic!("Expected init, got {:?}", other),
        }
    }

    #[test]
    fn test_late_joiner_receives_content() {
        let registry = Arc::new(Registry::new());
        let (a, _rx_a) = open(&registry, "r1");
        a.dispatch(ClientMessage::edit("shared text"));

        let (_b, mut rx_b) = open(&registry, "r1");
        match recv(&mut rx_b) {
            ServerMessage::Init { code, .. } => assert_eq!(code, "shared text"),
            other => panic!("Expected init, got {:?}", other),
        }
    }

    #[test]
    fn test_disconnect_updates_remaining() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = open(&registry, "r1");
        let (b, mut rx_b) = open(&registry, "r1");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let outcome = a.close();
        assert!(outcome.room_exists);
        assert_eq!(recv(&mut rx_b), ServerMessage::users(vec![b.name().to_string()]));
        assert!(registry.room_exists("r1"));
    }

    #[test]
    fn test_last_member_tears_down_room() {
        let registry = Arc::new(Registry::new());
        let (a, _rx_a) = open(&registry, "r1");
        a.dispatch(ClientMessage::edit("scratch"));

        let outcome = a.close();
        assert!(!outcome.room_exists);
        assert!(!registry.room_exists("r1"));

        let (_b, mut rx_b) = open(&registry, "r1");
        match recv(&mut rx_b) {
            ServerMessage::Init { code, users, .. } => {
                assert_eq!(code, "");
                assert_eq!(users.len(), 1);
            }
            other => panic!("Expected init, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_leaves_room() {
        let registry = Arc::new(Registry::new());
        let (a, _rx_a) = open(&registry, "r1");
        let id = a.connection_id().clone();

        drop(a);
        assert!(!registry.room_exists("r1"));
        assert!(registry.room_of(&id).is_none());
    }

    #[test]
    fn test_dead_member_does_not_block_others() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = open(&registry, "r1");
        let (_b, rx_b) = open(&registry, "r1");
        let (_c, mut rx_c) = open(&registry, "r1");
        drain(&mut rx_a);
        drain(&mut rx_c);
        drop(rx_b);

        assert_eq!(a.dispatch(ClientMessage::edit("still here")), 1);
        assert_eq!(recv(&mut rx_c), ServerMessage::edit("still here", a.name()));
    }
}
