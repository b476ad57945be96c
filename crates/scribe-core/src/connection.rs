//! Connection identities and outbound handles.
//!
//! The registry never owns a socket. It keeps a [`ConnectionHandle`] per
//! member: the connection's identity plus the sending half of a bounded
//! queue that the connection's writer drains. A writer that stops draining
//! loses messages once its queue is full instead of growing it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// An encoded outbound message, shared between all recipients of a broadcast.
pub type Payload = Arc<str>;

/// Receiving half of a connection's outbound queue.
pub type PayloadReceiver = mpsc::Receiver<Payload>;

/// Default number of payloads a connection may have queued but not yet written.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{:x}", timestamp, counter))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Delivery to a single connection failed.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection's writer is gone.
    #[error("Connection closed: {0}")]
    Closed(ConnectionId),

    /// The connection's outbound queue is full; its writer has stalled.
    #[error("Outbound queue full: {0}")]
    Full(ConnectionId),
}

impl SendError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            SendError::Closed(_) => "closed",
            SendError::Full(_) => "full",
        }
    }
}

/// Non-owning reference to a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<Payload>,
}

impl ConnectionHandle {
    /// Wrap the sending half of a connection's outbound queue.
    #[must_use]
    pub fn new(id: ConnectionId, sender: mpsc::Sender<Payload>) -> Self {
        Self { id, sender }
    }

    /// Create a handle with a fresh ID and a queue of the default capacity.
    ///
    /// Returns the handle and the receiver the connection's writer drains.
    #[must_use]
    pub fn channel() -> (Self, PayloadReceiver) {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a handle with a fresh ID and a queue holding at most
    /// `capacity` undelivered payloads.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, PayloadReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(ConnectionId::generate(), sender), receiver)
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue a payload for delivery. Never waits for queue space.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection's writer has gone away or its
    /// queue is full.
    pub fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full(self.id.clone()),
            TrySendError::Closed(_) => SendError::Closed(self.id.clone()),
        })
    }

    /// Check if the connection's writer is still around.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}
