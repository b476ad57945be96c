//! # scribe-core
//!
//! Room coordination for the Scribe collaborative editing relay.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Registry** - Process-wide map of rooms, created lazily, deleted when empty
//! - **Room** - One shared text buffer and the roster of its members
//! - **Session** - Per-connection join / relay / leave state machine
//! - **Broadcast** - Isolated fan-out of encoded messages
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Session   │────▶│  Registry   │────▶│    Room     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   │
//!        │                   ▼
//!        │            ┌─────────────┐
//!        └────────────│  Broadcast  │
//!      outbound queue └─────────────┘
//! ```

pub mod broadcast;
pub mod connection;
pub mod names;
pub mod registry;
pub mod room;
pub mod session;

pub use connection::{
    ConnectionHandle, ConnectionId, Payload, PayloadReceiver, SendError, DEFAULT_QUEUE_CAPACITY,
};
pub use registry::{
    JoinOutcome, LeaveOutcome, Registry, RegistryConfig, RegistryError, RegistryStats,
};
pub use room::{Room, RoomKey};
pub use session::{Session, SessionState};
