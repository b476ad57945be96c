//! # scribe-protocol
//!
//! Wire protocol definitions for the Scribe collaborative editing relay.
//!
//! Editors talk to the relay over a WebSocket with JSON objects, each one
//! discriminated by a `type` field.
//!
//! ## Message Types
//!
//! - `init` / `users` - Initial sync and roster updates (server to client)
//! - `edit` - Full-buffer replacement (both directions)
//! - `typing` - Typing indicator (both directions)
//!
//! ## Example
//!
//! ```rust
//! use scribe_protocol::{codec, ClientMessage, ServerMessage};
//!
//! let text = codec::encode(&ServerMessage::typing("Red Panda")).unwrap();
//! assert_eq!(text, r#"{"type":"typing","from":"Red Panda"}"#);
//!
//! let msg = codec::decode(r#"{"type":"edit","text":"hello"}"#).unwrap();
//! assert_eq!(msg, ClientMessage::edit("hello"));
//! ```

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, ProtocolError};
pub use messages::{ClientMessage, ServerMessage};
