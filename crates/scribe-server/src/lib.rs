//! # scribe-server
//!
//! HTTP and WebSocket front end of the Scribe collaborative editing relay.
//!
//! Editors connect to `/ws/{room}`; `/` and `/health` answer liveness
//! probes. The binary in `main.rs` wires configuration, tracing and metrics
//! around [`handlers::run_server`].

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use handlers::{build_router, run_server, serve, AppState};
