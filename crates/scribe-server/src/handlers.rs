//! Connection handlers for Scribe server.
//!
//! This module handles the connection lifecycle and message processing.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use scribe_core::room::validate_room_key;
use scribe_core::{ConnectionHandle, Registry, Session};
use scribe_protocol::{codec, ClientMessage, ProtocolError};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

/// Shared server state.
pub struct AppState {
    /// The room registry.
    pub registry: Arc<Registry>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            registry: Arc::new(Registry::with_config(config.registry_config())),
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Scribe server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr,
        config.websocket_route()
    );

    serve(listener, state).await
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.websocket_route(), get(ws_handler))
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serve connections accepted on `listener` until the server fails.
///
/// # Errors
///
/// Returns an error if the server stops with an I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, build_router(state))
        .await
        .context("Server error")?;
    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Scribe relay running",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    Path(room): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(reason) = validate_room_key(&room, state.config.limits.max_room_key_length) {
        warn!(room = %room, reason, "Rejecting connection");
        metrics::record_error("room_key");
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }

    let max_message_size = state.config.limits.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, room, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, room: String, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (handle, mut outbound) =
        ConnectionHandle::with_capacity(state.config.limits.outbound_queue_capacity);
    let connection_id = handle.id().clone();

    debug!(connection = %connection_id, room = %room, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    let session = match Session::open(state.registry.clone(), room.as_str(), handle) {
        Ok(session) => session,
        Err(e) => {
            warn!(connection = %connection_id, room = %room, error = %e, "Join refused");
            metrics::record_error("join");
            let close = CloseFrame {
                code: close_code::POLICY,
                reason: e.to_string().into(),
            };
            if let Err(e) = sender.send(Message::Close(Some(close))).await {
                debug!(connection = %connection_id, error = %e, "Failed to send close frame");
            }
            return;
        }
    };
    metrics::set_active_rooms(state.registry.stats().room_count);

    // Message processing loop
    loop {
        tokio::select! {
            biased;

            // Messages queued for this connection by the registry
            Some(payload) = outbound.recv() => {
                metrics::record_message(payload.len(), "outbound");
                if sender.send(Message::Text(payload.to_string())).await.is_err() {
                    debug!(connection = %connection_id, "Send failed, closing");
                    break;
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !relay(&session, codec::decode(&text), text.len()) {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if !relay(&session, codec::decode_bytes(&data), data.len()) {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: leave the room and tell whoever is left
    let outcome = session.close();
    metrics::set_active_rooms(state.registry.stats().room_count);

    debug!(
        connection = %connection_id,
        room = %room,
        remaining = outcome.users.len(),
        "WebSocket disconnected"
    );
}

/// Hand a decoded inbound message to the session.
///
/// Returns `false` if the message was malformed and the session should end.
fn relay(session: &Session, decoded: Result<ClientMessage, ProtocolError>, size: usize) -> bool {
    metrics::record_message(size, "inbound");

    match decoded {
        Ok(message) => {
            let start = Instant::now();
            let kind = message.kind();
            let recipients = session.dispatch(message);

            metrics::record_event(kind, recipients);
            metrics::record_latency(start.elapsed().as_secs_f64());
            trace!(connection = %session.connection_id(), kind, recipients, "Relayed");
            true
        }
        Err(e) => {
            warn!(connection = %session.connection_id(), error = %e, "Malformed message, closing session");
            metrics::record_error("decode");
            false
        }
    }
}
