//! WebSocket upgrade handler and per-connection event loop.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::auth::tokens;
use crate::db::schema::users;
use crate::AppState;

use super::events::ClientFrame;
use super::registry::ConnectionEntry;

/// Close codes (4000-range for application-level).
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_UNEXPECTED_FRAME: u16 = 4001;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_TIMEOUT: u16 = 4009;

/// Timeout for receiving the identify frame after connection (seconds).
const IDENTIFY_TIMEOUT_SECS: u64 = 10;

/// Interval between transport pings. A connection that lets a whole
/// interval pass without answering is considered dead and evicted.
const PING_INTERVAL_SECS: u64 = 30;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: wait for the identify frame within the handshake window.
    let identify_result = time::timeout(
        Duration::from_secs(IDENTIFY_TIMEOUT_SECS),
        read_identify(&mut ws_rx),
    )
    .await;

    let token = match identify_result {
        Ok(Ok(token)) => token,
        Ok(Err(reason)) => {
            tracing::debug!(%reason, "handshake failed");
            let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, reason).await;
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_TIMEOUT, "Handshake timeout").await;
            return;
        }
    };

    // Step 2: resolve the identity before admission. The registry only ever
    // sees an authenticated user.
    let Some(claims) = tokens::verify_access_token(&state.config.jwt_secret, &token) else {
        let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, "Invalid or expired token").await;
        return;
    };

    let display_name = match load_display_name(&state, &claims.sub).await {
        Ok(Some(name)) => name,
        Ok(None) => {
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, "Unknown user").await;
            return;
        }
        Err(reason) => {
            tracing::warn!(%reason, "identity lookup failed");
            let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, reason).await;
            return;
        }
    };

    // Step 3: admit. The presence broadcast triggered here lands in our own
    // outbound queue too, so the new client converges with everyone else.
    let connection_id = board_common::id::prefixed_ulid(board_common::id::prefix::CONNECTION);
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    if let Err(e) = state.gateway.admit(ConnectionEntry {
        connection_id: connection_id.clone(),
        user_id: claims.sub.clone(),
        display_name: display_name.clone(),
        sender: out_tx,
    }) {
        tracing::warn!(%e, "admission rejected");
        let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Duplicate connection").await;
        return;
    }

    tracing::info!(
        connection_id = %connection_id,
        user_id = %claims.sub,
        display_name = %display_name,
        "gateway connection established"
    );

    // Step 4: ack with the connection id (the client needs it to tag its own
    // chat posts), then replay retained history oldest-first.
    let ready = serde_json::json!({
        "type": "ready",
        "data": {
            "connectionId": connection_id,
            "onlineCount": state.gateway.online_count(),
        }
    });
    if ws_tx
        .send(Message::Text(ready.to_string().into()))
        .await
        .is_err()
    {
        state.gateway.evict(&connection_id);
        return;
    }

    for frame in state.gateway.history() {
        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
            state.gateway.evict(&connection_id);
            return;
        }
    }

    // Step 5: run until the client goes away, then evict. Every exit path
    // funnels through this single idempotent eviction.
    run_connection(&connection_id, ws_tx, ws_rx, out_rx).await;

    state.gateway.evict(&connection_id);

    tracing::info!(connection_id = %connection_id, "gateway connection closed");
}

/// Read frames until the client sends identify; transport pings are allowed
/// in the meantime.
async fn read_identify(
    ws_rx: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Result<String, &'static str> {
    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(?e, "ws read error during handshake");
                return Err("read error");
            }
        };

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => return Err("client closed"),
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => continue,
        };

        return match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::Identify { token }) => Ok(token),
            Err(_) => Err("expected identify frame"),
        };
    }
    Err("connection closed before identify")
}

/// Fetch the cached-at-admission display name for an authenticated user.
async fn load_display_name(
    state: &AppState,
    user_id: &str,
) -> Result<Option<String>, &'static str> {
    let mut conn = state.db.get().await.map_err(|_| "database unavailable")?;

    diesel_async::RunQueryDsl::get_result::<String>(
        users::table.find(user_id).select(users::full_name),
        &mut conn,
    )
    .await
    .optional()
    .map_err(|_| "identity lookup failed")
}

/// Main connection loop: forward queued broadcasts, answer liveness pings,
/// and bail on anything unexpected from the client.
async fn run_connection(
    connection_id: &str,
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut ws_rx: futures_util::stream::SplitStream<WebSocket>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let mut ping_timer = time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping_timer.tick().await; // First tick fires immediately; skip it.
    let mut alive = true;

    loop {
        tokio::select! {
            // Client sends us something.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Identify { .. }) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNEXPECTED_FRAME, "Already identified").await;
                                break;
                            }
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNEXPECTED_FRAME, "Unexpected frame").await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        alive = true;
                    }
                    // The transport layer answers pings for us.
                    Some(Ok(Message::Ping(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id, "ws read error");
                        break;
                    }
                    _ => {}
                }
            }

            // A broadcast frame queued by the dispatcher.
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    // Our registry entry is gone (evicted elsewhere).
                    None => break,
                }
            }

            // Liveness check.
            _ = ping_timer.tick() => {
                if !alive {
                    tracing::debug!(connection_id, "heartbeat timeout, closing connection");
                    let _ = send_close(&mut ws_tx, CLOSE_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                alive = false;
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
