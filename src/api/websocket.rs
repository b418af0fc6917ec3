//! WebSocket layer: one connection per learner, bound to at most one
//! room.
//!
//! Connection lifecycle:
//! 1. Client calls `POST /api/auth/ws-ticket` to get a one-time ticket
//! 2. Client opens `GET /ws/connect?ticket=xxx` — ticket validated,
//!    WS upgraded; the connection's identity is fixed here
//! 3. Frames are processed sequentially: `join` binds the room,
//!    `chat` publishes, `leave` unbinds
//! 4. Close (or drop) deregisters the connection and closes the
//!    participation row
//!
//! A malformed frame, an unknown type, or a rejected operation yields
//! an `error` frame to this connection only; the room is unaffected.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config::MAX_MESSAGE_LENGTH;
use crate::rooms::{WsIncoming, WsOutgoing};

/// Query parameters for WebSocket upgrade.
#[derive(Deserialize)]
pub struct WsAuthQuery {
    ticket: String,
}

/// WebSocket upgrade handler.
///
/// Consumes the one-time ticket before upgrading, so every socket that
/// reaches `handle_ws` is already authenticated; the ticket's identity
/// is the only one the connection may act as.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (user_id, username) = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets
            .consume(&query.ticket)
            .ok_or(ApiError::Unauthorized)?
    };

    tracing::info!(user_id = %user_id, "WebSocket upgrade accepted");
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, ctx, user_id, username)))
}

/// Per-connection state: the authenticated identity plus the room this
/// connection is bound to, if any.
struct ConnState {
    conn_id: Uuid,
    user_id: Uuid,
    /// Display name; the join frame may override the ticket's name.
    username: String,
    room_id: Option<Uuid>,
}

/// Main connection handler.
///
/// Spawns a sender task that forwards the connection's outbound
/// channel to the socket, then processes inbound frames sequentially
/// until disconnect.
async fn handle_ws(socket: WebSocket, ctx: ApiContext, user_id: Uuid, username: String) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, rx) = mpsc::channel::<WsOutgoing>(64);

    // Sender task: channel → socket. Broadcasts from the coordinator
    // and error frames from this handler share the same ordered path.
    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        let mut rx = rx;
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(j) => j,
                Err(_) => continue,
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut state = ConnState {
        conn_id: Uuid::new_v4(),
        user_id,
        username,
        room_id: None,
    };

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(ref text)) => match serde_json::from_str::<WsIncoming>(text) {
                Ok(frame) => handle_frame(&ctx, &mut state, frame, &tx).await,
                Err(_) => {
                    send_error(&tx, "Malformed frame").await;
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            // Ping/Pong handled by axum
            _ => {}
        }
    }

    // Disconnect: close the participation row and drop the registry
    // entry. An in-flight assistant turn is not cancelled; it resolves
    // and is broadcast to whoever remains.
    if let Some(room_id) = state.room_id.take() {
        ctx.coordinator
            .registry()
            .deregister(&room_id, &state.conn_id);
        if let Err(e) = ctx
            .coordinator
            .leave(room_id, state.user_id, &state.username)
            .await
        {
            tracing::warn!(room_id = %room_id, error = %e, "Leave on disconnect failed");
        }
    }

    drop(tx);
    let _ = sender_handle.await;
    tracing::info!(user_id = %state.user_id, "WebSocket disconnected");
}

async fn handle_frame(
    ctx: &ApiContext,
    state: &mut ConnState,
    frame: WsIncoming,
    tx: &mpsc::Sender<WsOutgoing>,
) {
    match frame {
        WsIncoming::Join {
            room_id,
            user_id,
            username,
        } => {
            // The ticket's identity is the only one this socket may act as
            if user_id != state.user_id {
                send_error(tx, "Unauthorized: identity does not match this connection").await;
                return;
            }
            if state.room_id.is_some() {
                send_error(tx, "Already in a room").await;
                return;
            }

            let name = username.trim();
            if !name.is_empty() {
                state.username = name.to_string();
            }

            // Register before joining so this connection receives its
            // own "joined" notice in broadcast order.
            let registry = ctx.coordinator.registry();
            registry.register(&room_id, state.conn_id, tx.clone());
            match ctx
                .coordinator
                .join(room_id, state.user_id, &state.username)
                .await
            {
                Ok(_) => {
                    state.room_id = Some(room_id);
                }
                Err(e) => {
                    registry.deregister(&room_id, &state.conn_id);
                    send_error(tx, e.to_string()).await;
                }
            }
        }

        WsIncoming::Chat { content } => {
            let Some(room_id) = state.room_id else {
                send_error(tx, "Join a room before chatting").await;
                return;
            };
            if content.chars().count() > MAX_MESSAGE_LENGTH {
                send_error(
                    tx,
                    format!("Message exceeds {MAX_MESSAGE_LENGTH} characters"),
                )
                .await;
                return;
            }

            if let Err(e) = ctx
                .coordinator
                .chat(
                    room_id,
                    state.user_id,
                    &state.username,
                    &content,
                    Some(state.conn_id),
                )
                .await
            {
                send_error(tx, e.to_string()).await;
            }
        }

        WsIncoming::Leave => {
            // Leaving when not in a room is a no-op
            if let Some(room_id) = state.room_id.take() {
                ctx.coordinator
                    .registry()
                    .deregister(&room_id, &state.conn_id);
                if let Err(e) = ctx
                    .coordinator
                    .leave(room_id, state.user_id, &state.username)
                    .await
                {
                    send_error(tx, e.to_string()).await;
                }
            }
        }
    }
}

async fn send_error(tx: &mpsc::Sender<WsOutgoing>, message: impl Into<String>) {
    let _ = tx.send(WsOutgoing::error(message)).await;
}
