//! HTTP endpoint handlers for room lifecycle and WS tickets.
//!
//! `POST /api/rooms` — create a room with a fresh assistant thread
//! `POST /api/rooms/join` — resolve a join code (the participation row
//!   itself opens on the WebSocket `join` frame)
//! `POST /api/rooms/:id/end` — creator-only room end
//! `GET /api/rooms/:id/transcript` — ordered replay of the transcript
//! `POST /api/auth/ws-ticket` — one-time WebSocket upgrade ticket

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::models::{Message, PersonaVariant, Room};

/// Upper bound on room capacity; small-group teaching sessions only.
const MAX_CAPACITY: u32 = 16;

#[derive(Deserialize)]
pub struct CreateRoomRequest {
    pub scenario_id: String,
    pub max_participants: u32,
    /// Defaults to the emergency persona when omitted.
    pub variant: Option<PersonaVariant>,
}

#[derive(Serialize)]
pub struct CreateRoomResponse {
    pub room_id: Uuid,
    pub code: String,
    pub thread_id: String,
}

/// `POST /api/rooms` — open a new room bound to a fresh assistant thread.
pub async fn create_room(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    let scenario = request.scenario_id.trim();
    if scenario.is_empty() {
        return Err(ApiError::BadRequest("scenario_id must not be empty".into()));
    }
    if request.max_participants == 0 || request.max_participants > MAX_CAPACITY {
        return Err(ApiError::BadRequest(format!(
            "max_participants must be between 1 and {MAX_CAPACITY}"
        )));
    }

    let variant = request.variant.unwrap_or(PersonaVariant::Emergency);
    let room = ctx
        .coordinator
        .create(scenario, user.user_id, request.max_participants, variant)
        .await?;

    Ok(Json(CreateRoomResponse {
        room_id: room.id,
        code: room.code,
        thread_id: room.thread_id,
    }))
}

#[derive(Deserialize)]
pub struct JoinRoomRequest {
    pub code: String,
}

/// Room details returned to a client that resolved a join code.
#[derive(Serialize)]
pub struct RoomSummary {
    pub room_id: Uuid,
    pub code: String,
    pub scenario_id: String,
    pub capacity: u32,
    pub variant: PersonaVariant,
    pub created_at: String,
}

impl RoomSummary {
    fn from_room(room: &Room) -> Self {
        Self {
            room_id: room.id,
            code: room.code.clone(),
            scenario_id: room.scenario_ref.clone(),
            capacity: room.capacity,
            variant: room.variant,
            created_at: room.created_at.and_utc().to_rfc3339(),
        }
    }
}

/// `POST /api/rooms/join` — resolve and validate a join code.
///
/// Checks the room exists, is still open and has a free seat. The
/// durable participation row opens when the client sends its `join`
/// frame on the WebSocket.
pub async fn join_room(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<UserContext>,
    Json(request): Json<JoinRoomRequest>,
) -> Result<Json<RoomSummary>, ApiError> {
    let room = ctx.coordinator.resolve_code(&request.code).await?;
    Ok(Json(RoomSummary::from_room(&room)))
}

#[derive(Serialize)]
pub struct EndRoomResponse {
    pub room_id: Uuid,
    pub ended: bool,
}

/// `POST /api/rooms/:id/end` — end a room. Creator only.
pub async fn end_room(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<EndRoomResponse>, ApiError> {
    ctx.coordinator.end(room_id, user.user_id).await?;
    Ok(Json(EndRoomResponse {
        room_id,
        ended: true,
    }))
}

#[derive(Serialize)]
pub struct TranscriptResponse {
    pub room_id: Uuid,
    pub messages: Vec<MessageView>,
}

#[derive(Serialize)]
pub struct MessageView {
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    pub is_assistant: bool,
    pub timestamp: String,
}

impl MessageView {
    fn from_message(msg: &Message) -> Self {
        Self {
            user_id: msg.author_id,
            username: msg.username.clone(),
            content: msg.content.clone(),
            is_assistant: msg.is_assistant,
            timestamp: msg.timestamp.and_utc().to_rfc3339(),
        }
    }
}

/// `GET /api/rooms/:id/transcript` — full transcript in replay order.
/// Ended rooms stay readable; this is the review-screen surface.
pub async fn transcript(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<UserContext>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let messages = ctx.coordinator.transcript(room_id).await?;
    Ok(Json(TranscriptResponse {
        room_id,
        messages: messages.iter().map(MessageView::from_message).collect(),
    }))
}

/// Response for `POST /api/auth/ws-ticket`.
#[derive(Serialize)]
pub struct WsTicketResponse {
    pub ticket: String,
    pub expires_in: u32,
}

/// `POST /api/auth/ws-ticket` — generate a one-time WebSocket upgrade
/// ticket for the authenticated user. The client uses the ticket in
/// the WS upgrade query param instead of exposing its bearer token in
/// a URL.
pub async fn ws_ticket(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<WsTicketResponse>, ApiError> {
    let ticket = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets.issue(user.user_id, user.username)
    };

    Ok(Json(WsTicketResponse {
        ticket,
        expires_in: 30,
    }))
}
