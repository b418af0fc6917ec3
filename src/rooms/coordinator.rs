//! Per-room protocol owner: create, join, chat, leave, end.
//!
//! The coordinator owns every Room/Participant/Message lifecycle
//! transition. Two per-room critical sections keep concurrent rooms
//! independent:
//!
//! - the **publish lock** serializes persist-then-broadcast, so every
//!   live connection observes messages in exactly persisted order;
//! - the **turn lock** serializes assistant turns, so at most one run
//!   is ever in flight per room. Overlapping chat turns queue behind
//!   the in-flight turn rather than being rejected.
//!
//! The user's own chat message is published before the assistant turn
//! starts and stays visible even if the turn later fails.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rand::Rng;
use uuid::Uuid;

use crate::assistant::{extract_score, extract_vitals, AssistantGateway};
use crate::db::{repository, DatabaseError, Db};
use crate::models::{
    Message, PersonaVariant, Room, ScoreRecord, VitalSample, ASSISTANT_USERNAME, SYSTEM_AUTHOR,
    SYSTEM_USERNAME,
};

use super::registry::{RoomRegistry, WsOutgoing};
use super::RoomError;

/// Join-code alphabet. Excludes 0/O and 1/I so codes survive being
/// read out loud or scribbled on a whiteboard.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Collision retries before room creation gives up.
const CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct RoomCoordinator {
    db: Db,
    registry: Arc<RoomRegistry>,
    gateway: Arc<AssistantGateway>,
}

enum JoinOutcome {
    Joined,
    AlreadyJoined,
    Full,
}

impl RoomCoordinator {
    pub fn new(db: Db, registry: Arc<RoomRegistry>, gateway: Arc<AssistantGateway>) -> Self {
        Self {
            db,
            registry,
            gateway,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Open a new room with a freshly created assistant thread bound to
    /// it. The thread is created first so a failed remote call leaves no
    /// orphaned room behind.
    pub async fn create(
        &self,
        scenario_ref: &str,
        creator_id: Uuid,
        capacity: u32,
        variant: PersonaVariant,
    ) -> Result<Room, RoomError> {
        let thread_id = self.gateway.create_thread().await?;

        for _ in 0..CODE_ATTEMPTS {
            let room = Room {
                id: Uuid::new_v4(),
                code: generate_code(),
                scenario_ref: scenario_ref.to_string(),
                creator_id,
                capacity,
                variant,
                thread_id: thread_id.clone(),
                created_at: now(),
                ended_at: None,
            };
            let candidate = room.clone();
            match self
                .db
                .with(move |conn| repository::insert_room(conn, &candidate))
                .await
            {
                Ok(()) => {
                    tracing::info!(room_id = %room.id, code = %room.code, "Room created");
                    return Ok(room);
                }
                // Code collision — roll a new one
                Err(e) if e.is_constraint_violation() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(RoomError::Store(DatabaseError::ConstraintViolation(
            "could not allocate a unique room code".into(),
        )))
    }

    /// Join a room. Idempotent for a user whose participation is
    /// already open; otherwise opens a participant row and publishes a
    /// system "joined" notice. The capacity check and the insert run
    /// under the same connection lock, so a concurrent join over
    /// capacity is rejected with `Full`.
    pub async fn join(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: &str,
    ) -> Result<Room, RoomError> {
        let room = self.open_room(room_id).await?;

        let capacity = room.capacity as i64;
        let outcome = self
            .db
            .with(move |conn| {
                if repository::has_open_participant(conn, &room_id, &user_id)? {
                    return Ok(JoinOutcome::AlreadyJoined);
                }
                if repository::count_open_participants(conn, &room_id)? >= capacity {
                    return Ok(JoinOutcome::Full);
                }
                repository::open_participant(conn, &room_id, &user_id, &now())?;
                Ok(JoinOutcome::Joined)
            })
            .await?;

        match outcome {
            JoinOutcome::Full => Err(RoomError::Full),
            JoinOutcome::AlreadyJoined => Ok(room),
            JoinOutcome::Joined => {
                self.publish(
                    room_id,
                    SYSTEM_AUTHOR,
                    SYSTEM_USERNAME,
                    &format!("{username} joined the room"),
                    false,
                )
                .await?;
                Ok(room)
            }
        }
    }

    /// Accept a chat message: publish it immediately, then drive one
    /// assistant turn asynchronously. `origin` is the connection that
    /// should receive an error frame if the assistant turn fails.
    ///
    /// A store failure on the user-message write aborts before any
    /// assistant call is made.
    pub async fn chat(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: &str,
        content: &str,
        origin: Option<Uuid>,
    ) -> Result<(), RoomError> {
        let text = content.trim();
        if text.is_empty() {
            return Err(RoomError::EmptyContent);
        }
        let room = self.open_room(room_id).await?;

        self.publish(room_id, user_id, username, text, false).await?;

        let this = self.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            this.run_assistant_turn(room, user_id, text, origin).await;
        });
        Ok(())
    }

    /// Close the user's open participation, if any, and publish a
    /// system "left" notice. Leaving twice has no additional effect.
    pub async fn leave(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: &str,
    ) -> Result<(), RoomError> {
        let closed = self
            .db
            .with(move |conn| repository::close_participant(conn, &room_id, &user_id, &now()))
            .await?;
        if !closed {
            return Ok(());
        }

        // No notice for a room that already ended; its transcript is
        // immutable history.
        match self
            .publish(
                room_id,
                SYSTEM_AUTHOR,
                SYSTEM_USERNAME,
                &format!("{username} left the room"),
                false,
            )
            .await
        {
            Ok(_) | Err(RoomError::AlreadyEnded) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// End a room. Only the creator may end it. Sets `ended_at`,
    /// force-closes every open participation and drops the live
    /// registry entry; all later join/chat attempts fail with
    /// `AlreadyEnded`.
    pub async fn end(&self, room_id: Uuid, requester_id: Uuid) -> Result<(), RoomError> {
        let room = self.open_room(room_id).await?;
        if room.creator_id != requester_id {
            return Err(RoomError::Forbidden);
        }

        self.db
            .with(move |conn| {
                repository::end_room(conn, &room_id, &now())?;
                repository::close_all_participants(conn, &room_id, &now())?;
                Ok(())
            })
            .await?;

        self.registry.remove_room(&room_id);
        tracing::info!(room_id = %room_id, "Room ended");
        Ok(())
    }

    /// Resolve a join code and check the room can still be joined.
    pub async fn resolve_code(&self, code: &str) -> Result<Room, RoomError> {
        let code = code.trim().to_uppercase();
        let room = self
            .db
            .with(move |conn| repository::get_room_by_code(conn, &code))
            .await?
            .ok_or(RoomError::NotFound)?;
        if room.is_ended() {
            return Err(RoomError::AlreadyEnded);
        }

        let room_id = room.id;
        let open = self
            .db
            .with(move |conn| repository::count_open_participants(conn, &room_id))
            .await?;
        if open >= room.capacity as i64 {
            return Err(RoomError::Full);
        }
        Ok(room)
    }

    /// Full transcript in replay order. Ended rooms stay readable.
    pub async fn transcript(&self, room_id: Uuid) -> Result<Vec<Message>, RoomError> {
        self.db
            .with(move |conn| {
                if repository::get_room(conn, &room_id)?.is_none() {
                    return Err(DatabaseError::NotFound {
                        entity_type: "room".into(),
                        id: room_id.to_string(),
                    });
                }
                repository::list_messages(conn, &room_id)
            })
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => RoomError::NotFound,
                other => RoomError::Store(other),
            })
    }

    // ── Internal ────────────────────────────────────────────

    /// Drive one assistant turn for a room, serialized by the room's
    /// turn lock. The reply is published and mined for clinical
    /// signals; a failure becomes an error frame to the originating
    /// connection only.
    async fn run_assistant_turn(
        &self,
        room: Room,
        user_id: Uuid,
        content: String,
        origin: Option<Uuid>,
    ) {
        let turn_lock = self.registry.turn_lock(&room.id);
        let _turn = turn_lock.lock().await;

        match self
            .gateway
            .send_turn(&room.thread_id, &content, room.variant)
            .await
        {
            Ok(reply) => {
                match self
                    .publish(room.id, SYSTEM_AUTHOR, ASSISTANT_USERNAME, &reply, true)
                    .await
                {
                    Ok(_) => self.record_signals(&room, user_id, &reply).await,
                    Err(RoomError::AlreadyEnded) => {
                        // The room ended while the turn was in flight;
                        // the transcript stays immutable.
                        tracing::info!(room_id = %room.id, "Dropping assistant reply for ended room");
                    }
                    Err(e) => {
                        tracing::error!(room_id = %room.id, error = %e, "Failed to publish assistant reply");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(room_id = %room.id, error = %err, "Assistant turn failed");
                if let Some(conn_id) = origin {
                    self.registry.send_to(
                        &room.id,
                        &conn_id,
                        WsOutgoing::error(format!("Assistant reply unavailable: {err}")),
                    );
                }
            }
        }
    }

    /// Forward extracted signals to the progress store. Fire-and-forget:
    /// failures are logged, never surfaced to the chat participants.
    async fn record_signals(&self, room: &Room, user_id: Uuid, reply: &str) {
        if let Some(reading) = extract_vitals(reply) {
            let sample = VitalSample {
                id: Uuid::new_v4(),
                thread_id: room.thread_id.clone(),
                reading,
                recorded_at: now(),
            };
            if let Err(e) = self
                .db
                .with(move |conn| repository::insert_vital_sample(conn, &sample))
                .await
            {
                tracing::warn!(error = %e, "Failed to record vital sample");
            }
        }

        if let Some(score) = extract_score(reply) {
            let record = ScoreRecord {
                id: Uuid::new_v4(),
                scenario_ref: room.scenario_ref.clone(),
                user_id,
                score,
                raw_feedback: reply.to_string(),
                recorded_at: now(),
            };
            if let Err(e) = self
                .db
                .with(move |conn| repository::insert_score_record(conn, &record))
                .await
            {
                tracing::warn!(error = %e, "Failed to record score");
            }
        }
    }

    async fn open_room(&self, room_id: Uuid) -> Result<Room, RoomError> {
        let room = self
            .db
            .with(move |conn| repository::get_room(conn, &room_id))
            .await?
            .ok_or(RoomError::NotFound)?;
        if room.is_ended() {
            return Err(RoomError::AlreadyEnded);
        }
        Ok(room)
    }

    /// Persist a message, then fan it out, under the room's publish
    /// lock: no broadcast of a message that failed to persist, no
    /// persisted message missing from the broadcast stream. The
    /// open-room check runs inside the same connection lock as the
    /// insert, so nothing lands in a transcript after `ended_at`.
    async fn publish(
        &self,
        room_id: Uuid,
        author_id: Uuid,
        username: &str,
        content: &str,
        is_assistant: bool,
    ) -> Result<Message, RoomError> {
        let lock = self.registry.publish_lock(&room_id);
        let _guard = lock.lock().await;

        let msg = Message {
            id: Uuid::new_v4(),
            room_id,
            author_id,
            username: username.to_string(),
            content: content.to_string(),
            is_assistant,
            timestamp: now(),
        };

        let persisted = msg.clone();
        let inserted = self
            .db
            .with(move |conn| match repository::get_room(conn, &room_id)? {
                Some(room) if !room.is_ended() => {
                    repository::insert_message(conn, &persisted)?;
                    Ok(true)
                }
                _ => Ok(false),
            })
            .await?;
        if !inserted {
            return Err(RoomError::AlreadyEnded);
        }

        self.registry
            .broadcast(&room_id, &WsOutgoing::from_message(&msg));
        Ok(msg)
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
