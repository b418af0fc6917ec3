//! The collaborative room engine: live-connection registry plus the
//! per-room coordinator that owns join, chat, leave and end.

pub mod coordinator;
pub mod registry;

pub use coordinator::RoomCoordinator;
pub use registry::{RoomRegistry, WsIncoming, WsOutgoing};

use thiserror::Error;

use crate::assistant::AssistantError;
use crate::db::DatabaseError;

/// Room-level failures. Validation errors are scoped to one caller and
/// never break the room for the other participants.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,

    #[error("Room has already ended")]
    AlreadyEnded,

    #[error("Room is full")]
    Full,

    #[error("Only the room creator may end the room")]
    Forbidden,

    #[error("Message content is empty")]
    EmptyContent,

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}
