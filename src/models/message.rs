use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved author id for system notices and assistant replies.
pub const SYSTEM_AUTHOR: Uuid = Uuid::nil();

/// Display name used on system notices (joined / left).
pub const SYSTEM_USERNAME: &str = "system";

/// Display name used on assistant replies.
pub const ASSISTANT_USERNAME: &str = "assistant";

/// One transcript entry. Append-only: never mutated or deleted after
/// insert. Replay order is timestamp, ties broken by insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    /// A real user id, or [`SYSTEM_AUTHOR`] for system/assistant entries.
    pub author_id: Uuid,
    pub username: String,
    pub content: String,
    pub is_assistant: bool,
    pub timestamp: NaiveDateTime,
}
