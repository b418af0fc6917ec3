use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persona ruleset the assistant uses for a room's scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaVariant {
    /// Emergency-department patient simulation.
    Emergency,
    /// Clinical instructor / debrief persona.
    Clinical,
}

impl PersonaVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            PersonaVariant::Emergency => "emergency",
            PersonaVariant::Clinical => "clinical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "emergency" => Some(PersonaVariant::Emergency),
            "clinical" => Some(PersonaVariant::Clinical),
            _ => None,
        }
    }
}

/// A bounded multi-party training session scoped to one scenario.
///
/// Once `ended_at` is set the room is immutable history: no further
/// join or chat mutation is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    /// Human-shareable join code, unique across rooms.
    pub code: String,
    pub scenario_ref: String,
    pub creator_id: Uuid,
    pub capacity: u32,
    pub variant: PersonaVariant,
    /// Remote assistant thread bound 1:1 to this room for its whole life.
    pub thread_id: String,
    pub created_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
}

impl Room {
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// One user's stint in a room. Re-joining after leaving opens a new row;
/// at most one row per (room, user) may be open at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: NaiveDateTime,
    pub left_at: Option<NaiveDateTime>,
}
