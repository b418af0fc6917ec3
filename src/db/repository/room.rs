use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{PersonaVariant, Room};

use super::{format_ts, parse_ts};

/// Insert a new open room.
pub fn insert_room(conn: &Connection, room: &Room) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO rooms (id, code, scenario_ref, creator_id, capacity, variant, thread_id, created_at, ended_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            room.id.to_string(),
            room.code,
            room.scenario_ref,
            room.creator_id.to_string(),
            room.capacity,
            room.variant.as_str(),
            room.thread_id,
            format_ts(&room.created_at),
            room.ended_at.as_ref().map(format_ts),
        ],
    )?;
    Ok(())
}

pub fn get_room(conn: &Connection, id: &Uuid) -> Result<Option<Room>, DatabaseError> {
    query_room(
        conn,
        "SELECT id, code, scenario_ref, creator_id, capacity, variant, thread_id, created_at, ended_at
         FROM rooms WHERE id = ?1",
        &id.to_string(),
    )
}

/// Look a room up by its human-shareable join code.
pub fn get_room_by_code(conn: &Connection, code: &str) -> Result<Option<Room>, DatabaseError> {
    query_room(
        conn,
        "SELECT id, code, scenario_ref, creator_id, capacity, variant, thread_id, created_at, ended_at
         FROM rooms WHERE code = ?1",
        code,
    )
}

fn query_room(conn: &Connection, sql: &str, key: &str) -> Result<Option<Room>, DatabaseError> {
    let result = conn.query_row(sql, params![key], |row| {
        Ok(RoomRow {
            id: row.get(0)?,
            code: row.get(1)?,
            scenario_ref: row.get(2)?,
            creator_id: row.get(3)?,
            capacity: row.get(4)?,
            variant: row.get(5)?,
            thread_id: row.get(6)?,
            created_at: row.get(7)?,
            ended_at: row.get(8)?,
        })
    });
    match result {
        Ok(row) => Ok(Some(room_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Mark a room ended. Fails with `NotFound` if the room does not exist
/// or has already ended.
pub fn end_room(conn: &Connection, id: &Uuid, ended_at: &NaiveDateTime) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE rooms SET ended_at = ?2 WHERE id = ?1 AND ended_at IS NULL",
        params![id.to_string(), format_ts(ended_at)],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "room".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Open a participation row. The partial unique index rejects a second
/// open row for the same (room, user).
pub fn open_participant(
    conn: &Connection,
    room_id: &Uuid,
    user_id: &Uuid,
    joined_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO participants (room_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
        params![
            room_id.to_string(),
            user_id.to_string(),
            format_ts(joined_at),
        ],
    )?;
    Ok(())
}

/// Is there an open participation row for this (room, user)?
pub fn has_open_participant(
    conn: &Connection,
    room_id: &Uuid,
    user_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM participants
         WHERE room_id = ?1 AND user_id = ?2 AND left_at IS NULL)",
        params![room_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Close the open participation row, if any. Returns whether a row was
/// closed, so callers can keep `leave` idempotent.
pub fn close_participant(
    conn: &Connection,
    room_id: &Uuid,
    user_id: &Uuid,
    left_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE participants SET left_at = ?3
         WHERE room_id = ?1 AND user_id = ?2 AND left_at IS NULL",
        params![
            room_id.to_string(),
            user_id.to_string(),
            format_ts(left_at),
        ],
    )?;
    Ok(affected > 0)
}

/// Force-close every open participation row in a room (used by `end`).
pub fn close_all_participants(
    conn: &Connection,
    room_id: &Uuid,
    left_at: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE participants SET left_at = ?2
         WHERE room_id = ?1 AND left_at IS NULL",
        params![room_id.to_string(), format_ts(left_at)],
    )?;
    Ok(affected)
}

pub fn count_open_participants(conn: &Connection, room_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM participants WHERE room_id = ?1 AND left_at IS NULL",
        params![room_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct RoomRow {
    id: String,
    code: String,
    scenario_ref: String,
    creator_id: String,
    capacity: u32,
    variant: String,
    thread_id: String,
    created_at: String,
    ended_at: Option<String>,
}

fn room_from_row(row: RoomRow) -> Result<Room, DatabaseError> {
    Ok(Room {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        code: row.code,
        scenario_ref: row.scenario_ref,
        creator_id: Uuid::parse_str(&row.creator_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        capacity: row.capacity,
        variant: PersonaVariant::from_str(&row.variant).ok_or_else(|| {
            DatabaseError::InvalidEnum {
                field: "variant".into(),
                value: row.variant.clone(),
            }
        })?,
        thread_id: row.thread_id,
        created_at: parse_ts(&row.created_at),
        ended_at: row.ended_at.as_deref().map(parse_ts),
    })
}
