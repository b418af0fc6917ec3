use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Message;

use super::{format_ts, parse_ts};

/// Append a message to the room transcript. Messages are never mutated
/// or deleted after insert.
pub fn insert_message(conn: &Connection, msg: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO messages (id, room_id, author_id, username, content, is_assistant, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            msg.id.to_string(),
            msg.room_id.to_string(),
            msg.author_id.to_string(),
            msg.username,
            msg.content,
            msg.is_assistant,
            format_ts(&msg.timestamp),
        ],
    )?;
    Ok(())
}

/// Full transcript of a room in replay order: timestamp ascending,
/// ties broken by insertion order (rowid).
pub fn list_messages(conn: &Connection, room_id: &Uuid) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, room_id, author_id, username, content, is_assistant, timestamp
         FROM messages WHERE room_id = ?1
         ORDER BY timestamp ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![room_id.to_string()], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            room_id: row.get(1)?,
            author_id: row.get(2)?,
            username: row.get(3)?,
            content: row.get(4)?,
            is_assistant: row.get(5)?,
            timestamp: row.get(6)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

struct MessageRow {
    id: String,
    room_id: String,
    author_id: String,
    username: String,
    content: String,
    is_assistant: bool,
    timestamp: String,
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        room_id: Uuid::parse_str(&row.room_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        author_id: Uuid::parse_str(&row.author_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        username: row.username,
        content: row.content,
        is_assistant: row.is_assistant,
        timestamp: parse_ts(&row.timestamp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{PersonaVariant, Room, ASSISTANT_USERNAME, SYSTEM_AUTHOR};

    fn test_db_with_room() -> (Connection, Uuid) {
        let conn = open_memory_database().unwrap();
        let room = Room {
            id: Uuid::new_v4(),
            code: "MSGRM1".to_string(),
            scenario_ref: "scenario-sepsis".to_string(),
            creator_id: Uuid::new_v4(),
            capacity: 4,
            variant: PersonaVariant::Clinical,
            thread_id: "thread_msg".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            ended_at: None,
        };
        crate::db::repository::insert_room(&conn, &room).unwrap();
        (conn, room.id)
    }

    fn make_message(room_id: Uuid, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            room_id,
            author_id: Uuid::new_v4(),
            username: "lea".to_string(),
            content: content.to_string(),
            is_assistant: false,
            timestamp: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn insert_and_list_messages() {
        let (conn, room_id) = test_db_with_room();
        insert_message(&conn, &make_message(room_id, "hello")).unwrap();
        insert_message(&conn, &make_message(room_id, "world")).unwrap();

        let messages = list_messages(&conn, &room_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].content, "world");
    }

    #[test]
    fn same_second_messages_keep_insertion_order() {
        let (conn, room_id) = test_db_with_room();
        let ts = chrono::Utc::now().naive_utc();
        for i in 0..5 {
            let mut msg = make_message(room_id, &format!("msg-{i}"));
            msg.timestamp = ts;
            insert_message(&conn, &msg).unwrap();
        }

        let messages = list_messages(&conn, &room_id).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);
    }

    #[test]
    fn assistant_message_round_trips() {
        let (conn, room_id) = test_db_with_room();
        let msg = Message {
            id: Uuid::new_v4(),
            room_id,
            author_id: SYSTEM_AUTHOR,
            username: ASSISTANT_USERNAME.to_string(),
            content: "The patient reports chest pain.".to_string(),
            is_assistant: true,
            timestamp: chrono::Utc::now().naive_utc(),
        };
        insert_message(&conn, &msg).unwrap();

        let messages = list_messages(&conn, &room_id).unwrap();
        assert!(messages[0].is_assistant);
        assert_eq!(messages[0].author_id, SYSTEM_AUTHOR);
    }

    #[test]
    fn transcripts_are_isolated_per_room() {
        let (conn, room_a) = test_db_with_room();
        let room_b = Room {
            id: Uuid::new_v4(),
            code: "MSGRM2".to_string(),
            scenario_ref: "scenario-stroke".to_string(),
            creator_id: Uuid::new_v4(),
            capacity: 4,
            variant: PersonaVariant::Emergency,
            thread_id: "thread_other".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            ended_at: None,
        };
        crate::db::repository::insert_room(&conn, &room_b).unwrap();

        insert_message(&conn, &make_message(room_a, "in A")).unwrap();
        insert_message(&conn, &make_message(room_b.id, "in B")).unwrap();

        assert_eq!(list_messages(&conn, &room_a).unwrap().len(), 1);
        assert_eq!(list_messages(&conn, &room_b.id).unwrap().len(), 1);
    }

    #[test]
    fn unknown_room_foreign_key_rejected() {
        let (conn, _room_id) = test_db_with_room();
        let err = insert_message(&conn, &make_message(Uuid::new_v4(), "orphan")).unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
