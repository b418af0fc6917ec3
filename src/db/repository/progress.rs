use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{ScoreRecord, VitalReading, VitalSample};

use super::{format_ts, parse_ts};

/// Record a vital-sign sample extracted from an assistant reply.
pub fn insert_vital_sample(conn: &Connection, sample: &VitalSample) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO vital_samples (id, thread_id, heart_rate, systolic, diastolic, respiratory_rate, spo2, temperature, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            sample.id.to_string(),
            sample.thread_id,
            sample.reading.heart_rate,
            sample.reading.systolic,
            sample.reading.diastolic,
            sample.reading.respiratory_rate,
            sample.reading.spo2,
            sample.reading.temperature,
            format_ts(&sample.recorded_at),
        ],
    )?;
    Ok(())
}

/// All samples for a thread, oldest first (trend display order).
pub fn list_vital_samples(
    conn: &Connection,
    thread_id: &str,
) -> Result<Vec<VitalSample>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, thread_id, heart_rate, systolic, diastolic, respiratory_rate, spo2, temperature, recorded_at
         FROM vital_samples WHERE thread_id = ?1
         ORDER BY recorded_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![thread_id], |row| {
        let id: String = row.get(0)?;
        let thread_id: String = row.get(1)?;
        let recorded_at: String = row.get(8)?;
        Ok((
            id,
            thread_id,
            VitalReading {
                heart_rate: row.get(2)?,
                systolic: row.get(3)?,
                diastolic: row.get(4)?,
                respiratory_rate: row.get(5)?,
                spo2: row.get(6)?,
                temperature: row.get(7)?,
            },
            recorded_at,
        ))
    })?;

    let mut samples = Vec::new();
    for row in rows {
        let (id, thread_id, reading, recorded_at) = row?;
        samples.push(VitalSample {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            thread_id,
            reading,
            recorded_at: parse_ts(&recorded_at),
        });
    }
    Ok(samples)
}

/// Record an extracted performance score.
pub fn insert_score_record(conn: &Connection, record: &ScoreRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO score_records (id, scenario_ref, user_id, score, raw_feedback, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id.to_string(),
            record.scenario_ref,
            record.user_id.to_string(),
            record.score,
            record.raw_feedback,
            format_ts(&record.recorded_at),
        ],
    )?;
    Ok(())
}

/// All scores for a learner, newest first.
pub fn list_score_records(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<ScoreRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, scenario_ref, user_id, score, raw_feedback, recorded_at
         FROM score_records WHERE user_id = ?1
         ORDER BY recorded_at DESC, rowid DESC",
    )?;

    let rows = stmt.query_map(params![user_id.to_string()], |row| {
        let id: String = row.get(0)?;
        let user: String = row.get(2)?;
        let recorded_at: String = row.get(5)?;
        Ok((
            id,
            row.get::<_, String>(1)?,
            user,
            row.get::<_, f64>(3)?,
            row.get::<_, String>(4)?,
            recorded_at,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, scenario_ref, user, score, raw_feedback, recorded_at) = row?;
        records.push(ScoreRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            scenario_ref,
            user_id: Uuid::parse_str(&user)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            score,
            raw_feedback,
            recorded_at: parse_ts(&recorded_at),
        });
    }
    Ok(records)
}
