pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Database task failed: {0}")]
    TaskFailed(String),
}

impl DatabaseError {
    /// True when the underlying SQLite error is a constraint hit
    /// (unique index, foreign key).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DatabaseError::ConstraintViolation(_) => true,
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

/// Shared handle to the transcript database.
///
/// SQLite work is synchronous, so async callers run their closure on the
/// blocking pool while holding the single-connection lock. The lock also
/// makes multi-statement sequences (capacity check + participant insert)
/// atomic within this process.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(sqlite::open_database(path)?))
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(sqlite::open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn with<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            // A poisoned lock means a closure panicked mid-statement; the
            // connection itself is still usable.
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&guard)
        })
        .await
        .map_err(|e| DatabaseError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_runs_closure_on_shared_connection() {
        let db = Db::in_memory().unwrap();
        let count = db
            .with(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM rooms",
                    [],
                    |row| row.get::<_, i64>(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn with_propagates_sqlite_errors() {
        let db = Db::in_memory().unwrap();
        let result = db
            .with(|conn| {
                conn.execute("INSERT INTO no_such_table (x) VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn constraint_detection_matches_explicit_variant() {
        let err = DatabaseError::ConstraintViolation("dup".into());
        assert!(err.is_constraint_violation());
        let err = DatabaseError::TaskFailed("oops".into());
        assert!(!err.is_constraint_violation());
    }
}
