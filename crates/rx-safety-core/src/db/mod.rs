//! SQLite catalog storage.
//!
//! The database is a staging area for catalog records: `rx-check import`
//! writes validated sources into it and `SqliteProvider` reads them back when
//! building a snapshot. Requests never touch it.

mod catalog;
mod schema;

pub use catalog::*;
pub use schema::*;

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("catalog schema version {found} is not supported (expected {expected})")]
    SchemaVersion { found: i32, expected: i32 },
}

pub type DbResult<T> = Result<T, DbError>;

/// Catalog database handle.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a catalog database for writing, creating the schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::migrated(Connection::open(path)?)
    }

    /// Empty in-memory catalog database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::migrated(Connection::open_in_memory()?)
    }

    /// Open an existing catalog database without write access.
    ///
    /// Used by catalog reloads, which must never create or alter a file.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let db = Self { conn };
        let found = db.schema_version()?;
        if found != SCHEMA_VERSION {
            return Err(DbError::SchemaVersion {
                found,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(db)
    }

    fn migrated(conn: Connection) -> DbResult<Self> {
        let db = Self { conn };
        match db.schema_version()? {
            0 => {
                db.conn.execute_batch(SCHEMA)?;
                db.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
                tracing::debug!(version = SCHEMA_VERSION, "Catalog schema created");
            }
            SCHEMA_VERSION => {}
            found => {
                return Err(DbError::SchemaVersion {
                    found,
                    expected: SCHEMA_VERSION,
                })
            }
        }
        Ok(db)
    }

    /// Value of `PRAGMA user_version`; 0 for a fresh file.
    pub fn schema_version(&self) -> DbResult<i32> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
