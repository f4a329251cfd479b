//! SQLite-backed slot provider.
//!
//! # Invariants
//! - Connection must be opened via `db::open_db*` (schema at latest version).
//! - One row per slot key; `delete` removes the row.

use super::{ensure_valid_key, SlotProvider, SlotResult};
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Slot provider persisting each key as one row of the `slots` table.
///
/// Owns its connection so it can back long-lived stores; share it between
/// stores through `Rc<SqliteSlots>`.
pub struct SqliteSlots {
    conn: Connection,
}

impl SqliteSlots {
    /// Takes ownership of a migrated connection.
    ///
    /// # Errors
    /// - `DbError::UninitializedConnection` when the schema version differs
    ///   from the latest migration.
    pub fn try_new(conn: Connection) -> DbResult<Self> {
        let actual_version = current_user_version(&conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(DbError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Opens (and migrates) a database file as a slot provider.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::try_new(open_db(path)?)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns all slot keys, sorted.
    pub fn keys(&self) -> SlotResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM slots ORDER BY key ASC;")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

impl SlotProvider for SqliteSlots {
    fn read(&self, key: &str) -> SlotResult<Option<String>> {
        ensure_valid_key(key)?;
        let value = self
            .conn
            .query_row("SELECT value FROM slots WHERE key = ?1;", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> SlotResult<()> {
        ensure_valid_key(key)?;
        self.conn.execute(
            "INSERT INTO slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> SlotResult<()> {
        ensure_valid_key(key)?;
        self.conn.execute("DELETE FROM slots WHERE key = ?1;", [key])?;
        Ok(())
    }
}
