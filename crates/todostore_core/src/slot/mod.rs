//! Key-value slot providers.
//!
//! # Responsibility
//! - Define the single-string-slot contract a `RecordStore` persists into.
//! - Provide in-memory and SQLite-backed implementations.
//!
//! # Invariants
//! - `delete` removes the key itself; a later `read` returns `None`.
//! - All operations are synchronous and complete before returning.

mod memory;
mod sqlite;

pub use memory::MemorySlots;
pub use sqlite::SqliteSlots;

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type SlotResult<T> = Result<T, SlotError>;

/// Failure reported by a slot provider.
#[derive(Debug)]
pub enum SlotError {
    Db(DbError),
    InvalidKey(String),
}

impl Display for SlotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidKey(key) => write!(f, "invalid slot key: `{key}`"),
        }
    }
}

impl Error for SlotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidKey(_) => None,
        }
    }
}

impl From<DbError> for SlotError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SlotError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// String-valued key-value storage, one entry per namespace.
pub trait SlotProvider {
    fn read(&self, key: &str) -> SlotResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> SlotResult<()>;
    fn delete(&self, key: &str) -> SlotResult<()>;
}

impl<T: SlotProvider + ?Sized> SlotProvider for &T {
    fn read(&self, key: &str) -> SlotResult<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> SlotResult<()> {
        (**self).write(key, value)
    }

    fn delete(&self, key: &str) -> SlotResult<()> {
        (**self).delete(key)
    }
}

impl<T: SlotProvider + ?Sized> SlotProvider for Rc<T> {
    fn read(&self, key: &str) -> SlotResult<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> SlotResult<()> {
        (**self).write(key, value)
    }

    fn delete(&self, key: &str) -> SlotResult<()> {
        (**self).delete(key)
    }
}

pub(crate) fn ensure_valid_key(key: &str) -> SlotResult<()> {
    if key.trim().is_empty() {
        return Err(SlotError::InvalidKey(key.to_string()));
    }
    Ok(())
}
