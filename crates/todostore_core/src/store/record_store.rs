//! Record store over a single key-value slot.
//!
//! # Responsibility
//! - Provide CRUD over records keyed by generated ids under one namespace.
//! - Persist the whole table on every mutation (read-modify-write).
//!
//! # Invariants
//! - A failed write leaves the in-memory table as it was before the call.
//! - Malformed slot content fails construction; it is never discarded.
//! - Two stores on the same namespace do not coordinate: the last `save`
//!   wins.

use crate::config::{validate_namespace, ConfigError, StoreConfig};
use crate::model::record::{Record, RecordId};
use crate::slot::{SlotError, SlotProvider};
use crate::store::codec::{decode_table, encode_table, DecodeError};
use crate::store::id_gen::{IdGenerator, RandomIds};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Record store error.
#[derive(Debug)]
pub enum StoreError {
    /// Update/remove target id is not in the table.
    NotFound(RecordId),
    /// Record passed to `update`/`remove` carries no usable `id`.
    MissingId,
    /// Generator produced an id that is already in use.
    DuplicateId(RecordId),
    /// Slot content could not be decoded at construction/reload.
    Deserialization {
        namespace: String,
        source: DecodeError,
    },
    Serialization(serde_json::Error),
    Slot(SlotError),
    Config(ConfigError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::MissingId => write!(f, "record has no id"),
            Self::DuplicateId(id) => write!(f, "generated id already in use: {id}"),
            Self::Deserialization { namespace, source } => {
                write!(f, "malformed data in slot `{namespace}`: {source}")
            }
            Self::Serialization(err) => write!(f, "failed to encode records: {err}"),
            Self::Slot(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Deserialization { source, .. } => Some(source),
            Self::Serialization(err) => Some(err),
            Self::Slot(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::NotFound(_) | Self::MissingId | Self::DuplicateId(_) => None,
        }
    }
}

impl From<SlotError> for StoreError {
    fn from(value: SlotError) -> Self {
        Self::Slot(value)
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Namespaced, id-indexed record table persisted as one JSON blob.
pub struct RecordStore<P: SlotProvider, G: IdGenerator = RandomIds> {
    namespace: String,
    slots: P,
    ids: G,
    // Table order; lookups are linear like every save.
    entries: Vec<(String, Record)>,
}

impl<P: SlotProvider> RecordStore<P> {
    /// Opens `namespace` with random ids, loading any persisted table.
    pub fn open(namespace: impl Into<String>, slots: P) -> StoreResult<Self> {
        Self::open_with(namespace, slots, RandomIds)
    }
}

impl<P: SlotProvider> RecordStore<P, Box<dyn IdGenerator>> {
    /// Opens the configured namespace with the configured id strategy.
    pub fn from_config(config: &StoreConfig, slots: P) -> StoreResult<Self> {
        config.validate()?;
        Self::open_with(config.namespace.clone(), slots, config.id_strategy.generator())
    }
}

impl<P: SlotProvider, G: IdGenerator> RecordStore<P, G> {
    /// Opens `namespace` with a caller-supplied id generator.
    ///
    /// # Errors
    /// - `Config` when the namespace is malformed.
    /// - `Deserialization` when the slot holds malformed data.
    /// - `Slot` when the provider fails.
    pub fn open_with(namespace: impl Into<String>, slots: P, ids: G) -> StoreResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;

        let mut store = Self {
            namespace,
            slots,
            ids,
            entries: Vec::new(),
        };
        store.reload()?;
        info!(
            "event=store_open module=store status=ok namespace={} records={}",
            store.namespace,
            store.entries.len()
        );
        Ok(store)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn slots(&self) -> &P {
        &self.slots
    }

    /// Replaces the in-memory table with the slot's current content.
    pub fn reload(&mut self) -> StoreResult<()> {
        let raw = self.slots.read(&self.namespace)?;
        let entries = match raw.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => decode_table(raw).map_err(|source| {
                error!(
                    "event=store_load module=store status=error namespace={} error={}",
                    self.namespace, source
                );
                StoreError::Deserialization {
                    namespace: self.namespace.clone(),
                    source,
                }
            })?,
        };

        for (_, record) in &entries {
            if let Some(id) = record.id() {
                self.ids.observe(&id);
            }
        }
        self.entries = entries;
        Ok(())
    }

    /// Stamps a fresh id onto `record`, inserts it and persists.
    pub fn add(&mut self, mut record: Record) -> StoreResult<RecordId> {
        let id = self.ids.next_id();
        let key = id.key();
        if self.position(&key).is_some() {
            return Err(StoreError::DuplicateId(id));
        }

        record.set_id(&id);
        self.entries.push((key, record));
        if let Err(err) = self.persist() {
            self.entries.pop();
            return Err(err);
        }

        debug!(
            "event=record_add module=store status=ok namespace={} id={}",
            self.namespace, id
        );
        Ok(id)
    }

    /// Returns a copy of the record, `None` on miss.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.position(&id.key())
            .map(|index| self.entries[index].1.clone())
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(&id.key()).is_some()
    }

    /// Overwrites an existing record in place and persists.
    pub fn update(&mut self, record: Record) -> StoreResult<()> {
        let id = record.id().ok_or(StoreError::MissingId)?;
        let index = self
            .position(&id.key())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let previous = std::mem::replace(&mut self.entries[index].1, record);
        if let Err(err) = self.persist() {
            self.entries[index].1 = previous;
            return Err(err);
        }

        debug!(
            "event=record_update module=store status=ok namespace={} id={}",
            self.namespace, id
        );
        Ok(())
    }

    pub fn remove(&mut self, record: &Record) -> StoreResult<()> {
        let id = record.id().ok_or(StoreError::MissingId)?;
        self.remove_by_id(&id)
    }

    /// Deletes a record, keeping the order of the remaining ones.
    pub fn remove_by_id(&mut self, id: &RecordId) -> StoreResult<()> {
        let index = self
            .position(&id.key())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let removed = self.entries.remove(index);
        if let Err(err) = self.persist() {
            self.entries.insert(index, removed);
            return Err(err);
        }

        debug!(
            "event=record_remove module=store status=ok namespace={} id={}",
            self.namespace, id
        );
        Ok(())
    }

    /// Snapshot of every record in table order.
    pub fn all(&self) -> Vec<Record> {
        self.entries
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Ids in table order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.entries
            .iter()
            .filter_map(|(_, record)| record.id())
            .collect()
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empties the table and deletes the slot key itself.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.slots.delete(&self.namespace)?;
        let dropped = std::mem::take(&mut self.entries).len();
        info!(
            "event=store_clear module=store status=ok namespace={} dropped={}",
            self.namespace, dropped
        );
        Ok(())
    }

    /// Writes the whole table to the slot and returns a fresh snapshot.
    pub fn save(&mut self) -> StoreResult<Vec<Record>> {
        self.persist()?;
        Ok(self.all())
    }

    /// Rewinds the id generator.
    pub fn reset_ids(&mut self) {
        self.ids.reset();
    }

    fn persist(&self) -> StoreResult<()> {
        let table: Vec<(&str, &Record)> = self
            .entries
            .iter()
            .map(|(key, record)| (key.as_str(), record))
            .collect();
        let encoded = encode_table(&table).map_err(StoreError::Serialization)?;
        self.slots.write(&self.namespace, &encoded).map_err(|err| {
            error!(
                "event=store_save module=store status=error namespace={} error={}",
                self.namespace, err
            );
            StoreError::from(err)
        })
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(entry_key, _)| entry_key == key)
    }
}
