//! Local record store and auto-persisting todo collection.
//!
//! A `RecordStore` keeps an id-indexed table of JSON records in one
//! key-value slot per namespace. A `TodoList` wraps the store with typed
//! `Todo` objects whose events write changes back without explicit saves.

pub mod collection;
pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod slot;
pub mod store;

pub use collection::{ListError, ListEvent, ListResult, ListTopic, TodoList};
pub use config::{ConfigError, IdStrategy, StoreConfig, DEFAULT_NAMESPACE};
pub use events::{Event, EventBus, HandlerError, HandlerResult, SubscriptionId};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::record::{Record, RecordId};
pub use model::todo::{Lifecycle, Todo, TodoEvent, TodoRecord, TodoTopic};
pub use slot::{MemorySlots, SlotError, SlotProvider, SqliteSlots};
pub use store::{IdGenerator, RandomIds, RecordStore, SequentialIds, StoreError, StoreResult};
