//! Namespaced record persistence.
//!
//! # Responsibility
//! - Own id generation, CRUD and the serialized table for one namespace.
//!
//! # Invariants
//! - Every record's `id` key form equals its table key.
//! - The slot holds the encoding of the whole table as of the last mutation.
//! - Table order is insertion order, kept across updates, removals and
//!   reloads.

pub mod codec;
pub mod id_gen;
mod record_store;

pub use id_gen::{IdGenerator, RandomIds, SequentialIds};
pub use record_store::{RecordStore, StoreError, StoreResult};
