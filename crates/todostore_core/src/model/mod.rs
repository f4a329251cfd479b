//! Domain model for persisted records and the todo projection.
//!
//! # Responsibility
//! - Define the raw `Record` shape the store persists.
//! - Define the `Todo` domain object and the events it emits.
//!
//! # Invariants
//! - `id` is the only reserved record field.
//! - A record id is never reused for another live object.

pub mod record;
pub mod todo;
