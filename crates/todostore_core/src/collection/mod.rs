//! Observable todo collection.
//!
//! # Responsibility
//! - Keep an ordered view of `Todo` objects in sync with a `RecordStore`.
//! - Persist todo mutations through event bindings, without explicit saves.
//!
//! # Invariants
//! - Every todo in the view is `Bound` and its id is a key of the store.
//! - View order follows the store's table order.
//! - Evicted todos carry no binding, so they cannot write to the store.

mod todo_list;

pub use todo_list::{ListError, ListEvent, ListResult, ListTopic, TodoList};
