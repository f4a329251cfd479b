//! Todo domain object.
//!
//! # Responsibility
//! - Wrap one record's fields as typed attributes (`title`, `done`, `id`).
//! - Publish `Change` on every mutation and `Remove` on removal requests.
//! - Track the collection lifecycle (`Transient -> Bound -> Evicted`).
//!
//! # Invariants
//! - `Todo` is a shared handle; clones observe the same state and bus.
//! - Field borrows are released before any event is published, so handlers
//!   may read the object freely.
//! - An evicted todo rejects mutation and removal with
//!   `HandlerError::Evicted` and keeps its last state.

use crate::events::{Event, EventBus, HandlerError, HandlerResult, SubscriptionId};
use crate::model::record::{Record, RecordId};
use log::warn;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Persisted projection of a todo: `{ "title", "done", "id" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub title: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub id: Option<RecordId>,
}

impl TodoRecord {
    /// Decodes a raw record; missing `done`/`id` default to `false`/`None`.
    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record.clone().into_value())
    }

    pub fn into_record(self) -> Result<Record, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

/// Where a todo stands relative to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, not yet added; no id unless decoded from a record.
    Transient,
    /// Added to a collection; mutations are persisted through its binding.
    Bound,
    /// Dropped from a collection view; no binding remains.
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoTopic {
    Change,
    Remove,
}

/// Events published by a `Todo`; the payload is the emitting object.
#[derive(Debug, Clone)]
pub enum TodoEvent {
    Change(Todo),
    Remove(Todo),
}

impl TodoEvent {
    pub fn todo(&self) -> &Todo {
        match self {
            Self::Change(todo) | Self::Remove(todo) => todo,
        }
    }
}

impl Event for TodoEvent {
    type Topic = TodoTopic;

    fn topic(&self) -> TodoTopic {
        match self {
            Self::Change(_) => TodoTopic::Change,
            Self::Remove(_) => TodoTopic::Remove,
        }
    }

    fn topic_name(&self) -> &'static str {
        match self {
            Self::Change(_) => "change",
            Self::Remove(_) => "remove",
        }
    }
}

/// Subscriptions a collection holds on one todo.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Binding {
    pub(crate) change: SubscriptionId,
    pub(crate) remove: SubscriptionId,
}

struct TodoState {
    title: String,
    done: bool,
    id: Option<RecordId>,
}

struct TodoInner {
    state: RefCell<TodoState>,
    lifecycle: Cell<Lifecycle>,
    binding: Cell<Option<Binding>>,
    events: EventBus<TodoEvent>,
}

/// Typed todo wrapper with its own event bus.
#[derive(Clone)]
pub struct Todo {
    inner: Rc<TodoInner>,
}

impl Todo {
    /// Creates a transient, not-done todo without id.
    pub fn new(title: impl Into<String>) -> Self {
        Self::from_parts(title.into(), false, None)
    }

    /// Builds a transient todo from a raw record.
    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        Ok(Self::from_todo_record(TodoRecord::from_record(record)?))
    }

    pub fn from_todo_record(record: TodoRecord) -> Self {
        Self::from_parts(record.title, record.done, record.id)
    }

    fn from_parts(title: String, done: bool, id: Option<RecordId>) -> Self {
        Self {
            inner: Rc::new(TodoInner {
                state: RefCell::new(TodoState { title, done, id }),
                lifecycle: Cell::new(Lifecycle::Transient),
                binding: Cell::new(None),
                events: EventBus::new(),
            }),
        }
    }

    /// Current persisted projection.
    pub fn to_record(&self) -> TodoRecord {
        let state = self.inner.state.borrow();
        TodoRecord {
            title: state.title.clone(),
            done: state.done,
            id: state.id.clone(),
        }
    }

    pub fn title(&self) -> String {
        self.inner.state.borrow().title.clone()
    }

    pub fn done(&self) -> bool {
        self.inner.state.borrow().done
    }

    pub fn id(&self) -> Option<RecordId> {
        self.inner.state.borrow().id.clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Todo) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// # Errors
    /// - `HandlerError::Evicted` for evicted todos; the title is unchanged.
    pub fn set_title(&self, title: impl Into<String>) -> HandlerResult {
        self.ensure_live("change")?;
        self.inner.state.borrow_mut().title = title.into();
        self.publish_change()
    }

    pub fn set_done(&self, done: bool) -> HandlerResult {
        self.ensure_live("change")?;
        self.inner.state.borrow_mut().done = done;
        self.publish_change()
    }

    pub fn toggle(&self) -> HandlerResult {
        self.ensure_live("change")?;
        {
            let mut state = self.inner.state.borrow_mut();
            state.done = !state.done;
        }
        self.publish_change()
    }

    /// Requests removal; a bound collection evicts and deletes the record.
    ///
    /// # Errors
    /// - `HandlerError::Evicted` when the todo was already evicted.
    pub fn remove(&self) -> HandlerResult {
        self.ensure_live("remove")?;
        self.inner.events.publish(&TodoEvent::Remove(self.clone()))
    }

    /// Registers an observer on this todo's bus.
    pub fn subscribe(
        &self,
        topic: TodoTopic,
        handler: impl FnMut(&TodoEvent) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        self.inner.events.subscribe(topic, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn handler_count(&self, topic: TodoTopic) -> usize {
        self.inner.events.handler_count(topic)
    }

    fn ensure_live(&self, topic: &'static str) -> HandlerResult {
        if self.lifecycle() == Lifecycle::Evicted {
            warn!("event=todo_publish module=model status=rejected topic={topic} reason=evicted");
            return Err(HandlerError::Evicted { topic });
        }
        Ok(())
    }

    fn publish_change(&self) -> HandlerResult {
        self.inner.events.publish(&TodoEvent::Change(self.clone()))
    }

    pub(crate) fn set_id(&self, id: RecordId) {
        self.inner.state.borrow_mut().id = Some(id);
    }

    pub(crate) fn attach(&self, binding: Binding) {
        self.inner.binding.set(Some(binding));
        self.inner.lifecycle.set(Lifecycle::Bound);
    }

    /// Drops the collection binding and moves to `next`.
    pub(crate) fn detach(&self, next: Lifecycle) {
        if let Some(binding) = self.inner.binding.take() {
            self.inner.events.unsubscribe(binding.change);
            self.inner.events.unsubscribe(binding.remove);
        }
        self.inner.lifecycle.set(next);
    }
}

impl Debug for Todo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Todo")
            .field("title", &state.title)
            .field("done", &state.done)
            .field("id", &state.id)
            .field("lifecycle", &self.inner.lifecycle.get())
            .finish()
    }
}
