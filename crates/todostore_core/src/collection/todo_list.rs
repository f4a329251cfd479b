//! `TodoList`: todos bound to a record store.
//!
//! Binding wires two handlers onto each todo's bus: `Change` runs the store
//! update with the todo's current projection, `Remove` runs the list's own
//! removal path. Handlers hold a weak reference to the list, so a dropped
//! list never keeps itself alive through its todos.

use crate::config::StoreConfig;
use crate::events::{Event, EventBus, HandlerError, HandlerResult, SubscriptionId};
use crate::model::record::RecordId;
use crate::model::todo::{Binding, Lifecycle, Todo, TodoEvent, TodoTopic};
use crate::slot::SlotProvider;
use crate::store::{IdGenerator, RandomIds, RecordStore, StoreError};
use log::{debug, info};
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};

pub type ListResult<T> = Result<T, ListError>;

/// Collection-level error.
#[derive(Debug)]
pub enum ListError {
    Store(StoreError),
    Handler(HandlerError),
    /// A persisted record could not be read as a todo.
    InvalidRecord {
        id: Option<RecordId>,
        source: serde_json::Error,
    },
    /// A todo projection could not be encoded as a record.
    Encode(serde_json::Error),
    /// Todo is already bound to a collection.
    AlreadyBound,
    /// Todo is not part of this collection's view.
    NotBound,
    /// Todo was evicted and cannot be added again.
    Evicted,
    /// The store is lent out through `with_store` and cannot be written.
    StoreBusy,
}

impl Display for ListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Handler(err) => write!(f, "{err}"),
            Self::InvalidRecord { id, source } => match id {
                Some(id) => write!(f, "record {id} is not a valid todo: {source}"),
                None => write!(f, "record is not a valid todo: {source}"),
            },
            Self::Encode(err) => write!(f, "failed to encode todo: {err}"),
            Self::AlreadyBound => write!(f, "todo is already bound to a collection"),
            Self::NotBound => write!(f, "todo is not in this collection"),
            Self::Evicted => write!(f, "todo was evicted and cannot be re-added"),
            Self::StoreBusy => write!(f, "store is borrowed; write from outside `with_store`"),
        }
    }
}

impl Error for ListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Handler(err) => Some(err),
            Self::InvalidRecord { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            Self::AlreadyBound | Self::NotBound | Self::Evicted | Self::StoreBusy => None,
        }
    }
}

impl From<StoreError> for ListError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<HandlerError> for ListError {
    fn from(value: HandlerError) -> Self {
        Self::Handler(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTopic {
    Add,
    Refresh,
}

/// Events published by a `TodoList`.
#[derive(Debug, Clone)]
pub enum ListEvent {
    /// A todo was persisted and appended; payload is the todo.
    Add(Todo),
    /// The view was rebuilt (remove, refresh, clear).
    Refresh,
}

impl Event for ListEvent {
    type Topic = ListTopic;

    fn topic(&self) -> ListTopic {
        match self {
            Self::Add(_) => ListTopic::Add,
            Self::Refresh => ListTopic::Refresh,
        }
    }

    fn topic_name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Refresh => "refresh",
        }
    }
}

struct ListShared<P: SlotProvider, G: IdGenerator> {
    store: RefCell<RecordStore<P, G>>,
    items: RefCell<Vec<Todo>>,
    events: EventBus<ListEvent>,
}

/// Ordered, auto-persisting view of todos.
///
/// Not thread-safe: todos and the list share state through `Rc`.
pub struct TodoList<P: SlotProvider + 'static, G: IdGenerator + 'static = RandomIds> {
    shared: Rc<ListShared<P, G>>,
}

impl<P: SlotProvider + 'static> TodoList<P, Box<dyn IdGenerator>> {
    /// Opens a store from configuration and loads its todos.
    pub fn open_with_config(config: &StoreConfig, slots: P) -> ListResult<Self> {
        Self::open(RecordStore::from_config(config, slots)?)
    }
}

impl<P: SlotProvider + 'static, G: IdGenerator + 'static> TodoList<P, G> {
    /// Wraps `store` and builds the view from its records.
    pub fn open(store: RecordStore<P, G>) -> ListResult<Self> {
        let list = Self {
            shared: Rc::new(ListShared {
                store: RefCell::new(store),
                items: RefCell::new(Vec::new()),
                events: EventBus::new(),
            }),
        };
        list.refresh()?;
        Ok(list)
    }

    pub fn all(&self) -> Vec<Todo> {
        self.shared.items.borrow().clone()
    }

    pub fn size(&self) -> usize {
        self.shared.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.items.borrow().is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<Todo> {
        self.shared
            .items
            .borrow()
            .iter()
            .find(|todo| todo.id().as_ref() == Some(id))
            .cloned()
    }

    /// Read access to the backing store.
    ///
    /// Writes attempted from inside `read` (todo mutations, `create`,
    /// `remove`, `clear`) fail with `ListError::StoreBusy`.
    pub fn with_store<R>(&self, read: impl FnOnce(&RecordStore<P, G>) -> R) -> R {
        read(&self.shared.store.borrow())
    }

    pub fn subscribe(
        &self,
        topic: ListTopic,
        handler: impl FnMut(&ListEvent) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe(topic, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Creates a todo titled `title` and adds it.
    pub fn create(&self, title: impl Into<String>) -> ListResult<Todo> {
        self.add(Todo::new(title))
    }

    /// Binds, persists and appends `todo`, then publishes `Add`.
    ///
    /// # Errors
    /// - `AlreadyBound`/`Evicted` for todos that are not transient.
    /// - `Store` when persistence fails; the todo is left transient.
    /// - `Handler` when an `Add` subscriber fails (the todo stays added).
    pub fn add(&self, todo: Todo) -> ListResult<Todo> {
        match todo.lifecycle() {
            Lifecycle::Transient => {}
            Lifecycle::Bound => return Err(ListError::AlreadyBound),
            Lifecycle::Evicted => return Err(ListError::Evicted),
        }

        ListShared::bind(&self.shared, &todo);
        let persisted = todo
            .to_record()
            .into_record()
            .map_err(ListError::Encode)
            .and_then(|record| {
                self.shared
                    .store_mut()?
                    .add(record)
                    .map_err(ListError::from)
            });
        let id = match persisted {
            Ok(id) => id,
            Err(err) => {
                todo.detach(Lifecycle::Transient);
                return Err(err);
            }
        };

        todo.set_id(id.clone());
        self.shared.items.borrow_mut().push(todo.clone());
        debug!("event=todo_add module=collection status=ok id={id}");

        self.shared.events.publish(&ListEvent::Add(todo.clone()))?;
        Ok(todo)
    }

    /// Deletes `todo` from the store and evicts it from the view.
    pub fn remove(&self, todo: &Todo) -> ListResult<()> {
        self.shared.remove(todo)
    }

    /// Rebuilds every todo from the store's records.
    ///
    /// Previously held todos are evicted; use `all()` for the new handles.
    pub fn refresh(&self) -> ListResult<()> {
        let records = self.shared.store.borrow().all();
        let fresh = records
            .iter()
            .map(|record| {
                Todo::from_record(record).map_err(|source| ListError::InvalidRecord {
                    id: record.id(),
                    source,
                })
            })
            .collect::<ListResult<Vec<_>>>()?;

        for todo in &fresh {
            ListShared::bind(&self.shared, todo);
        }
        let stale = std::mem::replace(&mut *self.shared.items.borrow_mut(), fresh);
        for todo in &stale {
            todo.detach(Lifecycle::Evicted);
        }

        info!(
            "event=collection_refresh module=collection status=ok todos={}",
            self.size()
        );
        self.shared.events.publish(&ListEvent::Refresh)?;
        Ok(())
    }

    /// Clears the store's slot and empties the view.
    pub fn clear(&self) -> ListResult<()> {
        self.shared.store_mut()?.clear()?;
        let stale = std::mem::take(&mut *self.shared.items.borrow_mut());
        for todo in &stale {
            todo.detach(Lifecycle::Evicted);
        }

        info!(
            "event=collection_clear module=collection status=ok evicted={}",
            stale.len()
        );
        self.shared.events.publish(&ListEvent::Refresh)?;
        Ok(())
    }
}

impl<P: SlotProvider + 'static, G: IdGenerator + 'static> ListShared<P, G> {
    fn bind(shared: &Rc<Self>, todo: &Todo) {
        let on_change = Rc::downgrade(shared);
        let change = todo.subscribe(TodoTopic::Change, move |event: &TodoEvent| {
            with_live(&on_change, |list| list.persist(event.todo()), "change")
        });
        let on_remove = Rc::downgrade(shared);
        let remove = todo.subscribe(TodoTopic::Remove, move |event: &TodoEvent| {
            with_live(&on_remove, |list| list.remove(event.todo()), "remove")
        });
        todo.attach(Binding { change, remove });
    }

    fn store_mut(&self) -> ListResult<RefMut<'_, RecordStore<P, G>>> {
        self.store.try_borrow_mut().map_err(|_| ListError::StoreBusy)
    }

    fn persist(&self, todo: &Todo) -> ListResult<()> {
        let record = todo.to_record().into_record().map_err(ListError::Encode)?;
        self.store_mut()?.update(record)?;
        Ok(())
    }

    fn remove(&self, todo: &Todo) -> ListResult<()> {
        if !self.items.borrow().iter().any(|item| item.ptr_eq(todo)) {
            return Err(ListError::NotBound);
        }
        let id = todo.id().ok_or(ListError::NotBound)?;

        let order = {
            let mut store = self.store_mut()?;
            store.remove_by_id(&id)?;
            store.ids()
        };
        {
            let mut items = self.items.borrow_mut();
            let mut by_key: HashMap<String, Todo> = items
                .drain(..)
                .filter_map(|item| item.id().map(|item_id| (item_id.key(), item)))
                .collect();
            items.extend(order.iter().filter_map(|id| by_key.remove(&id.key())));
            for leftover in by_key.into_values() {
                leftover.detach(Lifecycle::Evicted);
            }
        }
        todo.detach(Lifecycle::Evicted);

        debug!("event=todo_remove module=collection status=ok id={id}");
        self.events.publish(&ListEvent::Refresh)?;
        Ok(())
    }
}

impl<P: SlotProvider, G: IdGenerator> Drop for ListShared<P, G> {
    fn drop(&mut self) {
        for todo in self.items.get_mut().drain(..) {
            todo.detach(Lifecycle::Evicted);
        }
    }
}

fn with_live<P: SlotProvider, G: IdGenerator>(
    list: &Weak<ListShared<P, G>>,
    run: impl FnOnce(&ListShared<P, G>) -> ListResult<()>,
    topic: &'static str,
) -> HandlerResult {
    match list.upgrade() {
        Some(list) => run(&list).map_err(|err| HandlerError::failed(topic, err)),
        None => Ok(()),
    }
}
