use serde_json::json;
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use todostore_core::slot::SlotResult;
use todostore_core::{
    HandlerError, IdStrategy, Lifecycle, ListError, ListEvent, ListTopic, MemorySlots, Record,
    RecordId, RecordStore, SequentialIds, SlotError, SlotProvider, StoreConfig, StoreError, Todo,
    TodoList, TodoTopic,
};

type MemoryList = TodoList<&'static MemorySlots>;

fn open_list(slots: &'static MemorySlots) -> MemoryList {
    TodoList::open(RecordStore::open("todo", slots).unwrap()).unwrap()
}

fn leaked_slots() -> &'static MemorySlots {
    Box::leak(Box::new(MemorySlots::new()))
}

fn stored(slots: &MemorySlots) -> Vec<serde_json::Value> {
    RecordStore::open("todo", slots)
        .unwrap()
        .all()
        .into_iter()
        .map(Record::into_value)
        .collect()
}

/// Memory slots whose writes can be switched off.
#[derive(Default)]
struct FlakySlots {
    inner: MemorySlots,
    fail_writes: Cell<bool>,
}

impl SlotProvider for FlakySlots {
    fn read(&self, key: &str) -> SlotResult<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> SlotResult<()> {
        if self.fail_writes.get() {
            return Err(SlotError::InvalidKey(key.to_string()));
        }
        self.inner.write(key, value)
    }

    fn delete(&self, key: &str) -> SlotResult<()> {
        self.inner.delete(key)
    }
}

#[derive(Debug)]
struct Veto;

impl Display for Veto {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("vetoed")
    }
}

impl Error for Veto {}

#[test]
fn create_persists_a_record_with_an_id() {
    let slots = leaked_slots();
    let todos = open_list(slots);

    let todo = todos.create("x").unwrap();

    assert_eq!(todos.size(), 1);
    assert!(todo.id().is_some());
    assert_eq!(todo.lifecycle(), Lifecycle::Bound);
    assert!(todos.all()[0].ptr_eq(&todo));

    let fresh = RecordStore::open("todo", slots).unwrap();
    assert_eq!(fresh.size(), 1);
    assert_eq!(fresh.all()[0].field("title"), Some(&json!("x")));
    assert_eq!(fresh.all()[0].field("done"), Some(&json!(false)));
}

#[test]
fn add_binds_existing_object_and_publishes_add() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let added = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&added);
    todos.subscribe(ListTopic::Add, move |event| {
        if let ListEvent::Add(todo) = event {
            sink.borrow_mut().push(todo.clone());
        }
        Ok(())
    });

    let todo = Todo::new("item");
    let returned = todos.add(todo.clone()).unwrap();

    assert!(returned.ptr_eq(&todo));
    assert!(todo.id().is_some());
    assert_eq!(todo.handler_count(TodoTopic::Change), 1);
    assert_eq!(todo.handler_count(TodoTopic::Remove), 1);
    assert_eq!(added.borrow().len(), 1);
    assert!(added.borrow()[0].ptr_eq(&todo));
    assert_eq!(todos.get(&todo.id().unwrap()).map(|t| t.title()), Some("item".to_string()));
}

#[test]
fn mutations_are_saved_without_explicit_update() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let todo = todos.create("item").unwrap();
    let id = todo.id().unwrap();

    todo.toggle().unwrap();
    assert_eq!(
        stored(slots),
        vec![json!({ "title": "item", "done": true, "id": id.to_value() })]
    );

    todo.set_title("renamed").unwrap();
    todo.set_done(false).unwrap();
    let record = todos.with_store(|store| store.get(&id)).unwrap();
    assert_eq!(record.field("title"), Some(&json!("renamed")));
    assert_eq!(record.field("done"), Some(&json!(false)));
    assert_eq!(stored(slots)[0]["title"], json!("renamed"));
}

#[test]
fn all_keeps_creation_order() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let first = todos.create("item").unwrap();
    let second = todos.create("item 2").unwrap();

    let all = todos.all();
    assert_eq!(all.len(), 2);
    assert!(all[0].ptr_eq(&first));
    assert!(all[1].ptr_eq(&second));
}

#[test]
fn removal_from_collection_and_from_object_reach_same_state() {
    let by_list_slots = leaked_slots();
    let by_list = open_list(by_list_slots);
    let a = by_list.create("item").unwrap();
    let b = by_list.create("item 2").unwrap();
    by_list.remove(&a).unwrap();

    let by_object_slots = leaked_slots();
    let by_object = open_list(by_object_slots);
    let c = by_object.create("item").unwrap();
    let d = by_object.create("item 2").unwrap();
    c.remove().unwrap();

    for (list, slots, removed, kept) in [
        (&by_list, by_list_slots, &a, &b),
        (&by_object, by_object_slots, &c, &d),
    ] {
        assert_eq!(list.size(), 1);
        assert!(list.all()[0].ptr_eq(kept));
        assert_eq!(list.all()[0].to_record(), kept.to_record());
        assert_eq!(removed.lifecycle(), Lifecycle::Evicted);
        assert_eq!(removed.handler_count(TodoTopic::Change), 0);
        assert!(!list.with_store(|store| store.contains(&removed.id().unwrap())));
        assert_eq!(stored(slots).len(), 1);
        assert_eq!(stored(slots)[0]["title"], json!("item 2"));
    }
}

#[test]
fn removal_publishes_refresh() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let refreshes = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&refreshes);
    todos.subscribe(ListTopic::Refresh, move |_| {
        *counter.borrow_mut() += 1;
        Ok(())
    });

    let todo = todos.create("item 1").unwrap();
    assert_eq!(todos.size(), 1);
    todo.remove().unwrap();

    assert_eq!(todos.size(), 0);
    assert_eq!(*refreshes.borrow(), 1);
}

#[test]
fn evicted_todo_cannot_resurrect_its_record() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let todo = todos.create("gone").unwrap();
    todos.remove(&todo).unwrap();

    assert!(matches!(
        todo.toggle(),
        Err(HandlerError::Evicted { topic: "change" })
    ));
    assert!(matches!(
        todo.remove(),
        Err(HandlerError::Evicted { topic: "remove" })
    ));

    assert!(!todo.done());
    assert!(stored(slots).is_empty());
    assert!(matches!(todos.add(todo.clone()), Err(ListError::Evicted)));
    assert!(matches!(todos.remove(&todo), Err(ListError::NotBound)));
}

#[test]
fn adding_a_bound_todo_twice_is_rejected() {
    let first = open_list(leaked_slots());
    let second = open_list(leaked_slots());
    let todo = first.create("once").unwrap();

    assert!(matches!(first.add(todo.clone()), Err(ListError::AlreadyBound)));
    assert!(matches!(second.add(todo.clone()), Err(ListError::AlreadyBound)));
    assert!(matches!(second.remove(&todo), Err(ListError::NotBound)));
    assert_eq!(first.size(), 1);
    assert_eq!(second.size(), 0);
}

#[test]
fn refresh_rebuilds_todos_from_store_and_evicts_old_handles() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let old = todos.create("a").unwrap();
    todos.create("b").unwrap();

    let refreshes = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&refreshes);
    todos.subscribe(ListTopic::Refresh, move |_| {
        *counter.borrow_mut() += 1;
        Ok(())
    });

    todos.refresh().unwrap();

    assert_eq!(*refreshes.borrow(), 1);
    assert_eq!(old.lifecycle(), Lifecycle::Evicted);
    let titles: Vec<_> = todos.all().iter().map(Todo::title).collect();
    assert_eq!(titles, vec!["a", "b"]);

    let rebuilt = todos.get(&old.id().unwrap()).unwrap();
    assert!(!rebuilt.ptr_eq(&old));
    assert_eq!(rebuilt.lifecycle(), Lifecycle::Bound);

    assert!(matches!(old.toggle(), Err(HandlerError::Evicted { .. })));
    assert!(!old.done());
    assert_eq!(stored(slots)[0]["done"], json!(false));
    rebuilt.toggle().unwrap();
    assert_eq!(stored(slots)[0]["done"], json!(true));
}

#[test]
fn open_loads_persisted_todos_with_defaults() {
    let slots = leaked_slots();
    slots
        .write("todo", r#"{"a":{"title":"bare","id":"a"},"b":{"title":"done","done":true,"id":"b"}}"#)
        .unwrap();

    let todos = open_list(slots);
    let all = todos.all();
    assert_eq!(all.len(), 2);
    assert!(!all[0].done());
    assert_eq!(all[0].id(), Some(RecordId::from("a")));
    assert!(all[1].done());
}

#[test]
fn open_rejects_records_that_are_not_todos() {
    let slots = leaked_slots();
    slots.write("todo", r#"{"1":{"done":true,"id":1}}"#).unwrap();

    let err = TodoList::open(RecordStore::open("todo", slots).unwrap())
        .err()
        .unwrap();
    assert!(matches!(err, ListError::InvalidRecord { id: Some(RecordId::Seq(1)), .. }));
}

#[test]
fn clear_empties_view_and_slot() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let todo = todos.create("a").unwrap();
    todos.create("b").unwrap();

    todos.clear().unwrap();

    assert_eq!(todos.size(), 0);
    assert!(todos.is_empty());
    assert!(!slots.contains_key("todo"));
    assert_eq!(todo.lifecycle(), Lifecycle::Evicted);
    assert_eq!(RecordStore::open("todo", slots).unwrap().size(), 0);
}

#[test]
fn add_handler_failure_propagates_after_persisting() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    todos.subscribe(ListTopic::Add, |_| Err(HandlerError::failed("add", Veto)));

    let err = todos.create("kept").unwrap_err();
    match err {
        ListError::Handler(handler) => {
            assert_eq!(handler.topic(), "add");
            assert!(handler.downcast_ref::<Veto>().is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(todos.size(), 1);
    assert_eq!(stored(slots).len(), 1);
}

#[test]
fn failing_observer_stops_later_handlers() {
    let slots = leaked_slots();
    let todos = open_list(slots);

    // Observer registered before binding runs first and blocks the save.
    let early = Todo::new("early");
    early.subscribe(TodoTopic::Change, |_| Err(HandlerError::failed("change", Veto)));
    todos.add(early.clone()).unwrap();
    assert!(early.toggle().is_err());
    assert_eq!(stored(slots)[0]["done"], json!(false));

    // Observer registered after binding runs after the save.
    let late = todos.create("late").unwrap();
    late.subscribe(TodoTopic::Change, |_| Err(HandlerError::failed("change", Veto)));
    assert!(late.toggle().is_err());
    assert_eq!(stored(slots)[1]["done"], json!(true));
}

#[test]
fn store_errors_surface_through_the_change_handler() {
    let slots = Rc::new(FlakySlots::default());
    let todos = TodoList::open(RecordStore::open("todo", Rc::clone(&slots)).unwrap()).unwrap();
    let todo = todos.create("fragile").unwrap();

    slots.fail_writes.set(true);
    let err = todo.toggle().unwrap_err();
    assert_eq!(err.topic(), "change");
    assert!(matches!(
        err.downcast_ref::<ListError>(),
        Some(ListError::Store(StoreError::Slot(_)))
    ));

    let record = todos.with_store(|store| store.get(&todo.id().unwrap())).unwrap();
    assert_eq!(record.field("done"), Some(&json!(false)));

    let missing = Todo::new("never stored");
    assert!(matches!(todos.remove(&missing), Err(ListError::NotBound)));
}

#[test]
fn reentrant_publish_on_the_list_is_rejected() {
    let slots = leaked_slots();
    let todos = Rc::new(open_list(slots));
    let nested = Rc::new(RefCell::new(None));

    let inner = Rc::downgrade(&todos);
    let slot = Rc::clone(&nested);
    todos.subscribe(ListTopic::Refresh, move |_| {
        if let Some(list) = inner.upgrade() {
            *slot.borrow_mut() = Some(list.refresh());
        }
        Ok(())
    });

    todos.refresh().unwrap();
    let nested = nested.borrow_mut().take().expect("handler ran");
    assert!(matches!(
        nested,
        Err(ListError::Handler(HandlerError::Reentrant { topic: "refresh" }))
    ));
}

#[test]
fn open_with_config_uses_sequential_ids() {
    let slots = leaked_slots();
    let config = StoreConfig::default()
        .with_namespace("seq.todos")
        .with_id_strategy(IdStrategy::Sequential);
    let todos = TodoList::open_with_config(&config, slots).unwrap();

    assert_eq!(todos.create("a").unwrap().id(), Some(RecordId::Seq(1)));
    assert_eq!(todos.create("b").unwrap().id(), Some(RecordId::Seq(2)));
    assert!(slots.contains_key("seq.todos"));
}

#[test]
fn custom_generator_is_used_by_the_list() {
    let slots = leaked_slots();
    let store = RecordStore::open_with("todo", slots, SequentialIds::new()).unwrap();
    let todos = TodoList::open(store).unwrap();

    let todo = todos.create("first").unwrap();
    assert_eq!(todo.id(), Some(RecordId::Seq(1)));
    assert_eq!(stored(slots), vec![json!({ "title": "first", "done": false, "id": 1 })]);
}

#[test]
fn dropping_the_list_detaches_its_todos() {
    let slots = leaked_slots();
    let todo = {
        let todos = open_list(slots);
        todos.create("orphan").unwrap()
    };

    assert_eq!(todo.lifecycle(), Lifecycle::Evicted);
    assert_eq!(todo.handler_count(TodoTopic::Change), 0);
    assert!(matches!(todo.toggle(), Err(HandlerError::Evicted { .. })));
    assert_eq!(stored(slots)[0]["done"], json!(false));
}

#[test]
fn writes_from_inside_with_store_fail_instead_of_panicking() {
    let slots = leaked_slots();
    let todos = open_list(slots);
    let todo = todos.create("busy").unwrap();

    let (toggled, created, cleared) = todos.with_store(|store| {
        assert_eq!(store.size(), 1);
        (todo.toggle(), todos.create("nested"), todos.clear())
    });

    let toggled = toggled.unwrap_err();
    assert_eq!(toggled.topic(), "change");
    assert!(matches!(
        toggled.downcast_ref::<ListError>(),
        Some(ListError::StoreBusy)
    ));
    assert!(matches!(created, Err(ListError::StoreBusy)));
    assert!(matches!(cleared, Err(ListError::StoreBusy)));
    assert!(matches!(
        todos.with_store(|_| todos.remove(&todo)),
        Err(ListError::StoreBusy)
    ));

    assert_eq!(todos.size(), 1);
    assert_eq!(stored(slots).len(), 1);
    assert_eq!(stored(slots)[0]["done"], json!(false));

    todo.set_done(true).unwrap();
    assert_eq!(stored(slots)[0]["done"], json!(true));
}
