//! Event bus owned by one emitting object.

use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type HandlerResult = Result<(), HandlerError>;

/// Closed set of events emitted by one kind of object.
pub trait Event {
    type Topic: Copy + Eq;

    fn topic(&self) -> Self::Topic;

    /// Stable topic name used in logs and errors.
    fn topic_name(&self) -> &'static str;
}

/// Handle returned by `subscribe`, used to detach the handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Failure raised while publishing an event.
#[derive(Debug)]
pub enum HandlerError {
    /// `publish` was called again while this bus was still delivering.
    Reentrant { topic: &'static str },
    /// The emitter was evicted from its collection; nothing would persist.
    Evicted { topic: &'static str },
    /// A handler returned an error.
    Failed {
        topic: &'static str,
        source: Box<dyn Error + 'static>,
    },
}

impl HandlerError {
    pub fn failed(topic: &'static str, source: impl Error + 'static) -> Self {
        Self::Failed {
            topic,
            source: Box::new(source),
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            Self::Reentrant { topic } | Self::Evicted { topic } | Self::Failed { topic, .. } => {
                topic
            }
        }
    }

    /// Returns the handler's error when it has the requested type.
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        match self {
            Self::Failed { source, .. } => source.downcast_ref::<T>(),
            Self::Reentrant { .. } | Self::Evicted { .. } => None,
        }
    }
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reentrant { topic } => {
                write!(f, "reentrant publish of `{topic}` while delivering")
            }
            Self::Evicted { topic } => {
                write!(f, "`{topic}` rejected: object was evicted from its collection")
            }
            Self::Failed { topic, source } => write!(f, "`{topic}` handler failed: {source}"),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed { source, .. } => Some(source.as_ref()),
            Self::Reentrant { .. } | Self::Evicted { .. } => None,
        }
    }
}

type Handler<E> = Box<dyn FnMut(&E) -> HandlerResult>;

struct Subscription<E: Event> {
    id: SubscriptionId,
    topic: E::Topic,
    active: Cell<bool>,
    handler: RefCell<Handler<E>>,
}

/// Per-object event bus.
///
/// Handlers may call `unsubscribe` (including on themselves) and
/// `subscribe` while an event is being delivered; a handler detached
/// mid-delivery is skipped, and one added mid-delivery only sees later
/// events.
pub struct EventBus<E: Event> {
    subscriptions: RefCell<Vec<Rc<Subscription<E>>>>,
    next_id: Cell<u64>,
    delivering: Cell<bool>,
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscriptions: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            delivering: Cell::new(false),
        }
    }
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`.
    pub fn subscribe(
        &self,
        topic: E::Topic,
        handler: impl FnMut(&E) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Rc::new(Subscription {
            id,
            topic,
            active: Cell::new(true),
            handler: RefCell::new(Box::new(handler)),
        }));
        id
    }

    /// Detaches a handler. Returns `false` when it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        match subscriptions.iter().position(|sub| sub.id == id) {
            Some(index) => {
                subscriptions.remove(index).active.set(false);
                true
            }
            None => false,
        }
    }

    /// Number of handlers registered for `topic`.
    pub fn handler_count(&self, topic: E::Topic) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.topic == topic)
            .count()
    }

    /// Delivers `event` to every handler of its topic.
    ///
    /// # Errors
    /// - `HandlerError::Reentrant` when called from one of this bus's handlers.
    /// - The first handler error; later handlers are not invoked.
    pub fn publish(&self, event: &E) -> HandlerResult {
        let topic_name = event.topic_name();
        if self.delivering.get() {
            warn!("event=bus_publish module=events status=rejected topic={topic_name} reason=reentrant");
            return Err(HandlerError::Reentrant { topic: topic_name });
        }

        let topic = event.topic();
        let targets: Vec<_> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.topic == topic)
            .cloned()
            .collect();
        debug!(
            "event=bus_publish module=events status=start topic={topic_name} handlers={}",
            targets.len()
        );

        self.delivering.set(true);
        let result = targets
            .iter()
            .filter(|sub| sub.active.get())
            .try_for_each(|sub| {
                let mut handler = sub.handler.borrow_mut();
                (*handler)(event)
            });
        self.delivering.set(false);

        if let Err(err) = &result {
            warn!("event=bus_publish module=events status=error topic={topic_name} error={err}");
        }
        result
    }
}
