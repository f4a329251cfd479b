//! Typed, synchronous publish/subscribe.
//!
//! # Responsibility
//! - Deliver closed-enum events to handlers registered per topic.
//!
//! # Invariants
//! - Delivery is synchronous, on the calling thread, in registration order.
//! - The first failing handler stops delivery and its error propagates.
//! - Reentrant publish on the same bus is rejected.

mod bus;

pub use bus::{Event, EventBus, HandlerError, HandlerResult, SubscriptionId};
