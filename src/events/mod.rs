//! Local event relay and the cross-context lifecycle message bus.

pub mod message;
pub mod relay;

pub use message::{LifecycleEvent, LifecycleMessage};
pub use relay::{Event, EventHandler, EventOrigin, EventRelay, HandlerId, MessageBusSubscription};
