//! Event bus port: publish/subscribe for domain events.

use std::sync::Arc;

use devlink_domain::error::DevlinkError;
use devlink_domain::event::Event;

/// Publishes domain events to interested subscribers.
///
/// Publishing is synchronous: it is called from inside command lifecycle
/// transitions and state mutations, which never yield.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all current subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error when the event could not be handed over.
    fn publish(&self, event: Event) -> Result<(), DevlinkError>;
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, event: Event) -> Result<(), DevlinkError> {
        (**self).publish(event)
    }
}

/// Type-erased publisher shared by the dispatcher, command handles and the
/// state store.
pub type SharedPublisher = Arc<dyn EventPublisher>;
