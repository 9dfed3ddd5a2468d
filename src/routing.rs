//! Message routing between the platform event loop and raw event handlers
//!
//! The host owns a [`MessageRouter`]. Controllers register their decoder on
//! attach and remove it on detach; the decoder never sees the event loop.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::controller::event_collector::{RawDeviceEvent, RawEventHandler};

/// Registration ticket returned by [`MessageRouter::add_handler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// External message-routing collaborator
pub trait MessageRouter: Send + Sync {
    fn add_handler(&self, handler: Arc<dyn RawEventHandler>) -> HandlerId;

    /// Returns `false` when `id` was not registered.
    fn remove_handler(&self, id: HandlerId) -> bool;
}

#[derive(Debug, Default)]
struct Registrations {
    next_id: u64,
    handlers: Vec<(HandlerId, Arc<dyn RawEventHandler>)>,
}

/// In-process router offering every event to all registered handlers
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    inner: Mutex<Registrations>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers `event` to every handler in registration order.
    ///
    /// Consumption does not stop delivery; other handlers still see the event.
    /// Returns whether any handler consumed it.
    pub fn route(&self, event: &RawDeviceEvent) -> bool {
        let handlers: Vec<Arc<dyn RawEventHandler>> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        if handlers.is_empty() {
            debug!("No handler registered, dropping {:?}", event);
            return false;
        }

        handlers
            .iter()
            .fold(false, |consumed, handler| handler.handle(event) || consumed)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageRouter for HandlerRegistry {
    fn add_handler(&self, handler: Arc<dyn RawEventHandler>) -> HandlerId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.push((id, handler));
        info!("Registered raw event {}", id);
        id
    }

    fn remove_handler(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.handlers.len();
        inner.handlers.retain(|(registered, _)| *registered != id);
        let removed = inner.handlers.len() != before;
        if removed {
            info!("Removed raw event {}", id);
        } else {
            warn!("Tried to remove unknown {}", id);
        }
        removed
    }
}
