//! Handler registry keyed by event kind.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::handler::{EventHandler, Subscriber, TypedSubscriber};
use crate::domain::events::{DomainEvent, EventKind};
use crate::domain::versioning::RegistrationError;

/// Subscriptions per [`EventKind`], populated at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    subscribers: HashMap<EventKind, Vec<Arc<dyn Subscriber>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events of type `E`.
    ///
    /// # Errors
    ///
    /// `DuplicateHandler` when a handler with the same id already listens to
    /// `E`; two tracks with one id would share ledger entries.
    pub fn subscribe<E, H>(&mut self, handler: Arc<H>) -> Result<(), RegistrationError>
    where
        E: DomainEvent,
        H: EventHandler<E>,
    {
        let handler_id = EventHandler::<E>::handler_id(handler.as_ref());
        let subscribers = self.subscribers.entry(E::KIND).or_default();

        if subscribers.iter().any(|s| s.handler_id() == handler_id) {
            return Err(RegistrationError::DuplicateHandler {
                event_type: E::KIND,
                handler_id: handler_id.to_string(),
            });
        }

        debug!(event_type = %E::KIND, handler_id, "Subscribed handler");
        subscribers.push(Arc::new(TypedSubscriber::<E, H>::new(handler)));
        Ok(())
    }

    pub(crate) fn subscribers_for(&self, kind: EventKind) -> &[Arc<dyn Subscriber>] {
        self.subscribers
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Handler ids listening to `kind`, in subscription order.
    pub fn handler_ids(&self, kind: EventKind) -> Vec<&'static str> {
        self.subscribers_for(kind)
            .iter()
            .map(|s| s.handler_id())
            .collect()
    }

    /// Total number of (kind, handler) subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            let ids = self.handler_ids(kind);
            if !ids.is_empty() {
                map.entry(&kind.as_str(), &ids);
            }
        }
        map.finish()
    }
}
