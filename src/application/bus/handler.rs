//! Typed event handler trait.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::services::IdempotencyError;
use crate::domain::events::{BusEvent, DomainEvent, EventEnvelope};

/// What a handler did with one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// The listener's work ran and was recorded as `SUCCESS`.
    Executed,
    /// An earlier delivery already succeeded; nothing ran.
    AlreadyProcessed,
    /// The work failed and the listener's lenient policy swallowed it.
    Suppressed(String),
}

impl Handled {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handled::Executed => "executed",
            Handled::AlreadyProcessed => "skipped",
            Handled::Suppressed(_) => "suppressed",
        }
    }
}

/// Reaction of one listener to one event type.
///
/// A listener implements this once per event type it cares about; every
/// implementation shares the listener's handler id and therefore one ledger
/// track per event.
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync + 'static {
    /// Stable id used as the ledger key and metric label.
    fn handler_id(&self) -> &'static str;

    async fn handle(&self, envelope: &EventEnvelope<E>) -> Result<Handled, IdempotencyError>;
}

/// Handler with its event type erased, as stored in the registry.
#[async_trait]
pub(crate) trait Subscriber: Send + Sync {
    fn handler_id(&self) -> &'static str;

    async fn deliver(&self, event: &BusEvent) -> Result<Handled, IdempotencyError>;
}

pub(crate) struct TypedSubscriber<E, H> {
    handler: Arc<H>,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> TypedSubscriber<E, H> {
    pub(crate) fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> Subscriber for TypedSubscriber<E, H>
where
    E: DomainEvent,
    H: EventHandler<E>,
{
    fn handler_id(&self) -> &'static str {
        self.handler.handler_id()
    }

    async fn deliver(&self, event: &BusEvent) -> Result<Handled, IdempotencyError> {
        match E::from_bus(event) {
            Some(envelope) => self.handler.handle(envelope).await,
            // registry only routes matching kinds here
            None => Err(IdempotencyError::HandlerFailure {
                event_id: event.event_id(),
                handler_id: self.handler.handler_id().to_string(),
                message: format!("cannot handle {}", event.kind()),
            }),
        }
    }
}
