//! Event Publisher
//!
//! Validates an envelope, writes it to the audit log, then hands it to every
//! handler subscribed to its kind. Handler failures are isolated and reported;
//! they never undo the publish.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::application::bus::{Handled, HandlerRegistry, Subscriber};
use crate::application::services::IdempotencyError;
use crate::domain::events::{BusEvent, DomainEvent, EventEnvelope, EventKind};
use crate::domain::versioning::{MigrationError, VersionRegistry};
use crate::domain::{AuditAppend, EventAuditRecord, EventAuditRepository};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::validation::{describe, field_errors, FieldError};

/// Publish errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Invalid {event_type} envelope: {message}")]
    Validation {
        event_type: EventKind,
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("Audit write failed for event {event_id}: {source}")]
    Audit {
        event_id: Uuid,
        #[source]
        source: AppError,
    },

    #[error("Audit read failed: {0}")]
    AuditRead(#[source] AppError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event not found in audit log: {0}")]
    NotFound(Uuid),

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),
}

/// Result of one handler for one delivery.
#[derive(Debug)]
pub struct HandlerReport {
    pub handler_id: &'static str,
    pub result: Result<Handled, IdempotencyError>,
}

/// Outcome of dispatching one event to all of its handlers.
#[derive(Debug)]
pub struct DispatchReport {
    pub event_id: Uuid,
    pub event_type: EventKind,
    /// `None` for redeliveries and replays, which skip the audit write.
    pub audit: Option<AuditAppend>,
    pub handlers: Vec<HandlerReport>,
}

impl DispatchReport {
    pub fn outcome_of(&self, handler_id: &str) -> Option<&Result<Handled, IdempotencyError>> {
        self.handlers
            .iter()
            .find(|h| h.handler_id == handler_id)
            .map(|h| &h.result)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &IdempotencyError)> {
        self.handlers
            .iter()
            .filter_map(|h| h.result.as_ref().err().map(|e| (h.handler_id, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn executed_count(&self) -> usize {
        self.handlers
            .iter()
            .filter(|h| matches!(h.result, Ok(Handled::Executed)))
            .count()
    }
}

/// In-process publisher.
pub struct EventPublisher {
    handlers: Arc<HandlerRegistry>,
    audit: Arc<dyn EventAuditRepository>,
    versions: Arc<VersionRegistry>,
    concurrent: bool,
}

impl EventPublisher {
    pub fn new(
        handlers: Arc<HandlerRegistry>,
        audit: Arc<dyn EventAuditRepository>,
        versions: Arc<VersionRegistry>,
        concurrent: bool,
    ) -> Self {
        Self {
            handlers,
            audit,
            versions,
            concurrent,
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Publish a typed envelope and return its event id.
    ///
    /// Handler failures are logged and do not fail the publish; use
    /// [`publish_event`](Self::publish_event) to inspect them.
    pub async fn publish<E: DomainEvent>(
        &self,
        envelope: EventEnvelope<E>,
    ) -> Result<Uuid, PublishError> {
        let report = self.publish_event(envelope.into_bus()).await?;
        Ok(report.event_id)
    }

    /// Validate, audit, then dispatch.
    ///
    /// Nothing is dispatched when validation or the audit write fails. A
    /// second publish of the same event id is audited once and dispatched
    /// again; handlers deduplicate through the ledger.
    #[instrument(
        skip(self, event),
        fields(
            event_id = %event.event_id(),
            event_type = %event.kind(),
            correlation_id = ?event.metadata().correlation_id()
        )
    )]
    pub async fn publish_event(&self, event: BusEvent) -> Result<DispatchReport, PublishError> {
        self.validate(&event)?;

        let record = EventAuditRecord::from_event(&event)?;
        let appended = self
            .audit
            .append(&record)
            .await
            .map_err(|source| PublishError::Audit {
                event_id: record.event_id,
                source,
            })?;

        match appended {
            AuditAppend::Inserted => metrics::record_published(event.kind().as_str()),
            AuditAppend::Duplicate => info!("Event already audited, dispatching again"),
        }

        let mut report = self.dispatch(&event).await;
        report.audit = Some(appended);
        Ok(report)
    }

    /// Dispatch an already-audited event again.
    #[instrument(skip(self, event), fields(event_id = %event.event_id(), event_type = %event.kind()))]
    pub async fn redeliver(&self, event: &BusEvent) -> Result<DispatchReport, PublishError> {
        self.validate(event)?;
        Ok(self.dispatch(event).await)
    }

    /// Load an event from the audit log, migrate it to the current schema
    /// and dispatch it again.
    #[instrument(skip(self))]
    pub async fn replay(&self, event_id: Uuid) -> Result<DispatchReport, PublishError> {
        let record = self
            .audit
            .find_by_event_id(event_id)
            .await
            .map_err(|source| PublishError::Audit { event_id, source })?
            .ok_or(PublishError::NotFound(event_id))?;

        let event = self.rehydrate(record)?;
        self.redeliver(&event).await
    }

    /// Up to `limit` audited events of one aggregate, oldest first, each at
    /// the current schema version.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        limit: i64,
    ) -> Result<Vec<BusEvent>, PublishError> {
        self.audit
            .find_by_aggregate(aggregate_type, aggregate_id, limit)
            .await
            .map_err(PublishError::AuditRead)?
            .into_iter()
            .map(|record| self.rehydrate(record))
            .collect()
    }

    /// Rebuild a bus event at the current schema version from its audit record.
    pub fn rehydrate(&self, record: EventAuditRecord) -> Result<BusEvent, PublishError> {
        let kind = record.event_type;
        let current = self
            .versions
            .current_version(kind)
            .unwrap_or_else(|| kind.schema_version());

        let metadata = record.event_metadata().at_version(current);
        let payload = if record.event_version == current {
            record.payload
        } else {
            let migrated =
                self.versions
                    .migrate(kind, record.payload, record.event_version, current);
            metrics::record_migration(kind.as_str(), migrated.is_ok());
            migrated?
        };

        Ok(BusEvent::from_parts(metadata, payload)?)
    }

    fn validate(&self, event: &BusEvent) -> Result<(), PublishError> {
        event.validate().map_err(|errors| {
            let message = describe(&errors);
            metrics::record_validation_rejection(event.kind().as_str());
            warn!(error = %message, "Rejected invalid envelope");
            PublishError::Validation {
                event_type: event.kind(),
                message,
                fields: field_errors(&errors),
            }
        })
    }

    async fn dispatch(&self, event: &BusEvent) -> DispatchReport {
        let subscribers = self.handlers.subscribers_for(event.kind());

        let handlers = if self.concurrent {
            join_all(subscribers.iter().map(|s| deliver(s.as_ref(), event))).await
        } else {
            let mut reports = Vec::with_capacity(subscribers.len());
            for subscriber in subscribers {
                reports.push(deliver(subscriber.as_ref(), event).await);
            }
            reports
        };

        DispatchReport {
            event_id: event.event_id(),
            event_type: event.kind(),
            audit: None,
            handlers,
        }
    }
}

async fn deliver(subscriber: &dyn Subscriber, event: &BusEvent) -> HandlerReport {
    let handler_id = subscriber.handler_id();
    let result = subscriber.deliver(event).await;

    if let Err(e) = &result {
        if !matches!(e, IdempotencyError::HandlerFailure { .. }) {
            metrics::record_handler_outcome(handler_id, e.kind());
        }
        error!(
            handler_id,
            error = %e,
            retryable = e.is_retryable(),
            "Handler failed, other handlers unaffected"
        );
    }

    HandlerReport { handler_id, result }
}
