//! Event audit record and repository trait.
//!
//! Maps to the `event_audit_log` table. One row per published event, written
//! before dispatch; used for replay and for rebuilding one aggregate's history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::events::{BusEvent, EventKind, EventMetadata};
use crate::shared::error::AppError;

/// Persisted copy of a published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAuditRecord {
    pub event_id: Uuid,
    pub event_type: EventKind,
    /// Schema version the payload was authored at.
    pub event_version: u32,
    pub source: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub correlation_id: Option<String>,
    pub causation_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub payload: Value,
    pub metadata: Option<Value>,
    pub recorded_at: DateTime<Utc>,
}

impl EventAuditRecord {
    /// Snapshot `event` for the audit log.
    pub fn from_event(event: &BusEvent) -> Result<Self, serde_json::Error> {
        let meta = event.metadata();
        Ok(Self {
            event_id: meta.event_id(),
            event_type: meta.event_type(),
            event_version: meta.version(),
            source: meta.source().to_string(),
            aggregate_type: meta.aggregate_type().to_string(),
            aggregate_id: meta.aggregate_id().to_string(),
            correlation_id: meta.correlation_id().map(str::to_string),
            causation_id: meta.causation_id(),
            occurred_at: meta.occurred_at(),
            payload: event.payload_json()?,
            metadata: meta.context().cloned(),
            recorded_at: Utc::now(),
        })
    }

    /// Envelope metadata as it was published.
    pub fn event_metadata(&self) -> EventMetadata {
        EventMetadata::rehydrate(
            self.event_id,
            self.event_type,
            self.event_version,
            self.occurred_at,
            self.aggregate_id.clone(),
            self.correlation_id.clone(),
            self.causation_id,
            self.metadata.clone(),
        )
    }
}

/// Whether an append created a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAppend {
    Inserted,
    /// A record with the same event id already exists (duplicate publish).
    Duplicate,
}

/// Audit log repository trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventAuditRepository: Send + Sync {
    /// Insert-if-absent on `event_id`.
    async fn append(&self, record: &EventAuditRecord) -> Result<AuditAppend, AppError>;

    async fn find_by_event_id(&self, event_id: Uuid) -> Result<Option<EventAuditRecord>, AppError>;

    /// History of one aggregate, oldest first.
    async fn find_by_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        limit: i64,
    ) -> Result<Vec<EventAuditRecord>, AppError>;

    /// Every event caused by one originating request, oldest first.
    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<EventAuditRecord>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::call::{CallEnded, CallType};
    use crate::domain::events::EventEnvelope;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_keeps_envelope_identity() {
        let envelope = EventEnvelope::builder(CallEnded {
            call_id: "call-1".into(),
            conversation_id: "c1".into(),
            ended_by: "u1".into(),
            call_type: CallType::Video,
            duration_seconds: 95,
        })
        .correlation_id("req-9")
        .build();
        let event: BusEvent = envelope.clone().into();

        let record = EventAuditRecord::from_event(&event).unwrap();

        assert_eq!(record.source, "call");
        assert_eq!(record.aggregate_type, "Call");
        assert_eq!(record.event_version, 2);
        assert_eq!(record.payload["duration_seconds"], 95);
        assert_eq!(&record.event_metadata(), envelope.metadata());
    }
}
