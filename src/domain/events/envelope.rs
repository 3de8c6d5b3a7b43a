//! Event envelope.
//!
//! Immutable metadata + payload record for one business occurrence. Envelopes
//! are only ever produced by [`EnvelopeBuilder::build`] (or rehydrated from the
//! audit log); there are no setters, so tracing fields cannot change after
//! an envelope has been handed to the publisher.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use super::{BusEvent, EventKind};
use crate::domain::versioning::{MigrationError, VersionRegistry};

/// Business payload carried inside an envelope.
///
/// Payload structs always describe the current schema version of their kind.
pub trait EventPayload:
    Serialize + DeserializeOwned + Validate + Clone + Debug + PartialEq + Send + Sync + 'static
{
    /// Identifier of the entity that changed.
    fn aggregate_id(&self) -> String;
}

/// Payload bound to exactly one [`EventKind`] and one [`BusEvent`] variant.
pub trait DomainEvent: EventPayload {
    const KIND: EventKind;

    /// Wrap a typed envelope into the bus sum type.
    fn into_bus(envelope: EventEnvelope<Self>) -> BusEvent;

    /// Typed view of a bus event, `None` when the variant does not match.
    fn from_bus(event: &BusEvent) -> Option<&EventEnvelope<Self>>;
}

/// Identity, version and causality fields shared by every envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    event_id: Uuid,
    event_type: EventKind,
    version: u32,
    occurred_at: DateTime<Utc>,
    aggregate_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    causation_id: Option<Uuid>,
    /// Free-form runtime context, never read for business decisions.
    #[serde(default, rename = "metadata", skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
}

impl EventMetadata {
    /// Rebuild metadata from persisted columns (audit log replay).
    #[allow(clippy::too_many_arguments)]
    pub fn rehydrate(
        event_id: Uuid,
        event_type: EventKind,
        version: u32,
        occurred_at: DateTime<Utc>,
        aggregate_id: String,
        correlation_id: Option<String>,
        causation_id: Option<Uuid>,
        context: Option<Value>,
    ) -> Self {
        Self {
            event_id,
            event_type,
            version,
            occurred_at,
            aggregate_id,
            correlation_id,
            causation_id,
            context,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> EventKind {
        self.event_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Occurrence time (not publish time).
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn source(&self) -> &'static str {
        self.event_type.source()
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &'static str {
        self.event_type.aggregate_type()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<Uuid> {
        self.causation_id
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// Same identity, payload shape moved to `version`. Used after migration.
    pub(crate) fn at_version(&self, version: u32) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// Check the identity fields against the kind the payload belongs to.
    pub fn validate_identity(&self, expected: EventKind) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.event_id.is_nil() {
            errors.add(
                "event_id",
                ValidationError::new("nil").with_message("event id must not be nil".into()),
            );
        }
        if self.version == 0 {
            errors.add(
                "version",
                ValidationError::new("range").with_message("version must be positive".into()),
            );
        }
        if self.aggregate_id.trim().is_empty() {
            errors.add(
                "aggregate_id",
                ValidationError::new("required")
                    .with_message("aggregate id must not be empty".into()),
            );
        }
        if self.event_type != expected {
            errors.add(
                "event_type",
                ValidationError::new("mismatch").with_message(
                    format!("expected {}, found {}", expected, self.event_type).into(),
                ),
            );
        }
        if matches!(self.correlation_id.as_deref(), Some(id) if id.trim().is_empty()) {
            errors.add(
                "correlation_id",
                ValidationError::new("blank")
                    .with_message("correlation id must not be blank".into()),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Immutable envelope around a typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<P> {
    metadata: EventMetadata,
    payload: P,
}

impl<P: DomainEvent> EventEnvelope<P> {
    /// Start building an envelope for `payload`.
    pub fn builder(payload: P) -> EnvelopeBuilder<P> {
        EnvelopeBuilder {
            payload,
            event_id: None,
            occurred_at: None,
            correlation_id: None,
            causation_id: None,
            context: None,
        }
    }

    /// Envelope with a fresh id, occurring now, without tracing fields.
    pub fn new(payload: P) -> Self {
        Self::builder(payload).build()
    }

    pub(crate) fn from_parts(metadata: EventMetadata, payload: P) -> Self {
        Self { metadata, payload }
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn event_id(&self) -> Uuid {
        self.metadata.event_id
    }

    pub fn version(&self) -> u32 {
        self.metadata.version
    }

    pub fn kind(&self) -> EventKind {
        P::KIND
    }

    pub fn into_bus(self) -> BusEvent {
        P::into_bus(self)
    }

    /// Identity fields plus the payload's declared field rules.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.metadata.validate_identity(P::KIND)?;

        if self.metadata.aggregate_id != self.payload.aggregate_id() {
            let mut errors = ValidationErrors::new();
            errors.add(
                "aggregate_id",
                ValidationError::new("mismatch")
                    .with_message("aggregate id does not match payload".into()),
            );
            return Err(errors);
        }

        self.payload.validate()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Payload as JSON in the shape it was authored at.
    pub fn payload_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.payload)
    }

    /// Payload migrated to `target` version, for consumers written against
    /// another schema.
    pub fn payload_at_version(
        &self,
        registry: &VersionRegistry,
        target: u32,
    ) -> Result<Value, MigrationError> {
        let payload = self.payload_json()?;
        registry.migrate(P::KIND, payload, self.metadata.version, target)
    }

    /// Deserialize the payload as seen at `target` version.
    pub fn read_as<T: DeserializeOwned>(
        &self,
        registry: &VersionRegistry,
        target: u32,
    ) -> Result<T, MigrationError> {
        let value = self.payload_at_version(registry, target)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Builder that yields a fully-formed, immutable [`EventEnvelope`].
#[must_use]
#[derive(Debug)]
pub struct EnvelopeBuilder<P> {
    payload: P,
    event_id: Option<Uuid>,
    occurred_at: Option<DateTime<Utc>>,
    correlation_id: Option<String>,
    causation_id: Option<Uuid>,
    context: Option<Value>,
}

impl<P: DomainEvent> EnvelopeBuilder<P> {
    /// Use a caller-provided id instead of generating one.
    pub fn event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn causation_id(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    /// Mark this event as triggered by `parent`.
    ///
    /// Sets the causation id and inherits the parent's correlation id unless
    /// one was already given.
    pub fn caused_by(mut self, parent: &EventMetadata) -> Self {
        self.causation_id = Some(parent.event_id);
        if self.correlation_id.is_none() {
            self.correlation_id = parent.correlation_id.clone();
        }
        self
    }

    pub fn metadata(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> EventEnvelope<P> {
        let metadata = EventMetadata {
            event_id: self.event_id.unwrap_or_else(Uuid::now_v7),
            event_type: P::KIND,
            version: P::KIND.schema_version(),
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            aggregate_id: self.payload.aggregate_id(),
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            context: self.context,
        };

        EventEnvelope {
            metadata,
            payload: self.payload,
        }
    }
}
