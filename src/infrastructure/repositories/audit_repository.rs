//! Event Audit Repository Implementation
//!
//! PostgreSQL implementation of the EventAuditRepository trait over the
//! append-only `event_audit_log` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::events::EventKind;
use crate::domain::{AuditAppend, EventAuditRecord, EventAuditRepository};
use crate::shared::error::AppError;

/// Database row representation matching the event_audit_log schema.
#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    event_id: Uuid,
    event_type: String,
    event_version: i32,
    source: String,
    aggregate_type: String,
    aggregate_id: String,
    correlation_id: Option<String>,
    causation_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
    metadata: Option<serde_json::Value>,
    recorded_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_record(self) -> Result<EventAuditRecord, AppError> {
        let event_type = EventKind::from_channel(&self.event_type).ok_or_else(|| {
            AppError::Internal(format!("unknown event type {:?} in audit log", self.event_type))
        })?;

        Ok(EventAuditRecord {
            event_id: self.event_id,
            event_type,
            event_version: self.event_version.max(0) as u32,
            source: self.source,
            aggregate_type: self.aggregate_type,
            aggregate_id: self.aggregate_id,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            occurred_at: self.occurred_at,
            payload: self.payload,
            metadata: self.metadata,
            recorded_at: self.recorded_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT event_id, event_type, event_version, source, aggregate_type, aggregate_id,
           correlation_id, causation_id, occurred_at, payload, metadata, recorded_at
    FROM event_audit_log
"#;

/// PostgreSQL audit log repository.
#[derive(Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventAuditRepository for PgAuditRepository {
    #[instrument(skip(self, record), fields(event_id = %record.event_id, event_type = %record.event_type))]
    async fn append(&self, record: &EventAuditRecord) -> Result<AuditAppend, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_audit_log (
                event_id, event_type, event_version, source, aggregate_type, aggregate_id,
                correlation_id, causation_id, occurred_at, payload, metadata, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(record.event_id)
        .bind(record.event_type.as_str())
        .bind(record.event_version as i32)
        .bind(&record.source)
        .bind(&record.aggregate_type)
        .bind(&record.aggregate_id)
        .bind(&record.correlation_id)
        .bind(record.causation_id)
        .bind(record.occurred_at)
        .bind(&record.payload)
        .bind(&record.metadata)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(AuditAppend::Inserted)
        } else {
            Ok(AuditAppend::Duplicate)
        }
    }

    async fn find_by_event_id(&self, event_id: Uuid) -> Result<Option<EventAuditRecord>, AppError> {
        let row = sqlx::query_as::<_, AuditRow>(&format!("{SELECT_COLUMNS} WHERE event_id = $1"))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AuditRow::into_record).transpose()
    }

    async fn find_by_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        limit: i64,
    ) -> Result<Vec<EventAuditRecord>, AppError> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "{SELECT_COLUMNS} WHERE aggregate_type = $1 AND aggregate_id = $2 \
             ORDER BY occurred_at ASC LIMIT $3"
        ))
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRow::into_record).collect()
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<EventAuditRecord>, AppError> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "{SELECT_COLUMNS} WHERE correlation_id = $1 ORDER BY occurred_at ASC"
        ))
        .bind(correlation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRow::into_record).collect()
    }
}
