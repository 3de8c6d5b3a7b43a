//! System Message Repository Implementation
//!
//! PostgreSQL implementation of the SystemMessageRepository trait. The unique
//! index on `(source_event_id, handler_id)` makes inserts idempotent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{SystemMessage, SystemMessageKind, SystemMessageRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct SystemMessageRow {
    id: Uuid,
    conversation_id: String,
    kind: String,
    body: String,
    data: serde_json::Value,
    source_event_id: Uuid,
    handler_id: String,
    created_at: DateTime<Utc>,
}

impl SystemMessageRow {
    fn into_message(self) -> Result<SystemMessage, AppError> {
        let kind: SystemMessageKind =
            serde_json::from_value(serde_json::Value::String(self.kind))?;

        Ok(SystemMessage {
            id: self.id,
            conversation_id: self.conversation_id,
            kind,
            body: self.body,
            data: self.data,
            source_event_id: self.source_event_id,
            handler_id: self.handler_id,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL system message repository.
#[derive(Clone)]
pub struct PgSystemMessageRepository {
    pool: PgPool,
}

impl PgSystemMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SystemMessageRepository for PgSystemMessageRepository {
    async fn create_for_event(&self, message: &SystemMessage) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO system_messages (
                id, conversation_id, kind, body, data, source_event_id, handler_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_event_id, handler_id) DO NOTHING
            "#,
        )
        .bind(message.id)
        .bind(&message.conversation_id)
        .bind(message.kind.as_str())
        .bind(&message.body)
        .bind(&message.data)
        .bind(message.source_event_id)
        .bind(&message.handler_id)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<SystemMessage>, AppError> {
        let rows = sqlx::query_as::<_, SystemMessageRow>(
            r#"
            SELECT id, conversation_id, kind, body, data, source_event_id, handler_id, created_at
            FROM system_messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SystemMessageRow::into_message).collect()
    }
}
