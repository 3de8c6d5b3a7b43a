//! Conversation State Repository Implementation
//!
//! PostgreSQL implementation of the ConversationStateRepository trait over
//! `conversation_last_message`, `unread_messages` and `conversation_members`.
//! Every write is an upsert or a set insert/delete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::{ConversationStateRepository, LastMessage};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct LastMessageRow {
    conversation_id: String,
    message_id: String,
    sender_id: String,
    sent_at: DateTime<Utc>,
}

impl From<LastMessageRow> for LastMessage {
    fn from(row: LastMessageRow) -> Self {
        LastMessage {
            conversation_id: row.conversation_id,
            message_id: row.message_id,
            sender_id: row.sender_id,
            sent_at: row.sent_at,
        }
    }
}

/// PostgreSQL conversation read-model repository.
#[derive(Clone)]
pub struct PgConversationStateRepository {
    pool: PgPool,
}

impl PgConversationStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStateRepository for PgConversationStateRepository {
    #[instrument(skip(self, message), fields(conversation_id = %message.conversation_id))]
    async fn record_last_message(&self, message: &LastMessage) -> Result<(), AppError> {
        // newer wins; an older or equal redelivery leaves the row alone
        sqlx::query(
            r#"
            INSERT INTO conversation_last_message (conversation_id, message_id, sender_id, sent_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (conversation_id) DO UPDATE
            SET message_id = EXCLUDED.message_id,
                sender_id = EXCLUDED.sender_id,
                sent_at = EXCLUDED.sent_at
            WHERE conversation_last_message.sent_at <= EXCLUDED.sent_at
            "#,
        )
        .bind(&message.conversation_id)
        .bind(&message.message_id)
        .bind(&message.sender_id)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn last_message(&self, conversation_id: &str) -> Result<Option<LastMessage>, AppError> {
        let row = sqlx::query_as::<_, LastMessageRow>(
            r#"
            SELECT conversation_id, message_id, sender_id, sent_at
            FROM conversation_last_message
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LastMessage::from))
    }

    async fn clear_last_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM conversation_last_message WHERE conversation_id = $1 AND message_id = $2",
        )
        .bind(conversation_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn mark_unread(
        &self,
        conversation_id: &str,
        message_id: &str,
        sender_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO unread_messages (conversation_id, user_id, message_id)
            SELECT conversation_id, user_id, $2
            FROM conversation_members
            WHERE conversation_id = $1 AND user_id <> $3
            ON CONFLICT (conversation_id, user_id, message_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(message_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn remove_unread(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM unread_messages WHERE conversation_id = $1 AND message_id = $2",
        )
        .bind(conversation_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, conversation_id: &str, user_id: &str) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM unread_messages WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn members(&self, conversation_id: &str) -> Result<Vec<String>, AppError> {
        let members = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM conversation_members WHERE conversation_id = $1 ORDER BY user_id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn add_members(
        &self,
        conversation_id: &str,
        user_ids: &[String],
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversation_members (conversation_id, user_id)
            SELECT $1, UNNEST($2::varchar[])
            ON CONFLICT (conversation_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn remove_member(&self, conversation_id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM conversation_members WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM unread_messages WHERE conversation_id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed > 0)
    }
}
