//! Friendship Repository Implementation
//!
//! PostgreSQL implementation of the FriendshipRepository trait. Friendships
//! are stored as an ordered (low, high) pair so either direction hits the
//! same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::{ordered_pair, Friendship, FriendshipRepository};
use crate::shared::error::AppError;

/// PostgreSQL friendship repository.
#[derive(Clone)]
pub struct PgFriendshipRepository {
    pool: PgPool,
}

impl PgFriendshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FriendshipRow {
    id: String,
    user_low: String,
    user_high: String,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<FriendshipRow> for Friendship {
    fn from(row: FriendshipRow) -> Self {
        Friendship {
            id: row.id,
            user_low: row.user_low,
            user_high: row.user_high,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
impl FriendshipRepository for PgFriendshipRepository {
    async fn find_between(&self, a: &str, b: &str) -> Result<Option<Friendship>, AppError> {
        let (low, high) = ordered_pair(a, b);

        let row = sqlx::query_as::<_, FriendshipRow>(
            r#"
            SELECT id, user_low, user_high, created_at, deleted_at
            FROM friendships
            WHERE user_low = $1 AND user_high = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Friendship::from))
    }

    #[instrument(skip(self))]
    async fn soft_delete_between(
        &self,
        a: &str,
        b: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let (low, high) = ordered_pair(a, b);

        let result = sqlx::query(
            r#"
            UPDATE friendships
            SET deleted_at = $3
            WHERE user_low = $1 AND user_high = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(low)
        .bind(high)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn cancel_pending_requests_between(&self, a: &str, b: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE friend_requests
            SET status = 'CANCELLED', updated_at = NOW()
            WHERE status = 'PENDING'
              AND ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
