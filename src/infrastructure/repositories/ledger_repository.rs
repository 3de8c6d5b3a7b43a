//! Idempotency Ledger Repository Implementation
//!
//! PostgreSQL implementation of the IdempotencyLedger port over the
//! `event_processing_ledger` table. Exclusivity comes from the primary key
//! (claims) and from conditional `UPDATE`s keyed on status and claim token
//! (takeovers and completions); no explicit locks are taken.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::{
    ClaimOutcome, ClaimRequest, IdempotencyLedger, LedgerEntry, LedgerKey, ProcessingStatus,
    LEASE_EXPIRED_MESSAGE,
};
use crate::shared::error::AppError;

/// Database row representation matching the event_processing_ledger schema.
#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    event_id: Uuid,
    handler_id: String,
    status: String,
    event_type: String,
    event_version: i32,
    correlation_id: Option<String>,
    retry_count: i32,
    error_message: Option<String>,
    claim_token: Option<Uuid>,
    lease_expires_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LedgerRow {
    fn into_entry(self) -> Result<LedgerEntry, AppError> {
        let status = ProcessingStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(format!("unknown ledger status {:?}", self.status))
        })?;

        Ok(LedgerEntry {
            event_id: self.event_id,
            handler_id: self.handler_id,
            status,
            event_type: self.event_type,
            event_version: self.event_version.max(0) as u32,
            correlation_id: self.correlation_id,
            retry_count: self.retry_count.max(0) as u32,
            error_message: self.error_message,
            claim_token: self.claim_token,
            lease_expires_at: self.lease_expires_at,
            processed_at: self.processed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// `retry_count` is an INTEGER column; larger bounds saturate instead of wrapping.
fn retry_bound(max_retries: u32) -> i32 {
    i32::try_from(max_retries).unwrap_or(i32::MAX)
}

/// PostgreSQL idempotency ledger.
#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyLedger for PgLedgerRepository {
    #[instrument(skip(self), fields(key = %key), level = "debug")]
    async fn lookup(&self, key: &LedgerKey) -> Result<Option<LedgerEntry>, AppError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT event_id, handler_id, status, event_type, event_version, correlation_id,
                   retry_count, error_message, claim_token, lease_expires_at, processed_at,
                   created_at, updated_at
            FROM event_processing_ledger
            WHERE event_id = $1 AND handler_id = $2
            "#,
        )
        .bind(key.event_id)
        .bind(&key.handler_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerRow::into_entry).transpose()
    }

    #[instrument(skip(self, request), fields(key = %request.key), level = "debug")]
    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome, AppError> {
        let token = Uuid::now_v7();

        let result = sqlx::query(
            r#"
            INSERT INTO event_processing_ledger (
                event_id, handler_id, status, event_type, event_version, correlation_id,
                retry_count, claim_token, lease_expires_at, created_at, updated_at
            )
            VALUES ($1, $2, 'RETRYING', $3, $4, $5, 0, $6, $7, NOW(), NOW())
            ON CONFLICT (event_id, handler_id) DO NOTHING
            "#,
        )
        .bind(request.key.event_id)
        .bind(&request.key.handler_id)
        .bind(&request.event_type)
        .bind(request.event_version as i32)
        .bind(&request.correlation_id)
        .bind(token)
        .bind(request.lease_expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(ClaimOutcome::Claimed(token))
        } else {
            Ok(ClaimOutcome::AlreadyExists)
        }
    }

    #[instrument(skip(self), fields(key = %key), level = "debug")]
    async fn reclaim(
        &self,
        key: &LedgerKey,
        max_retries: u32,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let token = Uuid::now_v7();

        let result = sqlx::query(
            r#"
            UPDATE event_processing_ledger
            SET status = 'RETRYING',
                claim_token = $3,
                lease_expires_at = $4,
                updated_at = NOW()
            WHERE event_id = $1 AND handler_id = $2
              AND status = 'FAILED'
              AND retry_count <= $5
            "#,
        )
        .bind(key.event_id)
        .bind(&key.handler_id)
        .bind(token)
        .bind(lease_expires_at)
        .bind(retry_bound(max_retries))
        .execute(&self.pool)
        .await?;

        Ok((result.rows_affected() == 1).then_some(token))
    }

    #[instrument(skip(self), fields(key = %key), level = "debug")]
    async fn expire(&self, key: &LedgerKey, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE event_processing_ledger
            SET status = 'FAILED',
                retry_count = retry_count + 1,
                error_message = $4,
                claim_token = NULL,
                lease_expires_at = NULL,
                updated_at = $3
            WHERE event_id = $1 AND handler_id = $2
              AND status = 'RETRYING'
              AND lease_expires_at <= $3
            "#,
        )
        .bind(key.event_id)
        .bind(&key.handler_id)
        .bind(now)
        .bind(LEASE_EXPIRED_MESSAGE)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(key = %key), level = "debug")]
    async fn mark_success(&self, key: &LedgerKey, claim_token: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE event_processing_ledger
            SET status = 'SUCCESS',
                error_message = NULL,
                claim_token = NULL,
                lease_expires_at = NULL,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE event_id = $1 AND handler_id = $2
              AND status = 'RETRYING'
              AND claim_token = $3
            "#,
        )
        .bind(key.event_id)
        .bind(&key.handler_id)
        .bind(claim_token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, error_message), fields(key = %key), level = "debug")]
    async fn mark_failed(
        &self,
        key: &LedgerKey,
        claim_token: Uuid,
        error_message: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE event_processing_ledger
            SET status = 'FAILED',
                retry_count = retry_count + 1,
                error_message = $4,
                claim_token = NULL,
                lease_expires_at = NULL,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE event_id = $1 AND handler_id = $2
              AND status = 'RETRYING'
              AND claim_token = $3
            "#,
        )
        .bind(key.event_id)
        .bind(&key.handler_id)
        .bind(claim_token)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE event_processing_ledger
            SET status = 'FAILED',
                retry_count = retry_count + 1,
                error_message = $2,
                claim_token = NULL,
                lease_expires_at = NULL,
                updated_at = $1
            WHERE status = 'RETRYING'
              AND lease_expires_at <= $1
            "#,
        )
        .bind(now)
        .bind(LEASE_EXPIRED_MESSAGE)
        .execute(&self.pool)
        .await?;

        let reaped = result.rows_affected();
        if reaped > 0 {
            warn!(reaped, "Expired ledger claims marked as failed");
        }
        Ok(reaped)
    }
}
