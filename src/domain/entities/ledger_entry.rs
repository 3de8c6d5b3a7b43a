//! Idempotency ledger entry and ledger port.
//!
//! Maps to the `event_processing_ledger` table:
//! - event_id: UUID NOT NULL
//! - handler_id: VARCHAR(128) NOT NULL
//! - status: VARCHAR(16) NOT NULL ('RETRYING' | 'SUCCESS' | 'FAILED')
//! - event_type, event_version, correlation_id: denormalized for observability
//! - retry_count: INTEGER NOT NULL DEFAULT 0
//! - error_message: TEXT NULL
//! - claim_token: UUID NULL
//! - lease_expires_at: TIMESTAMPTZ NULL
//! - processed_at: TIMESTAMPTZ NULL
//! - PRIMARY KEY (event_id, handler_id)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Error text recorded when a claim is failed after its lease ran out.
pub const LEASE_EXPIRED_MESSAGE: &str = "claim lease expired";

/// Processing state of one (event, handler) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    /// Claimed, handler in flight.
    Retrying,
    /// Handler completed, side effects applied.
    Success,
    /// Handler raised.
    Failed,
}

impl ProcessingStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrying => "RETRYING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Convert from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RETRYING" => Some(Self::Retrying),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub event_id: Uuid,
    pub handler_id: String,
}

impl LedgerKey {
    pub fn new(event_id: Uuid, handler_id: impl Into<String>) -> Self {
        Self {
            event_id,
            handler_id: handler_id.into(),
        }
    }
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.event_id, self.handler_id)
    }
}

/// One row of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub event_id: Uuid,
    pub handler_id: String,
    pub status: ProcessingStatus,
    pub event_type: String,
    pub event_version: u32,
    pub correlation_id: Option<String>,
    pub retry_count: u32,
    pub error_message: Option<String>,
    /// Token of the execution currently owning the claim.
    pub claim_token: Option<Uuid>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Fresh `RETRYING` entry for a first claim.
    pub fn claimed(request: &ClaimRequest, claim_token: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            event_id: request.key.event_id,
            handler_id: request.key.handler_id.clone(),
            status: ProcessingStatus::Retrying,
            event_type: request.event_type.clone(),
            event_version: request.event_version,
            correlation_id: request.correlation_id.clone(),
            retry_count: 0,
            error_message: None,
            claim_token: Some(claim_token),
            lease_expires_at: Some(request.lease_expires_at),
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.event_id, self.handler_id.clone())
    }

    /// A `RETRYING` claim whose owner stopped renewing it.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ProcessingStatus::Retrying
            && self.lease_expires_at.is_some_and(|expires| expires <= now)
    }
}

/// Data written with a first claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRequest {
    pub key: LedgerKey,
    pub event_type: String,
    pub event_version: u32,
    pub correlation_id: Option<String>,
    pub lease_expires_at: DateTime<Utc>,
}

/// Result of an insert-if-absent claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller owns the new entry.
    Claimed(Uuid),
    /// Another execution created the entry first.
    AlreadyExists,
}

/// Storage port for the idempotency ledger.
///
/// Implementations must make `claim` a true insert-if-absent on
/// (event_id, handler_id), and make `reclaim`, `expire` and `mark_*` conditional updates
/// so concurrent callers can never both win.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    /// Point lookup by key.
    async fn lookup(&self, key: &LedgerKey) -> Result<Option<LedgerEntry>, AppError>;

    /// Create a `RETRYING` entry unless one exists.
    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome, AppError>;

    /// Atomically move a `FAILED` entry whose retry count is within
    /// `max_retries` back to `RETRYING` under a new token.
    ///
    /// Returns `None` when the entry no longer qualifies.
    async fn reclaim(
        &self,
        key: &LedgerKey,
        max_retries: u32,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError>;

    /// Single-key `reap_expired`: `RETRYING` -> `FAILED` when the lease ran
    /// out before `now`. `false` if the entry was not an expired claim.
    async fn expire(&self, key: &LedgerKey, now: DateTime<Utc>) -> Result<bool, AppError>;

    /// `RETRYING` -> `SUCCESS`, only while `claim_token` still owns the entry.
    async fn mark_success(&self, key: &LedgerKey, claim_token: Uuid) -> Result<bool, AppError>;

    /// `RETRYING` -> `FAILED` with the error text and an incremented retry count,
    /// only while `claim_token` still owns the entry.
    async fn mark_failed(
        &self,
        key: &LedgerKey,
        claim_token: Uuid,
        error_message: &str,
    ) -> Result<bool, AppError>;

    /// Turn every `RETRYING` entry whose lease expired before `now` into `FAILED`.
    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProcessingStatus::Retrying,
            ProcessingStatus::Success,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProcessingStatus::parse("PENDING"), None);
    }

    #[test]
    fn test_lease_expiry_only_applies_to_retrying() {
        let now = Utc::now();
        let request = ClaimRequest {
            key: LedgerKey::new(Uuid::new_v4(), "h"),
            event_type: "user.blocked".into(),
            event_version: 2,
            correlation_id: None,
            lease_expires_at: now - Duration::seconds(1),
        };
        let mut entry = LedgerEntry::claimed(&request, Uuid::new_v4(), now);

        assert!(entry.lease_expired(now));

        entry.status = ProcessingStatus::Success;
        assert!(!entry.lease_expired(now));
    }
}
