//! In-memory idempotency ledger.
//!
//! Every state change happens under the map's per-shard lock through the
//! entry API, so claims and takeovers are as exclusive as the conditional SQL
//! in the PostgreSQL ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::{
    ClaimOutcome, ClaimRequest, IdempotencyLedger, LedgerEntry, LedgerKey, ProcessingStatus,
    LEASE_EXPIRED_MESSAGE,
};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: DashMap<LedgerKey, LedgerEntry>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_with_status(&self, status: ProcessingStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Every entry recorded for one event, sorted by handler id.
    pub fn entries_for(&self, event_id: Uuid) -> Vec<LedgerEntry> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.event_id == event_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| a.handler_id.cmp(&b.handler_id));
        entries
    }
}

#[async_trait]
impl IdempotencyLedger for InMemoryLedger {
    async fn lookup(&self, key: &LedgerKey) -> Result<Option<LedgerEntry>, AppError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome, AppError> {
        match self.entries.entry(request.key.clone()) {
            Entry::Occupied(_) => Ok(ClaimOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                let token = Uuid::now_v7();
                slot.insert(LedgerEntry::claimed(request, token, Utc::now()));
                Ok(ClaimOutcome::Claimed(token))
            }
        }
    }

    async fn reclaim(
        &self,
        key: &LedgerKey,
        max_retries: u32,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(None);
        };
        if entry.status != ProcessingStatus::Failed || entry.retry_count > max_retries {
            return Ok(None);
        }

        let token = Uuid::now_v7();
        entry.status = ProcessingStatus::Retrying;
        entry.claim_token = Some(token);
        entry.lease_expires_at = Some(lease_expires_at);
        entry.updated_at = Utc::now();
        Ok(Some(token))
    }

    async fn expire(&self, key: &LedgerKey, now: DateTime<Utc>) -> Result<bool, AppError> {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if !entry.lease_expired(now) {
            return Ok(false);
        }
        expire_entry(&mut entry, now);
        Ok(true)
    }

    async fn mark_success(&self, key: &LedgerKey, claim_token: Uuid) -> Result<bool, AppError> {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if entry.status != ProcessingStatus::Retrying || entry.claim_token != Some(claim_token) {
            return Ok(false);
        }

        let now = Utc::now();
        entry.status = ProcessingStatus::Success;
        entry.error_message = None;
        entry.claim_token = None;
        entry.lease_expires_at = None;
        entry.processed_at = Some(now);
        entry.updated_at = now;
        Ok(true)
    }

    async fn mark_failed(
        &self,
        key: &LedgerKey,
        claim_token: Uuid,
        error_message: &str,
    ) -> Result<bool, AppError> {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if entry.status != ProcessingStatus::Retrying || entry.claim_token != Some(claim_token) {
            return Ok(false);
        }

        let now = Utc::now();
        entry.status = ProcessingStatus::Failed;
        entry.retry_count += 1;
        entry.error_message = Some(error_message.to_string());
        entry.claim_token = None;
        entry.lease_expires_at = None;
        entry.processed_at = Some(now);
        entry.updated_at = now;
        Ok(true)
    }

    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut reaped = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.lease_expired(now) {
                expire_entry(&mut entry, now);
                reaped += 1;
            }
        }
        Ok(reaped)
    }
}

/// The abandoned attempt counts as one failure.
fn expire_entry(entry: &mut LedgerEntry, now: DateTime<Utc>) {
    entry.status = ProcessingStatus::Failed;
    entry.retry_count += 1;
    entry.error_message = Some(LEASE_EXPIRED_MESSAGE.to_string());
    entry.claim_token = None;
    entry.lease_expires_at = None;
    entry.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(lease: Duration) -> ClaimRequest {
        ClaimRequest {
            key: LedgerKey::new(Uuid::now_v7(), "h1"),
            event_type: "user.blocked".into(),
            event_version: 2,
            correlation_id: None,
            lease_expires_at: Utc::now() + lease,
        }
    }

    fn token(outcome: ClaimOutcome) -> Uuid {
        match outcome {
            ClaimOutcome::Claimed(token) => token,
            ClaimOutcome::AlreadyExists => panic!("expected a claim"),
        }
    }

    #[tokio::test]
    async fn test_second_claim_loses() {
        let ledger = InMemoryLedger::new();
        let request = request(Duration::minutes(5));

        assert!(matches!(ledger.claim(&request).await.unwrap(), ClaimOutcome::Claimed(_)));
        assert_eq!(ledger.claim(&request).await.unwrap(), ClaimOutcome::AlreadyExists);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_token_cannot_complete() {
        let ledger = InMemoryLedger::new();
        let request = request(Duration::minutes(5));
        let owner = token(ledger.claim(&request).await.unwrap());

        assert!(!ledger.mark_success(&request.key, Uuid::now_v7()).await.unwrap());
        assert!(ledger.mark_success(&request.key, owner).await.unwrap());
        // already terminal
        assert!(!ledger.mark_failed(&request.key, owner, "late").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_reclaim_respects_retry_bound() {
        let ledger = InMemoryLedger::new();
        let request = request(Duration::minutes(5));
        let owner = token(ledger.claim(&request).await.unwrap());
        ledger.mark_failed(&request.key, owner, "boom").await.unwrap();

        let lease = Utc::now() + Duration::minutes(5);
        assert!(ledger.reclaim(&request.key, 0, lease).await.unwrap().is_none());

        let retry = ledger.reclaim(&request.key, 1, lease).await.unwrap();
        assert!(retry.is_some());
        let entry = ledger.lookup(&request.key).await.unwrap().unwrap();
        assert_eq!(entry.status, ProcessingStatus::Retrying);
        assert_eq!(entry.retry_count, 1);
    }

    #[tokio::test]
    async fn test_reap_only_touches_expired_claims() {
        let ledger = InMemoryLedger::new();
        let expired = request(Duration::seconds(-1));
        let live = request(Duration::minutes(5));
        ledger.claim(&expired).await.unwrap();
        ledger.claim(&live).await.unwrap();

        assert_eq!(ledger.reap_expired(Utc::now()).await.unwrap(), 1);

        let entry = ledger.lookup(&expired.key).await.unwrap().unwrap();
        assert_eq!(entry.status, ProcessingStatus::Failed);
        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.error_message.as_deref(), Some(LEASE_EXPIRED_MESSAGE));
        assert_eq!(ledger.count_with_status(ProcessingStatus::Retrying), 1);
    }

    #[tokio::test]
    async fn test_expire_fails_only_an_expired_claim() {
        let ledger = InMemoryLedger::new();
        let expired = request(Duration::seconds(-1));
        let live = request(Duration::minutes(5));
        let stale = token(ledger.claim(&expired).await.unwrap());
        ledger.claim(&live).await.unwrap();

        assert!(!ledger.expire(&live.key, Utc::now()).await.unwrap());
        assert!(ledger.expire(&expired.key, Utc::now()).await.unwrap());
        // second caller loses
        assert!(!ledger.expire(&expired.key, Utc::now()).await.unwrap());

        let entry = ledger.lookup(&expired.key).await.unwrap().unwrap();
        assert_eq!(entry.status, ProcessingStatus::Failed);
        assert_eq!(entry.retry_count, 1);
        assert!(!ledger.mark_success(&expired.key, stale).await.unwrap());
    }
}
