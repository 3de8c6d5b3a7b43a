//! In-memory event audit log.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{AuditAppend, EventAuditRecord, EventAuditRepository};
use crate::shared::error::AppError;

/// Append-only audit log kept in publish order.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    records: RwLock<Vec<EventAuditRecord>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Every record, in publish order.
    pub fn records(&self) -> Vec<EventAuditRecord> {
        self.records.read().clone()
    }

    fn sorted(mut records: Vec<EventAuditRecord>) -> Vec<EventAuditRecord> {
        records.sort_by_key(|r| r.occurred_at);
        records
    }
}

#[async_trait]
impl EventAuditRepository for InMemoryAuditRepository {
    async fn append(&self, record: &EventAuditRecord) -> Result<AuditAppend, AppError> {
        let mut records = self.records.write();
        if records.iter().any(|r| r.event_id == record.event_id) {
            return Ok(AuditAppend::Duplicate);
        }
        records.push(record.clone());
        Ok(AuditAppend::Inserted)
    }

    async fn find_by_event_id(&self, event_id: Uuid) -> Result<Option<EventAuditRecord>, AppError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.event_id == event_id)
            .cloned())
    }

    async fn find_by_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        limit: i64,
    ) -> Result<Vec<EventAuditRecord>, AppError> {
        let matching: Vec<_> = self
            .records
            .read()
            .iter()
            .filter(|r| r.aggregate_type == aggregate_type && r.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        let mut sorted = Self::sorted(matching);
        sorted.truncate(limit.max(0) as usize);
        Ok(sorted)
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<EventAuditRecord>, AppError> {
        let matching: Vec<_> = self
            .records
            .read()
            .iter()
            .filter(|r| r.correlation_id.as_deref() == Some(correlation_id))
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }
}
