//! Common Test Utilities
//!
//! In-memory application wiring and collaborators that fail on demand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use chat_event_bus::application::services::EventPublisher;
use chat_event_bus::config::Settings;
use chat_event_bus::domain::{
    EventAuditRecord, EventAuditRepository, AuditAppend, Friendship, FriendshipRepository,
};
use chat_event_bus::infrastructure::memory::{
    InMemoryAuditRepository, InMemoryCache, InMemoryConversationState,
    InMemoryFriendshipRepository, InMemoryLedger, InMemoryNotificationSink,
    InMemorySystemMessageRepository,
};
use chat_event_bus::shared::error::AppError;
use chat_event_bus::startup::{Application, Backends};

/// Test application over in-memory backends, keeping the concrete handles
/// so tests can inspect what the listeners wrote.
pub struct TestApp {
    pub app: Application,
    pub publisher: Arc<EventPublisher>,
    pub ledger: Arc<InMemoryLedger>,
    pub audit: Arc<InMemoryAuditRepository>,
    pub cache: Arc<InMemoryCache>,
    pub friendships: Arc<InMemoryFriendshipRepository>,
    pub system_messages: Arc<InMemorySystemMessageRepository>,
    pub conversation_state: Arc<InMemoryConversationState>,
    pub notifications: Arc<InMemoryNotificationSink>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_backends(|_| {})
    }

    /// Build with some ports swapped out before wiring.
    pub fn with_backends(customize: impl FnOnce(&mut Backends)) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let audit = Arc::new(InMemoryAuditRepository::new());
        let cache = Arc::new(InMemoryCache::new());
        let friendships = Arc::new(InMemoryFriendshipRepository::new());
        let system_messages = Arc::new(InMemorySystemMessageRepository::new());
        let conversation_state = Arc::new(InMemoryConversationState::new());
        let notifications = Arc::new(InMemoryNotificationSink::new());

        let mut backends = Backends {
            ledger: ledger.clone(),
            audit: audit.clone(),
            cache: cache.clone(),
            friendships: friendships.clone(),
            system_messages: system_messages.clone(),
            conversation_state: conversation_state.clone(),
            notifications: notifications.clone(),
        };
        customize(&mut backends);

        let app = Application::with_backends(test_settings(), backends)
            .expect("in-memory application should build");

        Self {
            publisher: app.publisher(),
            app,
            ledger,
            audit,
            cache,
            friendships,
            system_messages,
            conversation_state,
            notifications,
        }
    }
}

/// In-memory settings with short race waits.
pub fn test_settings() -> Settings {
    let mut settings = Settings::in_memory();
    settings.event_bus.idempotency.initial_backoff_ms = 1;
    settings.event_bus.idempotency.max_backoff_ms = 10;
    settings.event_bus.idempotency.max_wait_ms = 500;
    settings
}

/// Friendship repository whose writes always fail.
pub struct BrokenFriendships;

#[async_trait]
impl FriendshipRepository for BrokenFriendships {
    async fn find_between(&self, _a: &str, _b: &str) -> Result<Option<Friendship>, AppError> {
        Ok(None)
    }

    async fn soft_delete_between(
        &self,
        _a: &str,
        _b: &str,
        _at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        Err(AppError::Internal("friendships table unavailable".into()))
    }

    async fn cancel_pending_requests_between(&self, _a: &str, _b: &str) -> Result<u64, AppError> {
        Err(AppError::Internal("friendships table unavailable".into()))
    }
}

/// Counts soft-delete calls, delegating to an in-memory repository.
pub struct CountingFriendships {
    pub inner: Arc<InMemoryFriendshipRepository>,
    pub soft_deletes: AtomicUsize,
}

impl CountingFriendships {
    pub fn new(inner: Arc<InMemoryFriendshipRepository>) -> Self {
        Self {
            inner,
            soft_deletes: AtomicUsize::new(0),
        }
    }

    pub fn soft_delete_calls(&self) -> usize {
        self.soft_deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FriendshipRepository for CountingFriendships {
    async fn find_between(&self, a: &str, b: &str) -> Result<Option<Friendship>, AppError> {
        self.inner.find_between(a, b).await
    }

    async fn soft_delete_between(
        &self,
        a: &str,
        b: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        self.soft_deletes.fetch_add(1, Ordering::SeqCst);
        // widen the window in which a concurrent delivery sees RETRYING
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        self.inner.soft_delete_between(a, b, at).await
    }

    async fn cancel_pending_requests_between(&self, a: &str, b: &str) -> Result<u64, AppError> {
        self.inner.cancel_pending_requests_between(a, b).await
    }
}

/// Audit log that rejects every write.
pub struct BrokenAudit;

#[async_trait]
impl EventAuditRepository for BrokenAudit {
    async fn append(&self, _record: &EventAuditRecord) -> Result<AuditAppend, AppError> {
        Err(AppError::Internal("audit log unavailable".into()))
    }

    async fn find_by_event_id(&self, _event_id: Uuid) -> Result<Option<EventAuditRecord>, AppError> {
        Ok(None)
    }

    async fn find_by_aggregate(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
        _limit: i64,
    ) -> Result<Vec<EventAuditRecord>, AppError> {
        Ok(Vec::new())
    }

    async fn find_by_correlation(
        &self,
        _correlation_id: &str,
    ) -> Result<Vec<EventAuditRecord>, AppError> {
        Ok(Vec::new())
    }
}
