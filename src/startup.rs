//! Application Startup
//!
//! Wires storage backends, the version registry, listeners and the publisher.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::application::bus::HandlerRegistry;
use crate::application::listeners::{register_all, ListenerDeps};
use crate::application::services::{EventPublisher, IdempotencyService, LedgerReaper};
use crate::config::{Settings, StorageBackend};
use crate::domain::services::NotificationSink;
use crate::domain::versioning::{catalog, VersionRegistry};
use crate::domain::{
    ConversationStateRepository, EventAuditRepository, FriendshipRepository, IdempotencyLedger,
    SystemMessageRepository,
};
use crate::infrastructure::cache::{self, Cache, CacheSessionStore};
use crate::infrastructure::{database, metrics};
use crate::infrastructure::memory::{
    InMemoryAuditRepository, InMemoryCache, InMemoryConversationState,
    InMemoryFriendshipRepository, InMemoryLedger, InMemoryNotificationSink,
    InMemorySystemMessageRepository,
};
use crate::infrastructure::notifications::RedisNotificationSink;
use crate::infrastructure::repositories::{
    PgAuditRepository, PgConversationStateRepository, PgFriendshipRepository, PgLedgerRepository,
    PgSystemMessageRepository,
};

/// Storage behind every port the bus and its listeners use.
#[derive(Clone)]
pub struct Backends {
    pub ledger: Arc<dyn IdempotencyLedger>,
    pub audit: Arc<dyn EventAuditRepository>,
    pub cache: Arc<dyn Cache>,
    pub friendships: Arc<dyn FriendshipRepository>,
    pub system_messages: Arc<dyn SystemMessageRepository>,
    pub conversation_state: Arc<dyn ConversationStateRepository>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl Backends {
    /// PostgreSQL for records, Redis for cache, sessions and notifications.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let pool = database::create_pool(&settings.database)
            .await
            .context("failed to connect to PostgreSQL")?;
        info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&pool)
                .await
                .context("failed to run database migrations")?;
            info!("Database migrations applied");
        }

        let redis = cache::create_redis_client(&settings.redis)
            .await
            .context("failed to connect to Redis")?;

        Ok(Self {
            ledger: Arc::new(PgLedgerRepository::new(pool.clone())),
            audit: Arc::new(PgAuditRepository::new(pool.clone())),
            cache: Arc::new(cache::create_redis_cache(redis.clone(), &settings.redis)),
            friendships: Arc::new(PgFriendshipRepository::new(pool.clone())),
            system_messages: Arc::new(PgSystemMessageRepository::new(pool.clone())),
            conversation_state: Arc::new(PgConversationStateRepository::new(pool)),
            notifications: Arc::new(RedisNotificationSink::new(redis)),
        })
    }

    /// Process-local maps for every port.
    pub fn in_memory() -> Self {
        Self {
            ledger: Arc::new(InMemoryLedger::new()),
            audit: Arc::new(InMemoryAuditRepository::new()),
            cache: Arc::new(InMemoryCache::new()),
            friendships: Arc::new(InMemoryFriendshipRepository::new()),
            system_messages: Arc::new(InMemorySystemMessageRepository::new()),
            conversation_state: Arc::new(InMemoryConversationState::new()),
            notifications: Arc::new(InMemoryNotificationSink::new()),
        }
    }
}

/// Application instance
pub struct Application {
    settings: Settings,
    ledger: Arc<dyn IdempotencyLedger>,
    versions: Arc<VersionRegistry>,
    idempotency: Arc<IdempotencyService>,
    publisher: Arc<EventPublisher>,
}

impl Application {
    /// Build the application from settings, connecting the configured backend.
    pub async fn build(settings: Settings) -> Result<Self> {
        let backends = match settings.storage.backend {
            StorageBackend::Postgres => Backends::connect(&settings).await?,
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Backends::in_memory()
            }
        };

        Self::with_backends(settings, backends)
    }

    /// Build the application on already constructed backends.
    ///
    /// Fails when the version catalog or a listener subscription is
    /// inconsistent, before any event can be published.
    pub fn with_backends(settings: Settings, backends: Backends) -> Result<Self> {
        let versions = Arc::new(
            catalog::build_registry().context("invalid event version catalog")?,
        );
        info!(event_types = versions.len(), "Version registry built");

        let idempotency = Arc::new(IdempotencyService::new(
            backends.ledger.clone(),
            settings.event_bus.idempotency.clone(),
        ));

        let deps = ListenerDeps {
            idempotency: idempotency.clone(),
            versions: versions.clone(),
            cache: backends.cache.clone(),
            friendships: backends.friendships,
            system_messages: backends.system_messages,
            conversation_state: backends.conversation_state,
            sessions: Arc::new(CacheSessionStore::new(backends.cache)),
            notifications: backends.notifications,
        };

        let mut handlers = HandlerRegistry::new();
        register_all(&mut handlers, &deps, &settings.listeners)
            .context("invalid listener registration")?;

        let publisher = Arc::new(EventPublisher::new(
            Arc::new(handlers),
            backends.audit,
            versions.clone(),
            settings.event_bus.dispatch.concurrent,
        ));

        Ok(Self {
            settings,
            ledger: backends.ledger,
            versions,
            idempotency,
            publisher,
        })
    }

    pub fn publisher(&self) -> Arc<EventPublisher> {
        self.publisher.clone()
    }

    pub fn versions(&self) -> Arc<VersionRegistry> {
        self.versions.clone()
    }

    pub fn idempotency(&self) -> Arc<IdempotencyService> {
        self.idempotency.clone()
    }

    /// Reaper over this application's ledger, if enabled.
    pub fn reaper(&self) -> Option<LedgerReaper> {
        let reaper = &self.settings.event_bus.reaper;
        reaper.enabled.then(|| {
            LedgerReaper::new(
                self.ledger.clone(),
                Duration::from_secs(reaper.interval_secs),
            )
        })
    }

    /// Run background work until Ctrl-C.
    pub async fn run_until_stopped(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reaper = self.reaper().map(|reaper| tokio::spawn(reaper.run(shutdown_rx)));

        info!(
            handlers = self.publisher.handlers().len(),
            reaper = reaper.is_some(),
            "Event bus running"
        );

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("Shutdown signal received");

        // receivers may already be gone when the reaper is disabled
        let _ = shutdown_tx.send(true);
        if let Some(handle) = reaper {
            handle.await?;
        }

        debug!(metrics = %metrics::gather_metrics(), "Final metrics snapshot");
        Ok(())
    }
}
