//! Application settings and configuration structures.

use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Current environment (development, staging, production)
    pub environment: String,

    /// Which backend stores the ledger, audit log and listener state
    pub storage: StorageSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// Dispatch, idempotency and reaper tuning
    pub event_bus: EventBusSettings,

    /// Per-listener failure policy overrides
    #[serde(default)]
    pub listeners: ListenerSettings,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL for records, Redis for cache and notifications
    #[default]
    Postgres,
    /// Process-local maps, for tests and single-node development
    Memory,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Apply pending migrations at startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Prefix prepended to every cache key
    #[serde(default)]
    pub key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventBusSettings {
    pub idempotency: IdempotencySettings,
    pub dispatch: DispatchSettings,
    pub reaper: ReaperSettings,
}

/// What to do when a delivery finds its ledger entry in `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailedPolicy {
    /// Surface the earlier failure to the caller
    #[default]
    Raise,
    /// Take the entry over and run again, up to `max_retries` failures
    Retry,
}

/// Idempotent dispatch wrapper tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencySettings {
    /// Re-checks of an in-flight claim before giving up
    pub max_wait_attempts: u32,

    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Cap on a single backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Total wait budget in milliseconds
    pub max_wait_ms: u64,

    /// Lease granted with each claim
    pub lease_seconds: u64,

    pub failed_policy: FailedPolicy,

    /// Failures tolerated under the `retry` policy
    pub max_retries: u32,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            max_wait_attempts: 8,
            initial_backoff_ms: 25,
            max_backoff_ms: 1_000,
            max_wait_ms: 5_000,
            lease_seconds: 300,
            failed_policy: FailedPolicy::Raise,
            max_retries: 3,
        }
    }
}

impl IdempotencySettings {
    pub fn lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_seconds as i64)
    }
}

/// How the publisher invokes the handlers of one event.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Run all handlers of an event concurrently instead of one after another
    pub concurrent: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self { concurrent: true }
    }
}

/// Background reaper for expired claims.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaperSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

/// Failure handling of one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail closed: propagate to the dispatcher
    Strict,
    /// Log and continue
    Lenient,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListenerSettings {
    /// Handler id -> policy, overriding each listener's default
    #[serde(default)]
    pub policies: HashMap<String, FailurePolicy>,
}

impl ListenerSettings {
    pub fn policy_for(&self, handler_id: &str, default: FailurePolicy) -> FailurePolicy {
        self.policies.get(handler_id).copied().unwrap_or(default)
    }
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a tuning value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("storage.backend", "postgres")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("event_bus.idempotency.max_wait_attempts", 8)?
            .set_default("event_bus.idempotency.initial_backoff_ms", 25)?
            .set_default("event_bus.idempotency.max_backoff_ms", 1000)?
            .set_default("event_bus.idempotency.max_wait_ms", 5000)?
            .set_default("event_bus.idempotency.lease_seconds", 300)?
            .set_default("event_bus.idempotency.failed_policy", "raise")?
            .set_default("event_bus.idempotency.max_retries", 3)?
            .set_default("event_bus.dispatch.concurrent", true)?
            .set_default("event_bus.reaper.enabled", true)?
            .set_default("event_bus.reaper.interval_secs", 60)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__EVENT_BUS__DISPATCH__CONCURRENT=false -> event_bus.dispatch.concurrent
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Reject values the dispatch wrapper cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let idem = &self.event_bus.idempotency;

        if idem.max_wait_attempts == 0 {
            return Err(ConfigError::Message(
                "event_bus.idempotency.max_wait_attempts must be positive".into(),
            ));
        }
        if idem.initial_backoff_ms == 0 || idem.max_wait_ms == 0 {
            return Err(ConfigError::Message(
                "event_bus.idempotency backoff bounds must be positive".into(),
            ));
        }
        if idem.max_backoff_ms < idem.initial_backoff_ms {
            return Err(ConfigError::Message(format!(
                "event_bus.idempotency.max_backoff_ms ({}) must be >= initial_backoff_ms ({})",
                idem.max_backoff_ms, idem.initial_backoff_ms
            )));
        }
        if idem.lease_seconds == 0 {
            return Err(ConfigError::Message(
                "event_bus.idempotency.lease_seconds must be positive".into(),
            ));
        }
        if self.event_bus.reaper.enabled && self.event_bus.reaper.interval_secs == 0 {
            return Err(ConfigError::Message(
                "event_bus.reaper.interval_secs must be positive".into(),
            ));
        }
        if self.storage.backend == StorageBackend::Postgres && self.database.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "database.url is required for the postgres storage backend".into(),
            ));
        }
        Ok(())
    }

    /// Settings for a process-local bus with default tuning.
    pub fn in_memory() -> Self {
        Self {
            environment: "test".into(),
            storage: StorageSettings {
                backend: StorageBackend::Memory,
            },
            database: DatabaseSettings {
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout: 5,
                run_migrations: false,
            },
            redis: RedisSettings {
                url: "redis://127.0.0.1:6379".into(),
                key_prefix: None,
            },
            event_bus: EventBusSettings::default(),
            listeners: ListenerSettings::default(),
        }
    }
}

impl DatabaseSettings {
    /// Get the connection URL.
    pub fn connection_url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_settings_are_valid() {
        assert!(Settings::in_memory().validate().is_ok());
    }

    #[test]
    fn test_backoff_cap_below_initial_is_rejected() {
        let mut settings = Settings::in_memory();
        settings.event_bus.idempotency.initial_backoff_ms = 500;
        settings.event_bus.idempotency.max_backoff_ms = 100;

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("max_backoff_ms"));
    }

    #[test]
    fn test_postgres_needs_database_url() {
        let mut settings = Settings::in_memory();
        settings.storage.backend = StorageBackend::Postgres;

        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_policy_override() {
        let mut listeners = ListenerSettings::default();
        listeners
            .policies
            .insert("block-cache-invalidation".into(), FailurePolicy::Strict);

        assert_eq!(
            listeners.policy_for("block-cache-invalidation", FailurePolicy::Lenient),
            FailurePolicy::Strict
        );
        assert_eq!(
            listeners.policy_for("other", FailurePolicy::Lenient),
            FailurePolicy::Lenient
        );
    }
}
