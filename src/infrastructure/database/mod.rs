//! PostgreSQL pool and schema for the durable event bus tables
//! (audit log, processing ledger and the listener-owned records).

use std::time::Duration;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::config::DatabaseSettings;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open the pool shared by every `Pg*` repository.
#[instrument(skip(settings), fields(max = settings.max_connections))]
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(settings.connection_url())
        .await?;

    info!(size = pool.size(), "PostgreSQL pool ready");
    Ok(pool)
}

/// Apply pending migrations; already-applied ones are skipped by sqlx.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    info!(known = MIGRATOR.iter().count(), "Applying event bus migrations");
    MIGRATOR.run(pool).await
}
