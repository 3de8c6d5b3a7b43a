//! Settings for the event bus process.
//!
//! Layered from `config/default.toml`, `config/{RUN_ENV}.toml`, a `.env`
//! file and finally `APP__`-prefixed environment variables, so
//! `APP__EVENT_BUS__IDEMPOTENCY__LEASE_SECONDS=60` overrides the lease.
//! `Settings::in_memory()` skips all of that for tests and local runs.

mod settings;

pub use settings::*;
