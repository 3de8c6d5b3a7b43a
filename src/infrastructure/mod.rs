//! Infrastructure Layer
//!
//! Backends for the ports the domain defines:
//! - Database repositories (PostgreSQL)
//! - Cache, session store and notification fan-out (Redis)
//! - Process-local implementations of every port (memory)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod notifications;
pub mod repositories;
