//! # Chat Event Bus Library
//!
//! The in-process domain event bus that decouples the modules of a chat
//! backend (block, friendship, messaging, conversation, call, auth):
//! - Immutable event envelopes with identity, version and causality
//! - A publisher that audits every event and isolates handler failures
//! - An idempotency ledger giving at-most-once side effects per handler
//! - Per-event version strategies so old and new readers share one event
//! - Domain listeners for cache, social graph, timeline and session state
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: events, versioning, records and repository traits
//! - **Application Layer**: the bus, its services and the listeners
//! - **Infrastructure Layer**: PostgreSQL, Redis, in-memory and metrics
//!
//! ## Module Structure
//!
//! ```text
//! chat_event_bus/
//! +-- config/         Configuration management
//! +-- domain/         Events, version strategies, records and traits
//! +-- application/    Publisher, idempotency wrapper, listeners
//! +-- infrastructure/ Database, cache and in-memory implementations
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Bus and listeners
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Application startup and wiring
pub mod startup;

// Telemetry and observability
pub mod telemetry;
