//! Application Services
//!
//! Services that move events through the bus.
//!
//! ## Available Services
//!
//! - **EventPublisher**: validation, audit, dispatch, redelivery and replay
//! - **IdempotencyService**: the idempotent dispatch wrapper over the ledger
//! - **LedgerReaper**: background sweep of expired claims

pub mod event_publisher;
pub mod idempotency_service;
pub mod ledger_reaper;

// Re-export publisher types
pub use event_publisher::{DispatchReport, EventPublisher, HandlerReport, PublishError};

// Re-export idempotency types
pub use idempotency_service::{
    normalize_event_id, IdempotencyError, IdempotencyService, IdempotentOutcome, VersionInfo,
};

pub use ledger_reaper::LedgerReaper;
