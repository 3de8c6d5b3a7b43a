//! # Domain Layer
//!
//! The event contract shared by every chat module, independent of storage
//! and transport.
//!
//! ## Structure
//!
//! - **events**: envelope, event kinds and per-module payloads
//! - **versioning**: version strategies, the registry and its startup catalog
//! - **entities**: ledger, audit and listener collaborator records with their
//!   repository traits
//! - **services**: domain services and outbound ports
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or application layers
//! - Envelopes are immutable once built
//! - Repository traits define data access contracts

pub mod entities;
pub mod events;
pub mod services;
pub mod versioning;

// Re-export commonly used types
pub use entities::*;
pub use events::{BusEvent, DomainEvent, EventEnvelope, EventKind, EventMetadata};
pub use versioning::VersionRegistry;
