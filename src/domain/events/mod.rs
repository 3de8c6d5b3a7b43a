//! # Domain Events
//!
//! The event contract shared by every module.
//!
//! - **envelope**: immutable metadata + typed payload, built once
//! - **kind**: closed set of event kinds with channel names and versions
//! - **bus_event**: sum type over every envelope the bus carries
//! - one file per owning module with its payloads and version strategies

mod bus_event;
mod envelope;
mod kind;

pub mod auth;
pub mod block;
pub mod call;
pub mod conversation;
pub mod friendship;
pub mod message;

pub use bus_event::BusEvent;
pub use envelope::{DomainEvent, EnvelopeBuilder, EventEnvelope, EventMetadata, EventPayload};
pub use kind::EventKind;
