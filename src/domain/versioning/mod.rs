//! # Event Versioning
//!
//! Lets consumers written against one schema version read events authored at
//! another. Each event type registers a strategy built from single-step
//! transforms; migration composes them and fails loudly on any gap.
//!
//! ```text
//! v1 --upgrade[1]--> v2 --upgrade[2]--> v3
//! v1 <--downgrade[2]-- v2 <--downgrade[3]-- v3
//! ```

pub mod catalog;
mod error;
mod registry;
mod strategy;
pub mod transforms;

pub use error::{Direction, MigrationError, RegistrationError, TransformError};
pub use registry::VersionRegistry;
pub use strategy::{LinearStrategy, VersionStrategy};
pub use transforms::Transform;
