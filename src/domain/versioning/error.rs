//! Versioning errors.

use crate::domain::events::EventKind;

/// Direction of a single migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upgrade => write!(f, "upgrade"),
            Direction::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// Failure of a single transform on a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("required field '{0}' is missing")]
    MissingField(String),

    #[error("field '{0}' already exists")]
    FieldExists(String),
}

/// Errors raised by [`super::VersionRegistry::migrate`].
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no version strategy registered for {0}")]
    UnknownEventType(EventKind),

    #[error("invalid version {version} for {event_type}")]
    InvalidVersion { event_type: EventKind, version: u32 },

    #[error(
        "unsupported migration for {event_type} from v{from} to v{to}: \
         no {direction} transform registered for v{missing_step}"
    )]
    UnsupportedMigration {
        event_type: EventKind,
        from: u32,
        to: u32,
        direction: Direction,
        missing_step: u32,
    },

    #[error("{direction} of {event_type} at v{step} failed: {source}")]
    TransformFailed {
        event_type: EventKind,
        step: u32,
        direction: Direction,
        #[source]
        source: TransformError,
    },

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Problems detected while registering strategies or handlers at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("a version strategy for {0} is already registered")]
    DuplicateStrategy(EventKind),

    #[error("strategy for {event_type} targets v{strategy} but events are published at v{schema}")]
    VersionMismatch {
        event_type: EventKind,
        strategy: u32,
        schema: u32,
    },

    #[error("no version strategy registered for {0}")]
    MissingStrategy(EventKind),

    #[error("handler '{handler_id}' is already subscribed to {event_type}")]
    DuplicateHandler {
        event_type: EventKind,
        handler_id: String,
    },
}
