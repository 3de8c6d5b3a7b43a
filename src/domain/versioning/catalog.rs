//! Startup strategy catalogue.
//!
//! Collects the (event type, strategy) pairs every module exports and loads
//! them into a fresh [`VersionRegistry`]. Collisions, version drift and
//! unregistered kinds abort startup instead of surfacing during a live
//! migration.

use tracing::info;

use super::{LinearStrategy, RegistrationError, VersionRegistry, VersionStrategy};
use crate::domain::events::{auth, block, call, conversation, friendship, message, EventKind};

/// Every module's strategies, in no particular order.
pub fn all_strategies() -> Vec<(EventKind, LinearStrategy)> {
    [
        block::version_strategies(),
        friendship::version_strategies(),
        message::version_strategies(),
        conversation::version_strategies(),
        call::version_strategies(),
        auth::version_strategies(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Register `strategies` into a new registry, checking the result is complete.
pub fn build_registry_from(
    strategies: impl IntoIterator<Item = (EventKind, LinearStrategy)>,
) -> Result<VersionRegistry, RegistrationError> {
    let mut registry = VersionRegistry::new();

    for (event_type, strategy) in strategies {
        let schema = event_type.schema_version();
        if strategy.current_version() != schema {
            return Err(RegistrationError::VersionMismatch {
                event_type,
                strategy: strategy.current_version(),
                schema,
            });
        }
        registry.register_unique(event_type, strategy)?;
    }

    if let Some(missing) = EventKind::ALL
        .into_iter()
        .find(|kind| !registry.is_registered(*kind))
    {
        return Err(RegistrationError::MissingStrategy(missing));
    }

    Ok(registry)
}

/// Registry holding every module's strategies.
pub fn build_registry() -> Result<VersionRegistry, RegistrationError> {
    let registry = build_registry_from(all_strategies())?;
    info!(event_types = registry.len(), "Version strategies registered");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalog_covers_every_kind_once() {
        let registry = build_registry().unwrap();

        assert_eq!(registry.len(), EventKind::ALL.len());
        for kind in EventKind::ALL {
            assert_eq!(registry.current_version(kind), Some(kind.schema_version()));
        }
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let mut reversed = all_strategies();
        reversed.reverse();

        let forward = build_registry_from(all_strategies()).unwrap();
        let backward = build_registry_from(reversed).unwrap();

        assert_eq!(forward.event_types(), backward.event_types());
    }

    #[test]
    fn test_aliased_membership_events_fail_startup() {
        // Three membership events aliased onto one key must not silently
        // discard each other.
        let mut strategies = all_strategies();
        strategies.push((EventKind::ConversationCreated, LinearStrategy::new(1)));

        let err = build_registry_from(strategies).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateStrategy(EventKind::ConversationCreated)
        );
    }

    #[test]
    fn test_version_drift_fails_startup() {
        let strategies = all_strategies()
            .into_iter()
            .map(|(kind, strategy)| {
                if kind == EventKind::MessageSent {
                    (kind, LinearStrategy::new(1))
                } else {
                    (kind, strategy)
                }
            })
            .collect::<Vec<_>>();

        let err = build_registry_from(strategies).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::VersionMismatch { event_type: EventKind::MessageSent, strategy: 1, schema: 2 }
        ));
    }

    #[test]
    fn test_missing_kind_fails_startup() {
        let strategies = all_strategies()
            .into_iter()
            .filter(|(kind, _)| *kind != EventKind::CallMissed);

        let err = build_registry_from(strategies).unwrap_err();
        assert_eq!(err, RegistrationError::MissingStrategy(EventKind::CallMissed));
    }
}
