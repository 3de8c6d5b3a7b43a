//! Version strategies.
//!
//! A strategy knows the current schema version of one event type and how to
//! walk a payload between any two versions one step at a time.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Direction, MigrationError, Transform};
use crate::domain::events::EventKind;

/// Per event type migration between schema versions.
pub trait VersionStrategy: Send + Sync {
    /// Version events of this type are published at today.
    fn current_version(&self) -> u32;

    /// Reshape `payload` from version `from` to version `to`.
    fn migrate(
        &self,
        event_type: EventKind,
        payload: Value,
        from: u32,
        to: u32,
    ) -> Result<Value, MigrationError>;
}

/// Strategy built from single-step transforms.
///
/// `upgrades[n]` turns a v`n` payload into v`n+1`; `downgrades[n]` turns a
/// v`n` payload into v`n-1`. Migration composes them in order and refuses to
/// start if any step on the path is missing.
#[derive(Clone)]
pub struct LinearStrategy {
    current_version: u32,
    upgrades: BTreeMap<u32, Transform>,
    downgrades: BTreeMap<u32, Transform>,
}

impl LinearStrategy {
    pub fn new(current_version: u32) -> Self {
        Self {
            current_version,
            upgrades: BTreeMap::new(),
            downgrades: BTreeMap::new(),
        }
    }

    /// Register the transform from `from` to `from + 1`.
    pub fn with_upgrade(mut self, from: u32, transform: Transform) -> Self {
        self.upgrades.insert(from, transform);
        self
    }

    /// Register the transform from `from` to `from - 1`.
    pub fn with_downgrade(mut self, from: u32, transform: Transform) -> Self {
        self.downgrades.insert(from, transform);
        self
    }

    /// Ordered steps from `from` to `to`, or the first missing one.
    fn plan(
        &self,
        event_type: EventKind,
        from: u32,
        to: u32,
    ) -> Result<Vec<(u32, Direction, &Transform)>, MigrationError> {
        let (direction, steps, table): (Direction, Vec<u32>, _) = if to > from {
            (Direction::Upgrade, (from..to).collect(), &self.upgrades)
        } else {
            (Direction::Downgrade, (to + 1..=from).rev().collect(), &self.downgrades)
        };

        steps
            .into_iter()
            .map(|step| {
                table
                    .get(&step)
                    .map(|transform| (step, direction, transform))
                    .ok_or(MigrationError::UnsupportedMigration {
                        event_type,
                        from,
                        to,
                        direction,
                        missing_step: step,
                    })
            })
            .collect()
    }
}

impl VersionStrategy for LinearStrategy {
    fn current_version(&self) -> u32 {
        self.current_version
    }

    fn migrate(
        &self,
        event_type: EventKind,
        payload: Value,
        from: u32,
        to: u32,
    ) -> Result<Value, MigrationError> {
        for version in [from, to] {
            if version == 0 || version > self.current_version {
                return Err(MigrationError::InvalidVersion {
                    event_type,
                    version,
                });
            }
        }

        if from == to {
            return Ok(payload);
        }

        let plan = self.plan(event_type, from, to)?;

        plan.into_iter()
            .try_fold(payload, |payload, (step, direction, transform)| {
                transform(payload).map_err(|source| MigrationError::TransformFailed {
                    event_type,
                    step,
                    direction,
                    source,
                })
            })
    }
}

impl std::fmt::Debug for LinearStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearStrategy")
            .field("current_version", &self.current_version)
            .field("upgrades", &self.upgrades.keys().collect::<Vec<_>>())
            .field("downgrades", &self.downgrades.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::versioning::transforms::{add_field, remove_field, rename_field};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const KIND: EventKind = EventKind::ConversationMemberAdded;

    fn member_role() -> LinearStrategy {
        LinearStrategy::new(2)
            .with_upgrade(1, add_field("role", json!("MEMBER")))
            .with_downgrade(2, remove_field("role"))
    }

    #[test]
    fn test_upgrade_adds_role() {
        let v2 = member_role().migrate(KIND, json!({"id": "c1"}), 1, 2).unwrap();
        assert_eq!(v2, json!({"id": "c1", "role": "MEMBER"}));
    }

    #[test]
    fn test_downgrade_removes_role() {
        let v1 = member_role()
            .migrate(KIND, json!({"id": "c1", "role": "MEMBER"}), 2, 1)
            .unwrap();
        assert_eq!(v1, json!({"id": "c1"}));
    }

    #[test]
    fn test_same_version_is_identity() {
        let payload = json!({"id": "c1", "role": "ADMIN"});
        assert_eq!(member_role().migrate(KIND, payload.clone(), 2, 2).unwrap(), payload);
    }

    #[test]
    fn test_multi_step_chain_composes_in_order() {
        let strategy = LinearStrategy::new(3)
            .with_upgrade(1, add_field("duration", json!(0)))
            .with_upgrade(2, rename_field("duration", "duration_seconds"))
            .with_downgrade(3, rename_field("duration_seconds", "duration"))
            .with_downgrade(2, remove_field("duration"));

        let v3 = strategy.migrate(KIND, json!({"id": "x"}), 1, 3).unwrap();
        assert_eq!(v3, json!({"id": "x", "duration_seconds": 0}));

        let v1 = strategy.migrate(KIND, v3, 3, 1).unwrap();
        assert_eq!(v1, json!({"id": "x"}));
    }

    #[test]
    fn test_missing_step_fails_before_transforming() {
        // v2 -> v3 exists but v1 -> v2 does not
        let strategy = LinearStrategy::new(3).with_upgrade(2, add_field("b", json!(true)));

        let err = strategy.migrate(KIND, json!({"a": 1}), 1, 3).unwrap_err();
        match err {
            MigrationError::UnsupportedMigration {
                missing_step,
                direction,
                ..
            } => {
                assert_eq!(missing_step, 1);
                assert_eq!(direction, Direction::Upgrade);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_downgrade_is_unsupported() {
        let strategy = LinearStrategy::new(2).with_upgrade(1, add_field("role", json!("MEMBER")));

        let err = strategy.migrate(KIND, json!({"role": "MEMBER"}), 2, 1).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::UnsupportedMigration { missing_step: 2, direction: Direction::Downgrade, .. }
        ));
    }

    #[test]
    fn test_versions_outside_range_are_invalid() {
        let strategy = member_role();

        assert!(matches!(
            strategy.migrate(KIND, json!({}), 0, 1),
            Err(MigrationError::InvalidVersion { version: 0, .. })
        ));
        assert!(matches!(
            strategy.migrate(KIND, json!({}), 1, 3),
            Err(MigrationError::InvalidVersion { version: 3, .. })
        ));
    }

    #[test]
    fn test_transform_failure_names_step() {
        let strategy = LinearStrategy::new(2)
            .with_upgrade(1, rename_field("duration", "duration_seconds"));

        let err = strategy.migrate(KIND, json!({}), 1, 2).unwrap_err();
        assert!(matches!(err, MigrationError::TransformFailed { step: 1, .. }));
    }
}
