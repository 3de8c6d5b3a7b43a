//! Version registry.
//!
//! Process-wide map from event type to its [`VersionStrategy`]. Populated
//! once at startup through `&mut self`, then shared behind an `Arc` and only
//! read; no locking is needed after that point.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{MigrationError, RegistrationError, VersionStrategy};
use crate::domain::events::EventKind;

/// Event type to strategy map.
#[derive(Default, Clone)]
pub struct VersionRegistry {
    strategies: HashMap<EventKind, Arc<dyn VersionStrategy>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `strategy` for `event_type`, replacing any earlier one.
    ///
    /// Returns the replaced strategy. Startup wiring should prefer
    /// [`VersionRegistry::register_unique`], which refuses to replace.
    pub fn register(
        &mut self,
        event_type: EventKind,
        strategy: impl VersionStrategy + 'static,
    ) -> Option<Arc<dyn VersionStrategy>> {
        let previous = self.strategies.insert(event_type, Arc::new(strategy));
        if previous.is_some() {
            warn!(event_type = %event_type, "Version strategy replaced");
        }
        previous
    }

    /// Register `strategy` for `event_type`, failing if one already exists.
    pub fn register_unique(
        &mut self,
        event_type: EventKind,
        strategy: impl VersionStrategy + 'static,
    ) -> Result<(), RegistrationError> {
        if self.strategies.contains_key(&event_type) {
            return Err(RegistrationError::DuplicateStrategy(event_type));
        }
        self.strategies.insert(event_type, Arc::new(strategy));
        Ok(())
    }

    pub fn is_registered(&self, event_type: EventKind) -> bool {
        self.strategies.contains_key(&event_type)
    }

    pub fn current_version(&self, event_type: EventKind) -> Option<u32> {
        self.strategies
            .get(&event_type)
            .map(|strategy| strategy.current_version())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<EventKind> {
        let mut kinds: Vec<_> = self.strategies.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Reshape `payload` of `event_type` from version `from` to `to`.
    pub fn migrate(
        &self,
        event_type: EventKind,
        payload: Value,
        from: u32,
        to: u32,
    ) -> Result<Value, MigrationError> {
        let strategy = self
            .strategies
            .get(&event_type)
            .ok_or(MigrationError::UnknownEventType(event_type))?;

        let result = strategy.migrate(event_type, payload, from, to);

        match &result {
            Ok(_) if from != to => debug!(event_type = %event_type, from, to, "Payload migrated"),
            Ok(_) => {}
            Err(e) => {
                warn!(event_type = %event_type, from, to, error = %e, "Payload migration failed")
            }
        }

        result
    }
}

impl std::fmt::Debug for VersionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}
