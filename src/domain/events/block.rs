//! Block module events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use super::{EventKind, EventPayload};
use crate::domain::versioning::transforms::{add_field, remove_field};
use crate::domain::versioning::LinearStrategy;

/// A user blocked another user.
///
/// v2 added the optional `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "distinct_block_users"))]
pub struct UserBlocked {
    #[validate(length(min = 1, max = 64))]
    pub blocker_id: String,
    #[validate(length(min = 1, max = 64))]
    pub blocked_id: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// A user lifted an earlier block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserUnblocked {
    #[validate(length(min = 1, max = 64))]
    pub blocker_id: String,
    #[validate(length(min = 1, max = 64))]
    pub blocked_id: String,
}

fn distinct_block_users(event: &UserBlocked) -> Result<(), ValidationError> {
    if event.blocker_id == event.blocked_id {
        return Err(ValidationError::new("self_block")
            .with_message("a user cannot block themselves".into()));
    }
    Ok(())
}

impl EventPayload for UserBlocked {
    fn aggregate_id(&self) -> String {
        self.blocker_id.clone()
    }
}

impl EventPayload for UserUnblocked {
    fn aggregate_id(&self) -> String {
        self.blocker_id.clone()
    }
}

pub fn version_strategies() -> Vec<(EventKind, LinearStrategy)> {
    vec![
        (
            EventKind::UserBlocked,
            LinearStrategy::new(2)
                .with_upgrade(1, add_field("reason", Value::Null))
                .with_downgrade(2, remove_field("reason")),
        ),
        (EventKind::UserUnblocked, LinearStrategy::new(1)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_block_is_invalid() {
        let event = UserBlocked {
            blocker_id: "u1".into(),
            blocked_id: "u1".into(),
            reason: None,
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_v1_payload_deserializes_without_reason() {
        let event: UserBlocked =
            serde_json::from_value(serde_json::json!({"blocker_id": "u1", "blocked_id": "u2"}))
                .unwrap();
        assert_eq!(event.reason, None);
    }
}
