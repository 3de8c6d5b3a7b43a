//! Call module events.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EventKind, EventPayload};
use crate::domain::versioning::transforms::rename_field;
use crate::domain::versioning::LinearStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn label(&self) -> &'static str {
        match self {
            CallType::Audio => "Voice call",
            CallType::Video => "Video call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CallInitiated {
    #[validate(length(min = 1))]
    pub call_id: String,
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub caller_id: String,
    pub call_type: CallType,
    #[validate(length(min = 1))]
    pub participant_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CallAnswered {
    #[validate(length(min = 1))]
    pub call_id: String,
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
}

/// v2 renamed `duration` to `duration_seconds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CallEnded {
    #[validate(length(min = 1))]
    pub call_id: String,
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub ended_by: String,
    pub call_type: CallType,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CallMissed {
    #[validate(length(min = 1))]
    pub call_id: String,
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub caller_id: String,
    pub call_type: CallType,
}

impl EventPayload for CallInitiated {
    fn aggregate_id(&self) -> String {
        self.call_id.clone()
    }
}

impl EventPayload for CallAnswered {
    fn aggregate_id(&self) -> String {
        self.call_id.clone()
    }
}

impl EventPayload for CallEnded {
    fn aggregate_id(&self) -> String {
        self.call_id.clone()
    }
}

impl EventPayload for CallMissed {
    fn aggregate_id(&self) -> String {
        self.call_id.clone()
    }
}

pub fn version_strategies() -> Vec<(EventKind, LinearStrategy)> {
    vec![
        (EventKind::CallInitiated, LinearStrategy::new(1)),
        (EventKind::CallAnswered, LinearStrategy::new(1)),
        (
            EventKind::CallEnded,
            LinearStrategy::new(2)
                .with_upgrade(1, rename_field("duration", "duration_seconds"))
                .with_downgrade(2, rename_field("duration_seconds", "duration")),
        ),
        (EventKind::CallMissed, LinearStrategy::new(1)),
    ]
}
