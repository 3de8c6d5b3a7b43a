//! Conversation module events.
//!
//! Creation and the three membership changes are separate kinds, each with
//! its own version strategy.

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::{EventKind, EventPayload};
use crate::domain::versioning::transforms::{add_field, remove_field};
use crate::domain::versioning::LinearStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationType {
    Direct,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    #[default]
    Member,
    Admin,
    Owner,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Member => "member",
            MemberRole::Admin => "admin",
            MemberRole::Owner => "owner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConversationCreated {
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub creator_id: String,
    pub conversation_type: ConversationType,
    #[validate(length(min = 1))]
    pub member_ids: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub title: Option<String>,
}

/// v2 added `role`; members added at v1 were plain members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConversationMemberAdded {
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub member_id: String,
    #[validate(length(min = 1))]
    pub added_by: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConversationMemberLeft {
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConversationMemberRemoved {
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub member_id: String,
    #[validate(length(min = 1))]
    pub removed_by: String,
}

impl EventPayload for ConversationCreated {
    fn aggregate_id(&self) -> String {
        self.conversation_id.clone()
    }
}

impl EventPayload for ConversationMemberAdded {
    fn aggregate_id(&self) -> String {
        self.conversation_id.clone()
    }
}

impl EventPayload for ConversationMemberLeft {
    fn aggregate_id(&self) -> String {
        self.conversation_id.clone()
    }
}

impl EventPayload for ConversationMemberRemoved {
    fn aggregate_id(&self) -> String {
        self.conversation_id.clone()
    }
}

pub fn version_strategies() -> Vec<(EventKind, LinearStrategy)> {
    vec![
        (EventKind::ConversationCreated, LinearStrategy::new(1)),
        (
            EventKind::ConversationMemberAdded,
            LinearStrategy::new(2)
                .with_upgrade(1, add_field("role", json!("MEMBER")))
                .with_downgrade(2, remove_field("role")),
        ),
        (EventKind::ConversationMemberLeft, LinearStrategy::new(1)),
        (EventKind::ConversationMemberRemoved, LinearStrategy::new(1)),
    ]
}
