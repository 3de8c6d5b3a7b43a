//! Friendship module events.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EventKind, EventPayload};
use crate::domain::versioning::LinearStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FriendRequestSent {
    #[validate(length(min = 1))]
    pub request_id: String,
    #[validate(length(min = 1))]
    pub sender_id: String,
    #[validate(length(min = 1))]
    pub receiver_id: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FriendRequestAccepted {
    #[validate(length(min = 1))]
    pub request_id: String,
    #[validate(length(min = 1))]
    pub friendship_id: String,
    #[validate(length(min = 1))]
    pub sender_id: String,
    #[validate(length(min = 1))]
    pub receiver_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FriendRequestDeclined {
    #[validate(length(min = 1))]
    pub request_id: String,
    #[validate(length(min = 1))]
    pub sender_id: String,
    #[validate(length(min = 1))]
    pub receiver_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FriendRemoved {
    #[validate(length(min = 1))]
    pub friendship_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub friend_id: String,
}

impl EventPayload for FriendRequestSent {
    fn aggregate_id(&self) -> String {
        self.request_id.clone()
    }
}

impl EventPayload for FriendRequestAccepted {
    fn aggregate_id(&self) -> String {
        self.request_id.clone()
    }
}

impl EventPayload for FriendRequestDeclined {
    fn aggregate_id(&self) -> String {
        self.request_id.clone()
    }
}

impl EventPayload for FriendRemoved {
    fn aggregate_id(&self) -> String {
        self.friendship_id.clone()
    }
}

pub fn version_strategies() -> Vec<(EventKind, LinearStrategy)> {
    vec![
        (EventKind::FriendRequestSent, LinearStrategy::new(1)),
        (EventKind::FriendRequestAccepted, LinearStrategy::new(1)),
        (EventKind::FriendRequestDeclined, LinearStrategy::new(1)),
        (EventKind::FriendRemoved, LinearStrategy::new(1)),
    ]
}
