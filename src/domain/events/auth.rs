//! Auth module events.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EventKind, EventPayload};
use crate::domain::versioning::LinearStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserRegistered {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 2, max = 32))]
    pub username: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PasswordChanged {
    #[validate(length(min = 1))]
    pub user_id: String,
    /// Session that performed the change and stays signed in, if any.
    #[serde(default)]
    pub current_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserLoggedOut {
    #[validate(length(min = 1))]
    pub user_id: String,
    /// `None` means every session was signed out.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl EventPayload for UserRegistered {
    fn aggregate_id(&self) -> String {
        self.user_id.clone()
    }
}

impl EventPayload for PasswordChanged {
    fn aggregate_id(&self) -> String {
        self.user_id.clone()
    }
}

impl EventPayload for UserLoggedOut {
    fn aggregate_id(&self) -> String {
        self.user_id.clone()
    }
}

pub fn version_strategies() -> Vec<(EventKind, LinearStrategy)> {
    vec![
        (EventKind::UserRegistered, LinearStrategy::new(1)),
        (EventKind::PasswordChanged, LinearStrategy::new(1)),
        (EventKind::UserLoggedOut, LinearStrategy::new(1)),
    ]
}
