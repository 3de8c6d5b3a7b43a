//! Friendship entity and repository trait.
//!
//! Maps to the `friendships` and `friend_requests` tables. Rows are never
//! hard-deleted; removal sets `deleted_at` / `status = 'CANCELLED'`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// One direction-independent friendship.
///
/// Maps to the `friendships` table:
/// - id: VARCHAR(64) PRIMARY KEY
/// - user_low / user_high: VARCHAR(64) NOT NULL (ordered pair, unique while active)
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: String,
    pub user_low: String,
    pub user_high: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Friendship {
    pub fn new(id: impl Into<String>, a: &str, b: &str) -> Self {
        let (user_low, user_high) = ordered_pair(a, b);
        Self {
            id: id.into(),
            user_low,
            user_high,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        let (low, high) = ordered_pair(a, b);
        self.user_low == low && self.user_high == high
    }
}

/// Status of a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Maps to the `friend_requests` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FriendRequest {
    pub fn pending(id: impl Into<String>, sender_id: &str, receiver_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// True for a request between the two users, whichever direction.
    pub fn between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// Canonical (low, high) ordering so a pair has a single row.
pub fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Repository trait for friendship data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FriendshipRepository: Send + Sync {
    /// Active friendship between two users, if any.
    async fn find_between(&self, a: &str, b: &str) -> Result<Option<Friendship>, AppError>;

    /// Soft-delete the active friendship between two users.
    ///
    /// Set-based: a second call affects zero rows.
    async fn soft_delete_between(
        &self,
        a: &str,
        b: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Cancel every pending request between two users, both directions.
    async fn cancel_pending_requests_between(&self, a: &str, b: &str) -> Result<u64, AppError>;
}
