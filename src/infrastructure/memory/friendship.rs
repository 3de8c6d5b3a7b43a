//! In-memory friendships and friend requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{FriendRequest, FriendRequestStatus, Friendship, FriendshipRepository};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
pub struct InMemoryFriendshipRepository {
    friendships: RwLock<Vec<Friendship>>,
    requests: RwLock<Vec<FriendRequest>>,
}

impl InMemoryFriendshipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_friendship(&self, a: &str, b: &str) -> Friendship {
        let friendship = Friendship::new(Uuid::now_v7().to_string(), a, b);
        self.friendships.write().push(friendship.clone());
        friendship
    }

    pub fn add_pending_request(&self, sender_id: &str, receiver_id: &str) -> FriendRequest {
        let request = FriendRequest::pending(Uuid::now_v7().to_string(), sender_id, receiver_id);
        self.requests.write().push(request.clone());
        request
    }

    pub fn soft_deleted_count(&self) -> usize {
        self.friendships
            .read()
            .iter()
            .filter(|f| !f.is_active())
            .count()
    }

    pub fn pending_request_count(&self) -> usize {
        self.requests
            .read()
            .iter()
            .filter(|r| r.status == FriendRequestStatus::Pending)
            .count()
    }
}

#[async_trait]
impl FriendshipRepository for InMemoryFriendshipRepository {
    async fn find_between(&self, a: &str, b: &str) -> Result<Option<Friendship>, AppError> {
        Ok(self
            .friendships
            .read()
            .iter()
            .find(|f| f.is_active() && f.connects(a, b))
            .cloned())
    }

    async fn soft_delete_between(
        &self,
        a: &str,
        b: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut affected = 0;
        for friendship in self.friendships.write().iter_mut() {
            if friendship.is_active() && friendship.connects(a, b) {
                friendship.deleted_at = Some(at);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn cancel_pending_requests_between(&self, a: &str, b: &str) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut affected = 0;
        for request in self.requests.write().iter_mut() {
            if request.status == FriendRequestStatus::Pending && request.between(a, b) {
                request.status = FriendRequestStatus::Cancelled;
                request.updated_at = now;
                affected += 1;
            }
        }
        Ok(affected)
    }
}
