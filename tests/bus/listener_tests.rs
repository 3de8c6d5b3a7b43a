//! Listener Tests
//!
//! Each module's listeners driven through the publisher.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use chat_event_bus::application::listeners::BlockCacheListener;
use chat_event_bus::domain::events::auth::{PasswordChanged, UserLoggedOut};
use chat_event_bus::domain::events::block::UserBlocked;
use chat_event_bus::domain::events::call::{CallEnded, CallType};
use chat_event_bus::domain::events::conversation::{
    ConversationCreated, ConversationMemberRemoved, ConversationType,
};
use chat_event_bus::domain::events::message::{MessageDeleted, MessageSent, MessageType};
use chat_event_bus::domain::{
    CachedSession, ConversationStateRepository, EventEnvelope, FriendshipRepository,
    SessionStore, SystemMessageKind, SystemMessageRepository,
};
use chat_event_bus::infrastructure::cache::CacheSessionStore;

use crate::common::TestApp;

fn message(id: &str, sender: &str, content: &str) -> MessageSent {
    MessageSent {
        message_id: id.into(),
        conversation_id: "c1".into(),
        sender_id: sender.into(),
        content: content.into(),
        message_type: MessageType::Text,
        reply_to_id: None,
    }
}

async fn create_group(app: &TestApp) {
    app.publisher
        .publish(EventEnvelope::new(ConversationCreated {
            conversation_id: "c1".into(),
            creator_id: "u1".into(),
            conversation_type: ConversationType::Group,
            member_ids: vec!["u2".into(), "u3".into()],
            title: Some("Team".into()),
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_block_invalidates_both_directions_and_ends_friendship() {
    let app = TestApp::new();
    app.friendships.add_friendship("u1", "u2");
    app.friendships.add_pending_request("u2", "u1");

    app.publisher
        .publish(EventEnvelope::new(UserBlocked {
            blocker_id: "u1".into(),
            blocked_id: "u2".into(),
            reason: None,
        }))
        .await
        .unwrap();

    let mut deleted = app.cache.deleted_keys();
    deleted.sort();
    let mut expected = BlockCacheListener::invalidation_keys("u1", "u2");
    expected.sort();
    assert_eq!(deleted, expected);
    assert_eq!(deleted.len(), 7);

    assert_eq!(app.friendships.soft_deleted_count(), 1);
    assert_eq!(app.friendships.pending_request_count(), 0);
    assert!(app.friendships.find_between("u2", "u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_group_creation_writes_timeline_and_members() {
    let app = TestApp::new();

    create_group(&app).await;

    let messages = app.system_messages.list_for_conversation("c1").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, SystemMessageKind::ConversationCreated);
    assert_eq!(messages[0].body, "u1 created the group \"Team\"");

    let members = app.conversation_state.members("c1").await.unwrap();
    assert_eq!(members, vec!["u1", "u2", "u3"]);
}

#[tokio::test]
async fn test_message_flow_updates_state_and_notifies() {
    let app = TestApp::new();
    create_group(&app).await;

    app.publisher
        .publish(EventEnvelope::new(message("m1", "u1", "hello team")))
        .await
        .unwrap();

    let last = app.conversation_state.last_message("c1").await.unwrap().unwrap();
    assert_eq!(last.message_id, "m1");
    assert_eq!(app.conversation_state.unread_count("c1", "u2").await.unwrap(), 1);
    assert_eq!(app.conversation_state.unread_count("c1", "u3").await.unwrap(), 1);
    assert_eq!(app.conversation_state.unread_count("c1", "u1").await.unwrap(), 0);

    let sent = app.notifications.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "New message from u1");
    assert_eq!(sent[0].body, "hello team");
    assert_eq!(sent[0].exclude_user_ids, vec!["u1".to_string()]);

    app.publisher
        .publish(EventEnvelope::new(MessageDeleted {
            message_id: "m1".into(),
            conversation_id: "c1".into(),
            deleted_by: "u1".into(),
        }))
        .await
        .unwrap();

    assert!(app.conversation_state.last_message("c1").await.unwrap().is_none());
    assert_eq!(app.conversation_state.unread_count("c1", "u2").await.unwrap(), 0);
}

#[tokio::test]
async fn test_removed_member_stops_receiving_unread() {
    let app = TestApp::new();
    create_group(&app).await;

    app.publisher
        .publish(EventEnvelope::new(ConversationMemberRemoved {
            conversation_id: "c1".into(),
            member_id: "u3".into(),
            removed_by: "u1".into(),
        }))
        .await
        .unwrap();
    app.publisher
        .publish(EventEnvelope::new(message("m2", "u2", "just us now")))
        .await
        .unwrap();

    assert_eq!(app.conversation_state.unread_count("c1", "u1").await.unwrap(), 1);
    assert_eq!(app.conversation_state.unread_count("c1", "u3").await.unwrap(), 0);

    let bodies: Vec<_> = app
        .system_messages
        .list_for_conversation("c1")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.body)
        .collect();
    assert_eq!(bodies[1], "u1 removed u3");
}

#[tokio::test]
async fn test_call_end_posts_one_system_message_per_event() {
    let app = TestApp::new();
    let envelope = EventEnvelope::new(CallEnded {
        call_id: "call-1".into(),
        conversation_id: "c9".into(),
        ended_by: "u1".into(),
        call_type: CallType::Video,
        duration_seconds: 95,
    });

    app.publisher
        .publish_event(envelope.clone().into_bus())
        .await
        .unwrap();
    app.publisher.publish_event(envelope.into_bus()).await.unwrap();

    let messages = app.system_messages.list_for_conversation("c9").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "Video call ended (1:35)");
}

#[tokio::test]
async fn test_password_change_revokes_other_sessions() {
    let app = TestApp::new();
    let sessions = CacheSessionStore::new(app.cache.clone());
    let expires = Utc::now() + Duration::hours(1);
    for id in ["s1", "s2", "s3"] {
        sessions.save(&CachedSession::new("u1", id, expires)).await.unwrap();
    }

    app.publisher
        .publish(EventEnvelope::new(PasswordChanged {
            user_id: "u1".into(),
            current_session_id: Some("s2".into()),
        }))
        .await
        .unwrap();

    assert_eq!(sessions.active_sessions("u1").await.unwrap(), vec!["s2"]);

    app.publisher
        .publish(EventEnvelope::new(UserLoggedOut {
            user_id: "u1".into(),
            session_id: Some("s2".into()),
        }))
        .await
        .unwrap();

    assert!(sessions.active_sessions("u1").await.unwrap().is_empty());
}
