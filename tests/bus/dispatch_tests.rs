//! Publish, Dispatch and Replay Tests
//!
//! Audit-before-dispatch, handler isolation, duplicate deliveries and replay
//! of stored events.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use chat_event_bus::application::bus::Handled;
use chat_event_bus::application::listeners::{
    BlockCacheListener, ConversationSystemMessageListener, FriendshipBlockListener,
};
use chat_event_bus::application::services::{IdempotencyError, PublishError};
use chat_event_bus::domain::events::block::UserBlocked;
use chat_event_bus::domain::events::conversation::{ConversationMemberAdded, MemberRole};
use chat_event_bus::domain::{
    AuditAppend, EventAuditRecord, EventAuditRepository, EventEnvelope, ProcessingStatus,
    SystemMessageRepository,
};

use crate::common::{BrokenAudit, BrokenFriendships, CountingFriendships, TestApp};

fn blocked(blocker: &str, blocked: &str) -> EventEnvelope<UserBlocked> {
    EventEnvelope::builder(UserBlocked {
        blocker_id: blocker.into(),
        blocked_id: blocked.into(),
        reason: Some("spam".into()),
    })
    .correlation_id("req-1")
    .build()
}

#[tokio::test]
async fn test_publish_audits_then_dispatches_to_every_subscriber() {
    let app = TestApp::new();
    let envelope = blocked("u1", "u2");
    let event_id = envelope.event_id();

    let report = app.publisher.publish_event(envelope.into_bus()).await.unwrap();

    assert_eq!(report.audit, Some(AuditAppend::Inserted));
    assert!(report.all_succeeded());
    assert_eq!(report.executed_count(), 2);
    assert_eq!(app.audit.len(), 1);

    let entries = app.ledger.entries_for(event_id);
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == ProcessingStatus::Success));
}

#[tokio::test]
async fn test_redelivery_skips_completed_handlers() {
    let app = TestApp::new();
    let envelope = blocked("u1", "u2");

    app.publisher
        .publish_event(envelope.clone().into_bus())
        .await
        .unwrap();
    let calls_after_first = app.cache.call_count();

    let report = app.publisher.publish_event(envelope.into_bus()).await.unwrap();

    assert_eq!(report.audit, Some(AuditAppend::Duplicate));
    assert_eq!(report.executed_count(), 0);
    assert_eq!(
        report.outcome_of(BlockCacheListener::HANDLER_ID).unwrap().as_ref().unwrap(),
        &Handled::AlreadyProcessed
    );
    assert_eq!(app.cache.call_count(), calls_after_first);
    assert_eq!(app.audit.len(), 1);
}

#[tokio::test]
async fn test_failing_handler_does_not_affect_the_others() {
    let app = TestApp::with_backends(|backends| {
        backends.friendships = Arc::new(BrokenFriendships);
    });
    let envelope = blocked("u1", "u2");
    let event_id = envelope.event_id();

    let report = app.publisher.publish_event(envelope.into_bus()).await.unwrap();

    assert!(!report.all_succeeded());
    let failures: Vec<_> = report.failures().map(|(id, _)| id).collect();
    assert_eq!(failures, vec![FriendshipBlockListener::HANDLER_ID]);
    assert!(matches!(
        report.outcome_of(FriendshipBlockListener::HANDLER_ID),
        Some(Err(IdempotencyError::HandlerFailure { .. }))
    ));
    assert_eq!(
        report.outcome_of(BlockCacheListener::HANDLER_ID).unwrap().as_ref().unwrap(),
        &Handled::Executed
    );

    let entries = app.ledger.entries_for(event_id);
    let friendship = entries
        .iter()
        .find(|e| e.handler_id == FriendshipBlockListener::HANDLER_ID)
        .unwrap();
    assert_eq!(friendship.status, ProcessingStatus::Failed);
    assert_eq!(friendship.retry_count, 1);
    assert!(friendship
        .error_message
        .as_deref()
        .unwrap()
        .contains("friendships table unavailable"));

    let cache = entries
        .iter()
        .find(|e| e.handler_id == BlockCacheListener::HANDLER_ID)
        .unwrap();
    assert_eq!(cache.status, ProcessingStatus::Success);
}

#[tokio::test]
async fn test_redelivery_after_failure_reports_previous_failure() {
    let app = TestApp::with_backends(|backends| {
        backends.friendships = Arc::new(BrokenFriendships);
    });
    let envelope = blocked("u1", "u2");

    app.publisher
        .publish_event(envelope.clone().into_bus())
        .await
        .unwrap();
    let report = app.publisher.redeliver(&envelope.into_bus()).await.unwrap();

    assert!(report.audit.is_none());
    assert!(matches!(
        report.outcome_of(FriendshipBlockListener::HANDLER_ID),
        Some(Err(IdempotencyError::PreviouslyFailed { retry_count: 1, .. }))
    ));
}

#[tokio::test]
async fn test_concurrent_deliveries_execute_once() {
    let counting = Arc::new(CountingFriendships::new(Arc::new(
        chat_event_bus::infrastructure::memory::InMemoryFriendshipRepository::new(),
    )));
    let app = {
        let counting = counting.clone();
        TestApp::with_backends(move |backends| backends.friendships = counting)
    };
    let event = blocked("u1", "u2").into_bus();

    let (first, second) = tokio::join!(
        app.publisher.publish_event(event.clone()),
        app.publisher.publish_event(event.clone()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(counting.soft_delete_calls(), 1);

    let outcomes = [
        first.outcome_of(FriendshipBlockListener::HANDLER_ID).unwrap(),
        second.outcome_of(FriendshipBlockListener::HANDLER_ID).unwrap(),
    ];
    let executed = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(Handled::Executed)))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(Handled::AlreadyProcessed)))
        .count();
    assert_eq!((executed, skipped), (1, 1));
    assert_eq!(app.audit.len(), 1);
}

#[tokio::test]
async fn test_audit_failure_stops_dispatch() {
    let app = TestApp::with_backends(|backends| {
        backends.audit = Arc::new(BrokenAudit);
    });

    let err = app
        .publisher
        .publish(blocked("u1", "u2"))
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Audit { .. }));
    assert!(app.ledger.is_empty());
    assert_eq!(app.cache.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_envelope_is_rejected_before_audit() {
    let app = TestApp::new();

    let err = app
        .publisher
        .publish(blocked("u1", "u1"))
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Validation { .. }));
    assert!(app.audit.is_empty());
    assert!(app.ledger.is_empty());
}

#[tokio::test]
async fn test_replay_migrates_stored_v1_payload() {
    let app = TestApp::new();
    let envelope = EventEnvelope::builder(ConversationMemberAdded {
        conversation_id: "c1".into(),
        member_id: "u3".into(),
        added_by: "u1".into(),
        role: MemberRole::Admin,
    })
    .build();
    let event_id = envelope.event_id();

    // as an older producer would have stored it
    let mut record = EventAuditRecord::from_event(&envelope.into_bus()).unwrap();
    record.event_version = 1;
    record.payload.as_object_mut().unwrap().remove("role");
    app.audit.append(&record).await.unwrap();

    let report = app.publisher.replay(event_id).await.unwrap();

    assert!(report.all_succeeded());
    let messages = app.system_messages.list_for_conversation("c1").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "u1 added u3");
    assert_eq!(messages[0].data["role"], "MEMBER");
    assert_eq!(messages[0].source_event_id, event_id);
    assert_eq!(messages[0].handler_id, ConversationSystemMessageListener::HANDLER_ID);
}

#[tokio::test]
async fn test_replay_of_unknown_event_is_not_found() {
    let app = TestApp::new();
    let missing = uuid::Uuid::now_v7();

    let err = app.publisher.replay(missing).await.unwrap_err();

    assert!(matches!(err, PublishError::NotFound(id) if id == missing));
}

#[tokio::test]
async fn test_correlated_events_are_queryable_from_the_audit_log() {
    let app = TestApp::new();
    let parent = blocked("u1", "u2");
    let child = EventEnvelope::builder(UserBlocked {
        blocker_id: "u1".into(),
        blocked_id: "u3".into(),
        reason: None,
    })
    .caused_by(parent.metadata())
    .build();
    let parent_id = parent.event_id();

    app.publisher.publish(parent).await.unwrap();
    app.publisher.publish(child).await.unwrap();

    let records = app.audit.find_by_correlation("req-1").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].causation_id, Some(parent_id));
}

#[tokio::test]
async fn test_aggregate_history_is_rebuilt_from_the_audit_log() {
    let app = TestApp::new();
    let first = blocked("u1", "u2");
    let second = blocked("u1", "u3");
    let aggregate_type = first.metadata().aggregate_type();
    let ids = vec![first.event_id(), second.event_id()];

    app.publisher.publish(first).await.unwrap();
    app.publisher.publish(blocked("u9", "u2")).await.unwrap();
    app.publisher.publish(second).await.unwrap();

    let history = app.publisher.history(aggregate_type, "u1", 10).await.unwrap();
    let found: Vec<_> = history.iter().map(|event| event.event_id()).collect();
    assert_eq!(found, ids);

    let first_only = app.publisher.history(aggregate_type, "u1", 1).await.unwrap();
    assert_eq!(first_only.len(), 1);
    assert_eq!(first_only[0].event_id(), ids[0]);
}
