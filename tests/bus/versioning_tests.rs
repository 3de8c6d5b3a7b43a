//! Versioning Tests
//!
//! The startup catalog and payload migration between schema versions.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

use chat_event_bus::domain::events::conversation::{ConversationMemberAdded, MemberRole};
use chat_event_bus::domain::events::message::{MessageSent, MessageSentV1, MessageType};
use chat_event_bus::domain::events::EventKind;
use chat_event_bus::domain::versioning::{catalog, MigrationError};
use chat_event_bus::domain::EventEnvelope;

#[test]
fn test_catalog_covers_every_event_kind() {
    let registry = catalog::build_registry().unwrap();

    for kind in EventKind::ALL {
        assert_eq!(registry.current_version(kind), Some(kind.schema_version()));
    }
}

#[test_case(
    EventKind::ConversationMemberAdded,
    json!({"conversation_id": "c1", "member_id": "u3", "added_by": "u1"}),
    json!({"conversation_id": "c1", "member_id": "u3", "added_by": "u1", "role": "MEMBER"})
    ; "member added gains default role"
)]
#[test_case(
    EventKind::MessageSent,
    json!({"message_id": "m1", "conversation_id": "c1", "sender_id": "u1", "content": "hi"}),
    json!({"message_id": "m1", "conversation_id": "c1", "sender_id": "u1", "content": "hi", "message_type": "TEXT"})
    ; "message sent gains text type"
)]
#[test_case(
    EventKind::CallEnded,
    json!({"call_id": "k1", "conversation_id": "c1", "ended_by": "u1", "call_type": "VIDEO", "duration": 95}),
    json!({"call_id": "k1", "conversation_id": "c1", "ended_by": "u1", "call_type": "VIDEO", "duration_seconds": 95})
    ; "call ended renames duration"
)]
#[test_case(
    EventKind::UserBlocked,
    json!({"blocker_id": "u1", "blocked_id": "u2"}),
    json!({"blocker_id": "u1", "blocked_id": "u2", "reason": null})
    ; "user blocked gains empty reason"
)]
fn test_v1_payload_upgrades_and_downgrades_back(kind: EventKind, v1: Value, v2: Value) {
    let registry = catalog::build_registry().unwrap();

    let upgraded = registry.migrate(kind, v1.clone(), 1, 2).unwrap();
    assert_eq!(upgraded, v2);

    let downgraded = registry.migrate(kind, upgraded, 2, 1).unwrap();
    assert_eq!(downgraded, v1);
}

#[test]
fn test_migration_beyond_current_version_fails() {
    let registry = catalog::build_registry().unwrap();

    let err = registry
        .migrate(EventKind::MessageSent, json!({}), 1, 3)
        .unwrap_err();

    assert!(matches!(err, MigrationError::InvalidVersion { .. }));
}

#[test]
fn test_legacy_reader_sees_v1_shape() {
    let registry = catalog::build_registry().unwrap();
    let envelope = EventEnvelope::new(MessageSent {
        message_id: "m1".into(),
        conversation_id: "c1".into(),
        sender_id: "u1".into(),
        content: "hello".into(),
        message_type: MessageType::Image,
        reply_to_id: None,
    });

    let legacy: MessageSentV1 = envelope.read_as(&registry, 1).unwrap();
    assert_eq!(legacy.content, "hello");

    let raw = envelope.payload_at_version(&registry, 1).unwrap();
    assert!(raw.get("message_type").is_none());
}

#[test]
fn test_current_readers_are_untouched() {
    let registry = catalog::build_registry().unwrap();
    let envelope = EventEnvelope::new(ConversationMemberAdded {
        conversation_id: "c1".into(),
        member_id: "u3".into(),
        added_by: "u1".into(),
        role: MemberRole::Owner,
    });

    let same: ConversationMemberAdded = envelope.read_as(&registry, 2).unwrap();
    assert_eq!(&same, envelope.payload());
}
