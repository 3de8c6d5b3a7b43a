//! Event kinds.
//!
//! Closed set of business occurrences the bus knows about. Every kind has a
//! distinct channel name, an owning module and a current schema version.

use serde::{Deserialize, Serialize};

/// Business occurrence tag carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    // Block module
    UserBlocked,
    UserUnblocked,

    // Friendship module
    FriendRequestSent,
    FriendRequestAccepted,
    FriendRequestDeclined,
    FriendRemoved,

    // Messaging module
    MessageSent,
    MessageEdited,
    MessageDeleted,

    // Conversation module
    ConversationCreated,
    ConversationMemberAdded,
    ConversationMemberLeft,
    ConversationMemberRemoved,

    // Call module
    CallInitiated,
    CallAnswered,
    CallEnded,
    CallMissed,

    // Auth module
    UserRegistered,
    PasswordChanged,
    UserLoggedOut,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 20] = [
        EventKind::UserBlocked,
        EventKind::UserUnblocked,
        EventKind::FriendRequestSent,
        EventKind::FriendRequestAccepted,
        EventKind::FriendRequestDeclined,
        EventKind::FriendRemoved,
        EventKind::MessageSent,
        EventKind::MessageEdited,
        EventKind::MessageDeleted,
        EventKind::ConversationCreated,
        EventKind::ConversationMemberAdded,
        EventKind::ConversationMemberLeft,
        EventKind::ConversationMemberRemoved,
        EventKind::CallInitiated,
        EventKind::CallAnswered,
        EventKind::CallEnded,
        EventKind::CallMissed,
        EventKind::UserRegistered,
        EventKind::PasswordChanged,
        EventKind::UserLoggedOut,
    ];

    /// Channel name used for subscriptions and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::UserBlocked => "user.blocked",
            EventKind::UserUnblocked => "user.unblocked",
            EventKind::FriendRequestSent => "friend_request.sent",
            EventKind::FriendRequestAccepted => "friend_request.accepted",
            EventKind::FriendRequestDeclined => "friend_request.declined",
            EventKind::FriendRemoved => "friend.removed",
            EventKind::MessageSent => "message.sent",
            EventKind::MessageEdited => "message.edited",
            EventKind::MessageDeleted => "message.deleted",
            EventKind::ConversationCreated => "conversation.created",
            EventKind::ConversationMemberAdded => "conversation.member_added",
            EventKind::ConversationMemberLeft => "conversation.member_left",
            EventKind::ConversationMemberRemoved => "conversation.member_removed",
            EventKind::CallInitiated => "call.initiated",
            EventKind::CallAnswered => "call.answered",
            EventKind::CallEnded => "call.ended",
            EventKind::CallMissed => "call.missed",
            EventKind::UserRegistered => "user.registered",
            EventKind::PasswordChanged => "user.password_changed",
            EventKind::UserLoggedOut => "user.logged_out",
        }
    }

    /// Parse a channel name back into a kind.
    pub fn from_channel(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Module that owns (authors) events of this kind.
    pub const fn source(&self) -> &'static str {
        match self {
            EventKind::UserBlocked | EventKind::UserUnblocked => "block",
            EventKind::FriendRequestSent
            | EventKind::FriendRequestAccepted
            | EventKind::FriendRequestDeclined
            | EventKind::FriendRemoved => "friendship",
            EventKind::MessageSent | EventKind::MessageEdited | EventKind::MessageDeleted => {
                "messaging"
            }
            EventKind::ConversationCreated
            | EventKind::ConversationMemberAdded
            | EventKind::ConversationMemberLeft
            | EventKind::ConversationMemberRemoved => "conversation",
            EventKind::CallInitiated
            | EventKind::CallAnswered
            | EventKind::CallEnded
            | EventKind::CallMissed => "call",
            EventKind::UserRegistered | EventKind::PasswordChanged | EventKind::UserLoggedOut => {
                "auth"
            }
        }
    }

    /// Kind of entity identified by the envelope's `aggregate_id`.
    pub const fn aggregate_type(&self) -> &'static str {
        match self {
            EventKind::UserBlocked | EventKind::UserUnblocked => "UserBlock",
            EventKind::FriendRequestSent
            | EventKind::FriendRequestAccepted
            | EventKind::FriendRequestDeclined => "FriendRequest",
            EventKind::FriendRemoved => "Friendship",
            EventKind::MessageSent | EventKind::MessageEdited | EventKind::MessageDeleted => {
                "Message"
            }
            EventKind::ConversationCreated
            | EventKind::ConversationMemberAdded
            | EventKind::ConversationMemberLeft
            | EventKind::ConversationMemberRemoved => "Conversation",
            EventKind::CallInitiated
            | EventKind::CallAnswered
            | EventKind::CallEnded
            | EventKind::CallMissed => "Call",
            EventKind::UserRegistered | EventKind::PasswordChanged | EventKind::UserLoggedOut => {
                "User"
            }
        }
    }

    /// Version events of this kind are published at today.
    pub const fn schema_version(&self) -> u32 {
        match self {
            EventKind::UserBlocked
            | EventKind::MessageSent
            | EventKind::ConversationMemberAdded
            | EventKind::CallEnded => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
