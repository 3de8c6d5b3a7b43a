//! Timeline text for system messages.

use crate::domain::events::call::{CallEnded, CallMissed, CallType};
use crate::domain::events::conversation::{
    ConversationCreated, ConversationMemberAdded, ConversationMemberLeft,
    ConversationMemberRemoved, ConversationType, MemberRole,
};

/// Domain service rendering the human-readable body of system messages.
///
/// Bodies reference users by id; clients substitute display names from the
/// structured data stored next to the text.
pub struct SystemText;

impl SystemText {
    pub fn conversation_created(event: &ConversationCreated) -> String {
        match (&event.conversation_type, event.title.as_deref()) {
            (ConversationType::Group, Some(title)) => {
                format!("{} created the group \"{}\"", event.creator_id, title)
            }
            (ConversationType::Group, None) => format!("{} created the group", event.creator_id),
            (ConversationType::Direct, _) => {
                format!("{} started the conversation", event.creator_id)
            }
        }
    }

    pub fn member_added(event: &ConversationMemberAdded) -> String {
        match event.role {
            MemberRole::Member => format!("{} added {}", event.added_by, event.member_id),
            role => format!(
                "{} added {} as {}",
                event.added_by,
                event.member_id,
                role.as_str()
            ),
        }
    }

    pub fn member_left(event: &ConversationMemberLeft) -> String {
        format!("{} left the conversation", event.member_id)
    }

    pub fn member_removed(event: &ConversationMemberRemoved) -> String {
        format!("{} removed {}", event.removed_by, event.member_id)
    }

    pub fn call_ended(event: &CallEnded) -> String {
        format!(
            "{} ended ({})",
            event.call_type.label(),
            Self::duration(event.duration_seconds)
        )
    }

    pub fn call_missed(event: &CallMissed) -> String {
        let label = match event.call_type {
            CallType::Audio => "audio",
            CallType::Video => "video",
        };
        format!("Missed {} call from {}", label, event.caller_id)
    }

    /// `m:ss` below an hour, `h:mm:ss` above.
    pub fn duration(seconds: u64) -> String {
        let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
        if h > 0 {
            format!("{}:{:02}:{:02}", h, m, s)
        } else {
            format!("{}:{:02}", m, s)
        }
    }
}
