//! Bus event sum type.
//!
//! One variant per [`EventKind`], each holding the typed envelope. Listeners
//! get their typed view through [`DomainEvent::from_bus`], never through a
//! cast on a stringly-typed channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::ValidationErrors;

use super::auth::{PasswordChanged, UserLoggedOut, UserRegistered};
use super::block::{UserBlocked, UserUnblocked};
use super::call::{CallAnswered, CallEnded, CallInitiated, CallMissed};
use super::conversation::{
    ConversationCreated, ConversationMemberAdded, ConversationMemberLeft,
    ConversationMemberRemoved,
};
use super::friendship::{
    FriendRemoved, FriendRequestAccepted, FriendRequestDeclined, FriendRequestSent,
};
use super::message::{MessageDeleted, MessageEdited, MessageSent};
use super::{DomainEvent, EventEnvelope, EventKind, EventMetadata};

macro_rules! bus_events {
    ($($variant:ident($payload:ty)),+ $(,)?) => {
        /// Any envelope the bus can carry.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "event_type", content = "envelope", rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum BusEvent {
            $($variant(EventEnvelope<$payload>),)+
        }

        impl BusEvent {
            pub fn kind(&self) -> EventKind {
                match self {
                    $(BusEvent::$variant(_) => EventKind::$variant,)+
                }
            }

            pub fn metadata(&self) -> &EventMetadata {
                match self {
                    $(BusEvent::$variant(e) => e.metadata(),)+
                }
            }

            /// Payload as JSON in its authored shape.
            pub fn payload_json(&self) -> Result<Value, serde_json::Error> {
                match self {
                    $(BusEvent::$variant(e) => e.payload_json(),)+
                }
            }

            pub fn validate(&self) -> Result<(), ValidationErrors> {
                match self {
                    $(BusEvent::$variant(e) => e.validate(),)+
                }
            }

            /// Rebuild a bus event from metadata and a payload already in the
            /// current schema shape of `metadata.event_type()`.
            pub fn from_parts(
                metadata: EventMetadata,
                payload: Value,
            ) -> Result<Self, serde_json::Error> {
                Ok(match metadata.event_type() {
                    $(EventKind::$variant => BusEvent::$variant(EventEnvelope::from_parts(
                        metadata,
                        serde_json::from_value::<$payload>(payload)?,
                    )),)+
                })
            }
        }

        $(
            impl DomainEvent for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn into_bus(envelope: EventEnvelope<Self>) -> BusEvent {
                    BusEvent::$variant(envelope)
                }

                fn from_bus(event: &BusEvent) -> Option<&EventEnvelope<Self>> {
                    match event {
                        BusEvent::$variant(e) => Some(e),
                        _ => None,
                    }
                }
            }

            impl From<EventEnvelope<$payload>> for BusEvent {
                fn from(envelope: EventEnvelope<$payload>) -> Self {
                    BusEvent::$variant(envelope)
                }
            }
        )+
    };
}

bus_events! {
    UserBlocked(UserBlocked),
    UserUnblocked(UserUnblocked),
    FriendRequestSent(FriendRequestSent),
    FriendRequestAccepted(FriendRequestAccepted),
    FriendRequestDeclined(FriendRequestDeclined),
    FriendRemoved(FriendRemoved),
    MessageSent(MessageSent),
    MessageEdited(MessageEdited),
    MessageDeleted(MessageDeleted),
    ConversationCreated(ConversationCreated),
    ConversationMemberAdded(ConversationMemberAdded),
    ConversationMemberLeft(ConversationMemberLeft),
    ConversationMemberRemoved(ConversationMemberRemoved),
    CallInitiated(CallInitiated),
    CallAnswered(CallAnswered),
    CallEnded(CallEnded),
    CallMissed(CallMissed),
    UserRegistered(UserRegistered),
    PasswordChanged(PasswordChanged),
    UserLoggedOut(UserLoggedOut),
}

impl BusEvent {
    pub fn event_id(&self) -> uuid::Uuid {
        self.metadata().event_id()
    }
}
