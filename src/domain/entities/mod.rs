//! # Domain Entities
//!
//! Records the event bus persists and the repository traits that store them.
//!
//! ## Event bus records
//!
//! - **LedgerEntry**: processing state of one (event, handler) pair
//! - **EventAuditRecord**: persisted copy of every published event
//!
//! ## Listener collaborators
//!
//! - **Friendship / FriendRequest**: social graph rows the block flow cleans up
//! - **SystemMessage**: timeline lines written in reaction to events
//! - **LastMessage**: conversation read-model (last message, unread sets)
//! - **CachedSession**: signed-in sessions revoked by auth events
//!
//! ## Repository Traits
//!
//! Each record has an associated repository trait. Implementations live in
//! the infrastructure layer (PostgreSQL, Redis and in-memory backends).

mod conversation_state;
mod event_audit;
mod friendship;
mod ledger_entry;
mod session;
mod system_message;

pub use conversation_state::{ConversationStateRepository, LastMessage};
pub use event_audit::{AuditAppend, EventAuditRecord, EventAuditRepository};
pub use friendship::{
    ordered_pair, FriendRequest, FriendRequestStatus, Friendship, FriendshipRepository,
};
pub use ledger_entry::{
    ClaimOutcome, ClaimRequest, IdempotencyLedger, LedgerEntry, LedgerKey, ProcessingStatus,
    LEASE_EXPIRED_MESSAGE,
};
pub use session::{CachedSession, SessionStore};
pub use system_message::{SystemMessage, SystemMessageKind, SystemMessageRepository};

#[cfg(test)]
pub use conversation_state::MockConversationStateRepository;
#[cfg(test)]
pub use event_audit::MockEventAuditRepository;
#[cfg(test)]
pub use friendship::MockFriendshipRepository;
#[cfg(test)]
pub use ledger_entry::MockIdempotencyLedger;
#[cfg(test)]
pub use session::MockSessionStore;
#[cfg(test)]
pub use system_message::MockSystemMessageRepository;
