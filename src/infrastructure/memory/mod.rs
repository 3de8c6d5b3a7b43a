//! In-Memory Backends
//!
//! Process-local implementations of every storage port. Selected with
//! `storage.backend = "memory"` for single-process deployments and used by
//! the test suites.

mod audit;
mod cache;
mod conversation_state;
mod friendship;
mod ledger;
mod notification;
mod system_message;

pub use audit::InMemoryAuditRepository;
pub use cache::InMemoryCache;
pub use conversation_state::InMemoryConversationState;
pub use friendship::InMemoryFriendshipRepository;
pub use ledger::InMemoryLedger;
pub use notification::InMemoryNotificationSink;
pub use system_message::InMemorySystemMessageRepository;
