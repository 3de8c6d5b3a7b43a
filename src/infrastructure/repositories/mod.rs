//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgLedgerRepository** - Idempotency ledger (`event_processing_ledger`)
//! - **PgAuditRepository** - Append-only event audit log
//! - **PgFriendshipRepository** - Friendships and friend requests
//! - **PgSystemMessageRepository** - Event-sourced conversation system messages
//! - **PgConversationStateRepository** - Last message, unread sets and members
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgAuditRepository, PgLedgerRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let ledger = PgLedgerRepository::new(pool.clone());
//!     let audit = PgAuditRepository::new(pool.clone());
//! }
//! ```

// Event bus repositories
pub mod audit_repository;
pub mod ledger_repository;

// Listener collaborators
pub mod conversation_state_repository;
pub mod friendship_repository;
pub mod system_message_repository;

pub use audit_repository::PgAuditRepository;
pub use conversation_state_repository::PgConversationStateRepository;
pub use friendship_repository::PgFriendshipRepository;
pub use ledger_repository::PgLedgerRepository;
pub use system_message_repository::PgSystemMessageRepository;
