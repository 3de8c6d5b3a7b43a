//! # Domain Services
//!
//! Domain logic that doesn't belong to a single record, plus outbound ports
//! the listeners call.
//!
//! ## Services
//!
//! - **SystemText**: timeline text for system messages
//! - **NotificationSink**: push notification delivery port

mod notification;
mod system_text;

pub use notification::{NotificationSink, PushNotification};
pub use system_text::SystemText;

#[cfg(test)]
pub use notification::MockNotificationSink;
