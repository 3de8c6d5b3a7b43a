//! In-process event bus plumbing.
//!
//! - **handler**: the typed `EventHandler<E>` trait listeners implement
//! - **registry**: subscriptions keyed by `EventKind`, built once at startup

mod handler;
mod registry;

pub use handler::{EventHandler, Handled};
pub use registry::HandlerRegistry;

pub(crate) use handler::Subscriber;
