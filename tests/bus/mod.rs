//! End-to-end bus tests over the in-memory wiring.

mod dispatch_tests;
mod listener_tests;
mod versioning_tests;
