//! Application Layer
//!
//! Moves events from publishers to listeners. This layer orchestrates the
//! flow between the domain contract and the infrastructure backends.

pub mod bus;
pub mod listeners;
pub mod services;
