//! Error type and input checks used by every layer.

pub mod error;
pub mod validation;
