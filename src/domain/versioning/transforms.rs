//! Reusable single-step payload transforms.
//!
//! Transforms are pure: they take a payload by value and return the reshaped
//! payload, without I/O or external state.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::TransformError;

/// Pure payload transform for one version step.
pub type Transform = Arc<dyn Fn(Value) -> Result<Value, TransformError> + Send + Sync>;

fn object(payload: Value) -> Result<Map<String, Value>, TransformError> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(TransformError::NotAnObject),
    }
}

/// Add `name` with `default` unless the payload already carries it.
pub fn add_field(name: &'static str, default: Value) -> Transform {
    Arc::new(move |payload| {
        let mut map = object(payload)?;
        map.entry(name).or_insert_with(|| default.clone());
        Ok(Value::Object(map))
    })
}

/// Drop `name` if present.
pub fn remove_field(name: &'static str) -> Transform {
    Arc::new(move |payload| {
        let mut map = object(payload)?;
        map.remove(name);
        Ok(Value::Object(map))
    })
}

/// Move `from` to `to`. The source field must exist and the target must not.
pub fn rename_field(from: &'static str, to: &'static str) -> Transform {
    Arc::new(move |payload| {
        let mut map = object(payload)?;
        if map.contains_key(to) {
            return Err(TransformError::FieldExists(to.to_string()));
        }
        let value = map
            .remove(from)
            .ok_or_else(|| TransformError::MissingField(from.to_string()))?;
        map.insert(to.to_string(), value);
        Ok(Value::Object(map))
    })
}
