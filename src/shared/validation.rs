//! Validation Utilities

use validator::ValidationErrors;

/// Field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Flatten validator errors into field/message pairs.
///
/// Nested struct and list errors are not descended into; payloads are flat.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();

    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

/// Render validator errors as a single human-readable line.
pub fn describe(errors: &ValidationErrors) -> String {
    let fields = field_errors(errors);
    if fields.is_empty() {
        return "Validation failed".into();
    }

    fields
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::ValidationError;

    #[test]
    fn test_describe_uses_message_then_code() {
        let mut errors = ValidationErrors::new();
        errors.add("blocked_id", ValidationError::new("length"));
        errors.add(
            "aggregate_id",
            ValidationError::new("required").with_message("must not be empty".into()),
        );

        assert_eq!(
            describe(&errors),
            "aggregate_id: must not be empty, blocked_id: length"
        );
    }

    #[test]
    fn test_describe_empty() {
        assert_eq!(describe(&ValidationErrors::new()), "Validation failed");
    }
}
