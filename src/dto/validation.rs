//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a text field is not blank once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a group label: non-blank, at most 32 characters, no control characters.
pub fn validate_group_label(label: &str) -> Result<(), ValidationError> {
    validate_not_blank(label)?;

    let length = label.chars().count();
    if length > 32 {
        let mut err = ValidationError::new("group_label_length");
        err.message = Some(format!("Group label must be at most 32 characters (got {length})").into());
        return Err(err);
    }

    if label.chars().any(char::is_control) {
        let mut err = ValidationError::new("group_label_format");
        err.message = Some("Group label must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}
