use thiserror::Error;

/// Validation failure for an entity field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Field is absent or null when a value is required
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Trimmed value is shorter than the field allows
    #[error("{field} must be at least {min_length} characters")]
    TooShort {
        field: &'static str,
        min_length: usize,
    },

    /// Required key missing from a create payload
    #[error("{field} is required")]
    Missing { field: &'static str },
}

/// Validate that a string field meets its length requirement.
///
/// Length is measured in characters after trimming surrounding whitespace,
/// but the value is returned untouched. A `None` value passes only when
/// `allow_none` is set.
pub fn validate_string_length<'a>(
    field_name: &'static str,
    value: Option<&'a str>,
    min_length: usize,
    allow_none: bool,
) -> Result<Option<&'a str>, ValidationError> {
    let Some(text) = value else {
        return if allow_none {
            Ok(None)
        } else {
            Err(ValidationError::Empty { field: field_name })
        };
    };

    if text.trim().chars().count() < min_length {
        return Err(ValidationError::TooShort {
            field: field_name,
            min_length,
        });
    }

    Ok(Some(text))
}

/// Unwrap a required payload field, reporting it by its wire name
pub fn require<T>(field: &'static str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::Missing { field })
}
