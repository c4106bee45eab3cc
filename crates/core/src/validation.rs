//! Custom field rules used by the request shapes' `Validate` derives.

use validator::{ValidateEmail, ValidationError};

/// An email field may be left blank, but when filled it must be well formed.
pub(crate) fn blank_or_email(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || value.validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

/// Deal values are finite and never negative. `f64` is `Copy`, so the
/// derive hands it over by value.
pub(crate) fn deal_value(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new("deal_value"))
    }
}

/// Rejects strings that are empty once surrounding whitespace is removed.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank"))
    } else {
        Ok(())
    }
}
