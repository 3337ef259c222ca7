//! Form validation.
//!
//! Every mutation payload is schema-checked locally before a network call is
//! attempted. Per-field rules come from `validator` derives on the request
//! types; cross-field rules (e.g. "deadline after start date") run only once
//! all per-field rules pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::error::PactError;

/// Field name → first violated constraint's message.
pub type FieldErrors = BTreeMap<String, String>;

/// A validated mutation payload.
///
/// Implementors get per-field rules from their `Validate` derive and may
/// override [`cross_field`](FormRequest::cross_field) for rules spanning
/// multiple fields. Cross-field rules see the current time so date-window
/// constraints stay testable.
pub trait FormRequest: Validate {
    /// Cross-field rule, evaluated only after all per-field rules pass.
    /// Returns the offending field name and a message on violation.
    fn cross_field(&self, _now: DateTime<Utc>) -> Result<(), (String, String)> {
        Ok(())
    }
}

/// Validate a form, returning a field → message map on failure.
pub fn validate_form<T: FormRequest>(form: &T, now: DateTime<Utc>) -> Result<(), FieldErrors> {
    if let Err(errors) = form.validate() {
        return Err(flatten_errors(errors));
    }
    if let Err((field, message)) = form.cross_field(now) {
        let mut fields = FieldErrors::new();
        fields.insert(field, message);
        return Err(fields);
    }
    Ok(())
}

/// Validate a form and convert failure into a [`PactError::Validation`].
pub fn check_form<T: FormRequest>(form: &T, now: DateTime<Utc>) -> Result<(), PactError> {
    validate_form(form, now).map_err(|fields| PactError::Validation { fields })
}

/// Flatten `validator`'s nested errors, keeping the first message per field.
fn flatten_errors(errors: validator::ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        if let Some(first) = errs.first() {
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for '{field}'"));
            fields.entry(field.to_string()).or_insert(message);
        }
    }
    fields
}
