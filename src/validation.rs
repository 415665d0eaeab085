//! Input Validation
//!
//! Declarative validation for request payloads. Every inbound type implements
//! [`Validate`] and reports problems as a list of field-level errors rather
//! than a single opaque failure, so clients can surface per-field messages.
//!
//! # Usage
//!
//! ```ignore
//! use postern::validation::{Validate, FieldError, FieldErrors};
//!
//! struct LoginRequest {
//!     email: String,
//!     password: String,
//! }
//!
//! impl Validate for LoginRequest {
//!     fn validate(&self) -> Result<(), FieldErrors> {
//!         let mut errors = FieldErrors::new();
//!         errors.collect(validate_email(&self.email, "email"));
//!         errors.collect(validate_required(&self.password, "password"));
//!         errors.into_result()
//!     }
//! }
//! ```

use std::fmt;

use serde::Serialize;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,
    /// Stable machine-readable error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Value is required but missing/empty
    Required,
    /// Value is too short
    TooShort,
    /// Value is too long
    TooLong,
    /// Email format is invalid
    InvalidEmail,
    /// Two fields that must agree do not
    Mismatch,
    /// Value fails a policy check (e.g. weak password)
    PolicyViolation,
    /// Token/uid material is malformed or tampered
    InvalidToken,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::TooShort => write!(f, "too_short"),
            Self::TooLong => write!(f, "too_long"),
            Self::InvalidEmail => write!(f, "invalid_email"),
            Self::Mismatch => write!(f, "mismatch"),
            Self::PolicyViolation => write!(f, "policy_violation"),
            Self::InvalidToken => write!(f, "invalid_token"),
        }
    }
}

/// Accumulator for field-level errors
///
/// Collects every failing field instead of stopping at the first, so a form
/// round-trip reports all problems at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a one-error list for a single field
    pub fn single(field: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, code, message)])
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    /// Fold a validator result into the accumulator
    pub fn collect(&mut self, result: Result<(), FieldError>) {
        if let Err(error) = result {
            self.0.push(error);
        }
    }

    /// Merge another error list into this one
    pub fn extend(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into `Err` when any field failed
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

impl std::error::Error for FieldErrors {}

/// Trait for validatable request types
pub trait Validate {
    /// Validate the instance, returning every failing field
    fn validate(&self) -> Result<(), FieldErrors>;

    /// Check if the instance is valid (convenience method)
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

// ============================================================================
// Validators
// ============================================================================

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new(field, ErrorCode::Required, "This field is required"));
    }
    Ok(())
}

/// Validate string length bounds (inclusive, counted in chars)
pub fn validate_length(value: &str, min: usize, max: usize, field: &str) -> Result<(), FieldError> {
    let len = value.chars().count();
    if len < min {
        return Err(FieldError::new(
            field,
            ErrorCode::TooShort,
            format!("Must be at least {} characters", min),
        ));
    }
    if len > max {
        return Err(FieldError::new(
            field,
            ErrorCode::TooLong,
            format!("Must be at most {} characters", max),
        ));
    }
    Ok(())
}

/// Validate email format
///
/// Pragmatic check: accepts most valid addresses, rejects the obviously
/// malformed. Does not validate deliverability.
pub fn validate_email(value: &str, field: &str) -> Result<(), FieldError> {
    let invalid = || FieldError::new(field, ErrorCode::InvalidEmail, "Invalid email address");

    let mut parts = value.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(invalid()),
    };

    if local.is_empty() || local.len() > 64 {
        return Err(invalid());
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(invalid());
    }

    if domain.is_empty() || domain.len() > 255 || !domain.contains('.') {
        return Err(invalid());
    }
    if !domain.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        return Err(invalid());
    }

    Ok(())
}

/// Validate that two password entries agree
pub fn validate_confirmation(password: &str, confirm: &str, field: &str) -> Result<(), FieldError> {
    if password != confirm {
        return Err(FieldError::new(field, ErrorCode::Mismatch, "Passwords do not match"));
    }
    Ok(())
}

// ============================================================================
// Axum extractor
// ============================================================================

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

/// Validated JSON extractor
///
/// Deserializes the body, then runs [`Validate::validate`]. Malformed JSON
/// or failing fields reject the request with a 400 carrying the field-error
/// list, so handlers only ever see valid payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::warn!(error = %e, "JSON parsing failed");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "invalid_json",
                    "message": "Failed to parse JSON body",
                })),
            )
                .into_response()
        })?;

        if let Err(errors) = value.validate() {
            tracing::warn!(errors = %errors, "Request validation failed");
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "validation_error",
                    "message": "Request validation failed",
                    "errors": errors.0,
                })),
            )
                .into_response());
        }

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("value", "name").is_ok());
        assert!(validate_required("", "name").is_err());
        assert!(validate_required("   ", "name").is_err());
    }

    #[test]
    fn test_validate_length() {
        assert!(validate_length("hello", 1, 10, "name").is_ok());
        let err = validate_length("hi", 3, 10, "name").unwrap_err();
        assert_eq!(err.code, ErrorCode::TooShort);
        let err = validate_length("toolongvalue", 1, 5, "name").unwrap_err();
        assert_eq!(err.code, ErrorCode::TooLong);
    }

    #[test]
    fn test_validate_email_accepts_common_addresses() {
        for email in ["user@example.com", "first.last@sub.domain.org", "a+tag@x.co"] {
            assert!(validate_email(email, "email").is_ok(), "rejected {}", email);
        }
    }

    #[test]
    fn test_validate_email_rejects_malformed() {
        for email in ["", "plain", "@nodomain.com", "user@", "a@b@c.com", "user@nodot", ".lead@x.com", "dou..ble@x.com"] {
            assert!(validate_email(email, "email").is_err(), "accepted {}", email);
        }
    }

    #[test]
    fn test_validate_confirmation() {
        assert!(validate_confirmation("secret", "secret", "confirm_password").is_ok());
        let err = validate_confirmation("secret", "other", "confirm_password").unwrap_err();
        assert_eq!(err.code, ErrorCode::Mismatch);
    }

    #[test]
    fn test_field_errors_accumulate() {
        let mut errors = FieldErrors::new();
        errors.collect(validate_required("", "email"));
        errors.collect(validate_required("", "password"));
        errors.collect(validate_required("fine", "subject"));

        let errs = errors.into_result().unwrap_err();
        assert_eq!(errs.0.len(), 2);
        assert_eq!(errs.0[0].field, "email");
        assert_eq!(errs.0[1].field, "password");
    }

    #[test]
    fn test_field_errors_empty_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
