//! Error Taxonomy and Secure Responses
//!
//! Every failure in the authentication core is a typed [`AuthError`]; nothing
//! propagates past the service boundary as a panic. The HTTP mapping hides
//! detail the client must not learn:
//!
//! - Wrong email and wrong password are indistinguishable (no enumeration)
//! - An inactive account answers exactly like bad credentials
//! - Store and mail transport failures surface as a generic server error,
//!   with the real cause logged server-side only

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::store::StoreError;
use crate::validation::FieldErrors;

/// Failure taxonomy for the authentication core
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or wrong password; the caller never learns which
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Account temporarily locked after repeated failures
    #[error("account is locked for {retry_after_secs} more seconds")]
    AccountLocked { retry_after_secs: u64 },

    /// Account exists but is disabled
    #[error("account is inactive")]
    AccountInactive,

    /// Token signature or shape is invalid
    #[error("token is invalid")]
    TokenInvalid,

    /// Token signature is fine but the token has expired
    #[error("token has expired")]
    TokenExpired,

    /// Presented refresh token has no matching ledger record
    #[error("token not found")]
    TokenNotFound,

    /// Malformed input: field-level detail for the client
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Outbound mail transport failed
    #[error("failed to send email")]
    EmailNotSent,

    /// Persistent store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable machine-readable reason for API responses
    pub fn code(&self) -> &'static str {
        match self {
            // Inactive accounts answer as bad credentials on purpose.
            Self::InvalidCredentials | Self::AccountInactive => "invalid_credentials",
            Self::AccountLocked { .. } => "account_locked",
            Self::TokenInvalid => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::TokenNotFound => "token_not_found",
            Self::Validation(_) => "validation_error",
            Self::EmailNotSent | Self::Store(_) => "server_error",
        }
    }

    /// Message safe to show to clients
    fn public_message(&self) -> String {
        match self {
            Self::InvalidCredentials | Self::AccountInactive => {
                "Unable to log in with provided credentials.".to_string()
            }
            Self::AccountLocked { retry_after_secs } => format!(
                "Account temporarily locked due to multiple failed login attempts. \
                 Try again in {} seconds.",
                retry_after_secs
            ),
            Self::TokenInvalid | Self::TokenNotFound => "Token is invalid.".to_string(),
            Self::TokenExpired => "Token has expired.".to_string(),
            Self::Validation(_) => "Request validation failed.".to_string(),
            Self::EmailNotSent | Self::Store(_) => "An internal error occurred.".to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::AccountInactive
            | Self::TokenInvalid
            | Self::TokenExpired
            | Self::TokenNotFound => StatusCode::UNAUTHORIZED,
            Self::AccountLocked { .. } => StatusCode::LOCKED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::EmailNotSent | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Internal causes are logged here and never serialized.
        if let Self::Store(ref e) = self {
            tracing::error!(error = %e, "Store failure surfaced as server error");
        }

        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => serde_json::json!({
                "error": self.code(),
                "message": self.public_message(),
                "errors": errors.0,
            }),
            _ => serde_json::json!({
                "error": self.code(),
                "message": self.public_message(),
            }),
        };

        let mut response = (status, Json(body)).into_response();

        if let Self::AccountLocked { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
