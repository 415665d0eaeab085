//! Security Event Logging
//!
//! Provides structured logging for security-relevant events: authentication
//! outcomes, token lifecycle transitions, account state changes, and contact
//! form activity.
//!
//! # Usage
//!
//! ```ignore
//! use postern::observability::SecurityEvent;
//!
//! postern::security_event!(
//!     SecurityEvent::AuthenticationSuccess,
//!     email = %user.email,
//!     ip_address = %client_ip,
//!     "User authenticated successfully"
//! );
//! ```

use std::fmt;

/// Security event categories for audit logging.
///
/// Every state transition in the authentication core emits exactly one of
/// these events. Events carry a category for filtering and a severity that
/// selects the tracing level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    // Authentication events
    /// Successful user authentication
    AuthenticationSuccess,
    /// Failed authentication attempt
    AuthenticationFailure,
    /// User logout (refresh token blacklisted)
    Logout,

    // Token lifecycle events
    /// Access/refresh token pair issued
    TokenIssued,
    /// Access token minted from a refresh token
    TokenRefreshed,
    /// Refresh token blacklisted
    TokenRevoked,
    /// Expired ledger records deleted
    TokensPurged,

    // Account events
    /// New user registered
    UserRegistered,
    /// Account locked after repeated failures
    AccountLocked,
    /// Account lock cleared
    AccountUnlocked,
    /// Password changed by the user
    PasswordChanged,
    /// Password reset requested
    PasswordResetRequested,
    /// Password reset completed via emailed token
    PasswordResetCompleted,
    /// Email verification link requested
    VerificationRequested,
    /// Email address verified
    EmailVerified,

    // Site events
    /// Contact form submission accepted
    ContactReceived,
}

impl SecurityEvent {
    /// Get the event category for filtering/grouping
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess | Self::AuthenticationFailure | Self::Logout => {
                "authentication"
            }

            Self::TokenIssued
            | Self::TokenRefreshed
            | Self::TokenRevoked
            | Self::TokensPurged => "token",

            Self::UserRegistered
            | Self::AccountLocked
            | Self::AccountUnlocked
            | Self::PasswordChanged
            | Self::PasswordResetRequested
            | Self::PasswordResetCompleted
            | Self::VerificationRequested
            | Self::EmailVerified => "account",

            Self::ContactReceived => "site",
        }
    }

    /// Get the severity level for the event
    pub fn severity(&self) -> Severity {
        match self {
            // High - security-relevant failures and forced lockouts
            Self::AuthenticationFailure | Self::AccountLocked => Severity::High,

            // Medium - important state changes
            Self::UserRegistered
            | Self::AccountUnlocked
            | Self::PasswordChanged
            | Self::PasswordResetRequested
            | Self::PasswordResetCompleted
            | Self::EmailVerified
            | Self::TokenRevoked => Severity::Medium,

            // Low - routine operations
            Self::AuthenticationSuccess
            | Self::Logout
            | Self::TokenIssued
            | Self::TokenRefreshed
            | Self::TokensPurged
            | Self::VerificationRequested
            | Self::ContactReceived => Severity::Low,
        }
    }

    /// Get the event name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::Logout => "logout",
            Self::TokenIssued => "token_issued",
            Self::TokenRefreshed => "token_refreshed",
            Self::TokenRevoked => "token_revoked",
            Self::TokensPurged => "tokens_purged",
            Self::UserRegistered => "user_registered",
            Self::AccountLocked => "account_locked",
            Self::AccountUnlocked => "account_unlocked",
            Self::PasswordChanged => "password_changed",
            Self::PasswordResetRequested => "password_reset_requested",
            Self::PasswordResetCompleted => "password_reset_completed",
            Self::VerificationRequested => "verification_requested",
            Self::EmailVerified => "email_verified",
            Self::ContactReceived => "contact_received",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine operations
    Low,
    /// Important state changes
    Medium,
    /// Security-relevant failures
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Log a security event with structured fields.
///
/// The macro automatically includes:
/// - `security_event`: Event type name
/// - `category`: Event category
/// - `severity`: Event severity level
///
/// Severity selects the tracing level: High logs at `warn`, everything else
/// at `info`.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event = $event;
        let severity = event.severity();
        let category = event.category();
        let event_name = event.name();

        match severity {
            $crate::observability::Severity::High => {
                ::tracing::warn!(
                    security_event = event_name,
                    category = category,
                    severity = %severity,
                    $($field)*
                );
            }
            _ => {
                ::tracing::info!(
                    security_event = event_name,
                    category = category,
                    severity = %severity,
                    $($field)*
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_snake_case() {
        let events = [
            SecurityEvent::AuthenticationSuccess,
            SecurityEvent::TokenIssued,
            SecurityEvent::PasswordResetCompleted,
            SecurityEvent::ContactReceived,
        ];
        for event in events {
            let name = event.name();
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(SecurityEvent::AuthenticationFailure.category(), "authentication");
        assert_eq!(SecurityEvent::TokenRevoked.category(), "token");
        assert_eq!(SecurityEvent::AccountLocked.category(), "account");
        assert_eq!(SecurityEvent::ContactReceived.category(), "site");
    }

    #[test]
    fn test_severities() {
        assert_eq!(SecurityEvent::AuthenticationFailure.severity(), Severity::High);
        assert_eq!(SecurityEvent::AccountLocked.severity(), Severity::High);
        assert_eq!(SecurityEvent::PasswordChanged.severity(), Severity::Medium);
        assert_eq!(SecurityEvent::TokenIssued.severity(), Severity::Low);
    }

    #[test]
    fn test_macro_compiles_with_fields() {
        // Smoke test: the macro expands with mixed field syntax.
        security_event!(
            SecurityEvent::AuthenticationSuccess,
            email = %"user@example.com",
            attempt = 1,
            "User authenticated"
        );
    }
}
