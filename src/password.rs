//! Password Hashing and Policy
//!
//! Argon2id hashing for stored credentials plus a policy check run on
//! registration and password change. The policy follows modern guidance for
//! memorized secrets: length is what matters, composition rules are not
//! enforced, and a short list of catastrophically common passwords is
//! rejected outright.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::validation::{ErrorCode, FieldError, FieldErrors};

// ============================================================================
// Hashing
// ============================================================================

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String, FieldErrors> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| {
            FieldErrors::single("password", ErrorCode::PolicyViolation, "Could not hash password")
        })
}

/// Verify a password against a stored Argon2 hash
///
/// A malformed stored hash verifies as false rather than erroring; the
/// caller treats it as a credential mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Passwords nobody should be allowed to keep
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "123456",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty",
    "qwerty123",
    "letmein",
    "welcome",
    "admin",
    "iloveyou",
    "monkey",
    "dragon",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "abc123",
];

/// Password acceptance policy
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Minimum password length
    pub min_length: usize,

    /// Maximum password length (supports long passphrases)
    pub max_length: usize,

    /// Reject passwords from the common-password list
    pub check_common_passwords: bool,

    /// Reject entirely numeric passwords
    pub disallow_all_numeric: bool,

    /// Reject passwords containing the account email's local part
    pub disallow_email_in_password: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            max_length: 128,
            check_common_passwords: true,
            disallow_all_numeric: true,
            disallow_email_in_password: true,
        }
    }
}

impl PasswordPolicy {
    /// Create a new builder
    pub fn builder() -> PasswordPolicyBuilder {
        PasswordPolicyBuilder::default()
    }

    /// Minimal policy for tests
    pub fn minimal() -> Self {
        Self {
            min_length: 1,
            max_length: 128,
            check_common_passwords: false,
            disallow_all_numeric: false,
            disallow_email_in_password: false,
        }
    }

    /// Validate a candidate password, optionally against the account email
    ///
    /// Returns every violated rule as a field error on `new_password`.
    pub fn validate(&self, password: &str, email: Option<&str>) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let len = password.chars().count();

        if len < self.min_length {
            errors.push(FieldError::new(
                "new_password",
                ErrorCode::TooShort,
                format!("Password must be at least {} characters", self.min_length),
            ));
        }
        if len > self.max_length {
            errors.push(FieldError::new(
                "new_password",
                ErrorCode::TooLong,
                format!("Password must be at most {} characters", self.max_length),
            ));
        }

        if self.check_common_passwords {
            let lowered = password.to_lowercase();
            if COMMON_PASSWORDS.contains(&lowered.as_str()) {
                errors.push(FieldError::new(
                    "new_password",
                    ErrorCode::PolicyViolation,
                    "Password is too common",
                ));
            }
        }

        if self.disallow_all_numeric && !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            errors.push(FieldError::new(
                "new_password",
                ErrorCode::PolicyViolation,
                "Password cannot be entirely numeric",
            ));
        }

        if self.disallow_email_in_password {
            if let Some(email) = email {
                if let Some(local) = email.split('@').next() {
                    if local.len() >= 4
                        && password.to_lowercase().contains(&local.to_lowercase())
                    {
                        errors.push(FieldError::new(
                            "new_password",
                            ErrorCode::PolicyViolation,
                            "Password cannot contain your email address",
                        ));
                    }
                }
            }
        }

        errors.into_result()
    }
}

/// Builder for PasswordPolicy
#[derive(Debug, Clone, Default)]
pub struct PasswordPolicyBuilder {
    policy: PasswordPolicy,
}

impl PasswordPolicyBuilder {
    pub fn min_length(mut self, min: usize) -> Self {
        self.policy.min_length = min;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.policy.max_length = max;
        self
    }

    pub fn check_common_passwords(mut self, enabled: bool) -> Self {
        self.policy.check_common_passwords = enabled;
        self
    }

    pub fn disallow_all_numeric(mut self, enabled: bool) -> Self {
        self.policy.disallow_all_numeric = enabled;
        self
    }

    pub fn disallow_email_in_password(mut self, enabled: bool) -> Self {
        self.policy.disallow_email_in_password = enabled;
        self
    }

    pub fn build(self) -> PasswordPolicy {
        self.policy
    }
}
