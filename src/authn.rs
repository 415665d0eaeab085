//! Authentication Backend
//!
//! Credential verification with account lockout. Every call records exactly
//! one [`LoginAttempt`] row, success or failure, with the internal failure
//! reason; the caller only ever sees the flattened [`AuthError`] taxonomy.
//!
//! The checks run in a fixed order, and each failure stops the sequence:
//!
//! 1. Unknown email
//! 2. Account currently locked
//! 3. Account inactive
//! 4. Password mismatch (counts toward the lockout threshold)
//!
//! The attempt that reaches the threshold still reports bad credentials; the
//! lock answers from the next attempt on.

use std::sync::Arc;

use crate::client::ClientContext;
use crate::error::AuthError;
use crate::model::{LockoutPolicy, LoginAttempt, User};
use crate::observability::SecurityEvent;
use crate::password::verify_password;
use crate::security_event;
use crate::store::{LoginAttemptStore, UserStore};

// Audit-log failure reasons. Internal only, never serialized to clients.
const REASON_UNKNOWN_USER: &str = "User does not exist";
const REASON_LOCKED: &str = "Account is locked";
const REASON_INACTIVE: &str = "Account is inactive";

/// Credential verification with lockout bookkeeping
pub struct AuthBackend {
    users: Arc<dyn UserStore>,
    attempts: Arc<dyn LoginAttemptStore>,
    policy: LockoutPolicy,
}

impl AuthBackend {
    pub fn new(users: Arc<dyn UserStore>, attempts: Arc<dyn LoginAttemptStore>) -> Self {
        Self {
            users,
            attempts,
            policy: LockoutPolicy::default(),
        }
    }

    /// Override the lockout policy
    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Verify credentials, returning the user on success
    ///
    /// Mutates lockout state: failures increment the counter (locking at the
    /// threshold), success clears it and stamps the login time.
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        ctx: &ClientContext,
    ) -> Result<User, AuthError> {
        let Some(mut user) = self.users.find_by_email(email)? else {
            self.record_failure(email, ctx, REASON_UNKNOWN_USER);
            return Err(AuthError::InvalidCredentials);
        };

        if user.is_locked() {
            self.record_failure(email, ctx, REASON_LOCKED);
            return Err(AuthError::AccountLocked {
                retry_after_secs: user.lockout_remaining_secs(),
            });
        }

        if !user.is_active {
            self.record_failure(email, ctx, REASON_INACTIVE);
            return Err(AuthError::AccountInactive);
        }

        if !verify_password(password, &user.password_hash) {
            let locked_now = user.record_failed_attempt(&self.policy);
            self.users.update(&user)?;

            self.record_failure(
                email,
                ctx,
                format!("Invalid password (attempt {})", user.failed_login_attempts),
            );

            if locked_now {
                security_event!(
                    SecurityEvent::AccountLocked,
                    email = %email,
                    failed_attempts = user.failed_login_attempts,
                    lockout_secs = self.policy.lockout_duration.as_secs(),
                    "Account locked after repeated failures"
                );
            }

            return Err(AuthError::InvalidCredentials);
        }

        let had_stale_lock = user.locked_until.is_some();
        user.reset_failed_attempts();
        user.touch_last_login();
        self.users.update(&user)?;

        if had_stale_lock {
            security_event!(
                SecurityEvent::AccountUnlocked,
                email = %email,
                "Expired lock cleared on successful login"
            );
        }

        self.record_attempt(LoginAttempt::success(
            email,
            ctx.ip_address.clone(),
            ctx.user_agent_str(),
        ));

        security_event!(
            SecurityEvent::AuthenticationSuccess,
            email = %email,
            ip_address = %ctx.ip_address.as_deref().unwrap_or("-"),
            "User authenticated"
        );

        Ok(user)
    }

    /// The lockout policy in effect
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    fn record_failure(&self, email: &str, ctx: &ClientContext, reason: impl Into<String>) {
        let reason = reason.into();

        security_event!(
            SecurityEvent::AuthenticationFailure,
            email = %email,
            ip_address = %ctx.ip_address.as_deref().unwrap_or("-"),
            reason = %reason,
            "Authentication failed"
        );

        self.record_attempt(LoginAttempt::failure(
            email,
            ctx.ip_address.clone(),
            ctx.user_agent_str(),
            reason,
        ));
    }

    // The audit row is best-effort on both paths; a store failure here must
    // not mask the authentication outcome.
    fn record_attempt(&self, attempt: LoginAttempt) {
        if let Err(e) = self.attempts.append(attempt) {
            tracing::error!(error = %e, "Failed to record login attempt");
        }
    }
}
