//! Data Model
//!
//! The three persistent entities of the authentication core:
//!
//! - [`User`] — identity plus lockout bookkeeping. The lockout transition is
//!   a pure function on the entity, not a separate service: a fixed failure
//!   threshold locks the account for a fixed duration, and any successful
//!   authentication clears the counters.
//! - [`RefreshTokenRecord`] — the server-side ledger entry for an issued
//!   refresh token. State machine: Active -> Blacklisted (one-way, via
//!   logout, revocation, or password change); records leave the ledger only
//!   through the age-based retention sweep.
//! - [`LoginAttempt`] — append-only audit row. Linked to users by email
//!   string, not by id, so attempts against unknown addresses are recorded
//!   too.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// Lockout Policy
// ============================================================================

/// Account lockout policy
///
/// Fixed-threshold logic: no exponential backoff and no per-IP tracking.
/// Lockout is per-account only; brute force across accounts is a rate
/// limiter's problem, outside this crate.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Consecutive failures before the account locks
    pub max_attempts: u32,

    /// How long the account stays locked
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    /// Default policy: 5 failures, 30 minute lockout
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::from_secs(30 * 60),
        }
    }
}

impl LockoutPolicy {
    /// Create a new builder
    pub fn builder() -> LockoutPolicyBuilder {
        LockoutPolicyBuilder::default()
    }

    /// Strict policy for high-security deployments
    pub fn strict() -> Self {
        Self {
            max_attempts: 3,
            lockout_duration: Duration::from_secs(60 * 60),
        }
    }

    /// Relaxed policy for low-risk deployments
    pub fn relaxed() -> Self {
        Self {
            max_attempts: 10,
            lockout_duration: Duration::from_secs(5 * 60),
        }
    }

    fn lockout_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lockout_duration.as_secs() as i64)
    }
}

/// Builder for LockoutPolicy
#[derive(Debug, Clone, Default)]
pub struct LockoutPolicyBuilder {
    policy: LockoutPolicy,
}

impl LockoutPolicyBuilder {
    /// Set consecutive failures before lockout
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    /// Set lockout duration
    pub fn lockout_duration(mut self, duration: Duration) -> Self {
        self.policy.lockout_duration = duration;
        self
    }

    /// Build the policy
    pub fn build(self) -> LockoutPolicy {
        self.policy
    }
}

// ============================================================================
// User
// ============================================================================

/// User identity and security state
///
/// Created once, mutated by the auth backend on every attempt, never deleted
/// by this core. `locked_until` is only ever set when the failure counter
/// reaches the policy threshold and is cleared on any successful
/// authentication.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_password_change: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new active, unverified user with the given password hash
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_active: true,
            is_verified: false,
            failed_login_attempts: 0,
            locked_until: None,
            last_password_change: None,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    /// Check if the account is currently locked
    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some_and(|until| until > Utc::now())
    }

    /// Seconds until the current lockout expires, zero if not locked
    pub fn lockout_remaining_secs(&self) -> u64 {
        match self.locked_until {
            Some(until) => (until - Utc::now()).num_seconds().max(0) as u64,
            None => 0,
        }
    }

    /// Record a failed authentication attempt
    ///
    /// Increments the counter; when it reaches the policy threshold the
    /// account locks for the policy duration. Returns true if this attempt
    /// triggered the lockout.
    pub fn record_failed_attempt(&mut self, policy: &LockoutPolicy) -> bool {
        self.failed_login_attempts += 1;

        if self.failed_login_attempts >= policy.max_attempts {
            self.locked_until = Some(Utc::now() + policy.lockout_chrono());
            true
        } else {
            false
        }
    }

    /// Reset failure bookkeeping after a successful authentication
    pub fn reset_failed_attempts(&mut self) {
        self.failed_login_attempts = 0;
        self.locked_until = None;
    }

    /// Record a successful login timestamp
    pub fn touch_last_login(&mut self) {
        self.last_login = Some(Utc::now());
    }

    /// Replace the password hash and stamp the change time
    pub fn set_password_hash(&mut self, hash: impl Into<String>) {
        self.password_hash = hash.into();
        self.last_password_change = Some(Utc::now());
    }
}

// ============================================================================
// Refresh Token Ledger
// ============================================================================

/// Server-side record for an issued refresh token
///
/// Owned by a [`User`] (one user, many records). Created on login and on
/// refresh; blacklisted on logout, password change, or explicit revocation;
/// physically deleted only by the retention sweep.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Full signed token string, for audit
    pub token: String,
    /// Unique token id, the ledger lookup key
    pub jti: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_blacklisted: bool,
    pub blacklisted_at: Option<DateTime<Utc>>,
    /// "{device} - {browser}" summary derived from the user agent
    pub device_info: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

impl RefreshTokenRecord {
    /// Blacklist this record
    pub fn blacklist(&mut self) {
        self.is_blacklisted = true;
        self.blacklisted_at = Some(Utc::now());
    }

    /// Check if the underlying token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the record is usable (not blacklisted and not expired)
    pub fn is_valid(&self) -> bool {
        !self.is_blacklisted && !self.is_expired()
    }
}

// ============================================================================
// Login Attempt Log
// ============================================================================

/// Append-only audit row for an authentication attempt
///
/// Immutable after creation. No read path feeds back into authentication
/// decisions; the lockout counters live on [`User`].
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LoginAttempt {
    /// Record a successful attempt
    pub fn success(email: impl Into<String>, ip: Option<String>, user_agent: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ip_address: ip,
            user_agent: user_agent.into(),
            success: true,
            failure_reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed attempt with its reason
    pub fn failure(
        email: impl Into<String>,
        ip: Option<String>,
        user_agent: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            ip_address: ip,
            user_agent: user_agent.into(),
            success: false,
            failure_reason: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.lockout_duration, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_policy_builder() {
        let policy = LockoutPolicy::builder()
            .max_attempts(3)
            .lockout_duration(Duration::from_secs(60))
            .build();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.lockout_duration, Duration::from_secs(60));
    }

    #[test]
    fn test_new_user_is_unlocked() {
        let user = User::new("owner@example.com", "hash");
        assert!(!user.is_locked());
        assert_eq!(user.failed_login_attempts, 0);
        assert!(user.is_active);
        assert!(!user.is_verified);
    }

    #[test]
    fn test_lockout_at_threshold() {
        let policy = LockoutPolicy::default();
        let mut user = User::new("owner@example.com", "hash");

        for attempt in 1..policy.max_attempts {
            assert!(!user.record_failed_attempt(&policy));
            assert_eq!(user.failed_login_attempts, attempt);
            assert!(!user.is_locked());
        }

        // Threshold attempt locks the account into the future.
        assert!(user.record_failed_attempt(&policy));
        assert!(user.is_locked());
        assert!(user.locked_until.unwrap() > Utc::now());
        assert!(user.lockout_remaining_secs() > 0);
    }

    #[test]
    fn test_reset_clears_counter_and_lock() {
        let policy = LockoutPolicy::builder().max_attempts(2).build();
        let mut user = User::new("owner@example.com", "hash");
        user.record_failed_attempt(&policy);
        user.record_failed_attempt(&policy);
        assert!(user.is_locked());

        user.reset_failed_attempts();
        assert_eq!(user.failed_login_attempts, 0);
        assert!(user.locked_until.is_none());
        assert!(!user.is_locked());
    }

    #[test]
    fn test_expired_lock_is_not_locked() {
        let mut user = User::new("owner@example.com", "hash");
        user.failed_login_attempts = 5;
        user.locked_until = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(!user.is_locked());
        assert_eq!(user.lockout_remaining_secs(), 0);
    }

    #[test]
    fn test_set_password_hash_stamps_change_time() {
        let mut user = User::new("owner@example.com", "old");
        assert!(user.last_password_change.is_none());
        user.set_password_hash("new");
        assert_eq!(user.password_hash, "new");
        assert!(user.last_password_change.is_some());
    }

    #[test]
    fn test_token_record_blacklist_is_one_way() {
        let mut record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "signed".into(),
            jti: "jti-1".into(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(7),
            is_blacklisted: false,
            blacklisted_at: None,
            device_info: "Desktop - Firefox".into(),
            ip_address: Some("203.0.113.9".into()),
            user_agent: "Mozilla/5.0".into(),
        };

        assert!(record.is_valid());
        record.blacklist();
        assert!(record.is_blacklisted);
        assert!(record.blacklisted_at.is_some());
        assert!(!record.is_valid());
    }

    #[test]
    fn test_expired_record_is_invalid() {
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "signed".into(),
            jti: "jti-2".into(),
            created_at: Utc::now() - chrono::Duration::days(8),
            expires_at: Utc::now() - chrono::Duration::days(1),
            is_blacklisted: false,
            blacklisted_at: None,
            device_info: "Unknown".into(),
            ip_address: None,
            user_agent: String::new(),
        };

        assert!(record.is_expired());
        assert!(!record.is_valid());
    }

    #[test]
    fn test_login_attempt_constructors() {
        let ok = LoginAttempt::success("owner@example.com", Some("203.0.113.9".into()), "UA");
        assert!(ok.success);
        assert!(ok.failure_reason.is_none());

        let bad = LoginAttempt::failure("ghost@x.com", None, "", "User does not exist");
        assert!(!bad.success);
        assert_eq!(bad.failure_reason.as_deref(), Some("User does not exist"));
    }
}
