//! Persistence Seams
//!
//! Storage traits for the three entities, each with an in-memory
//! implementation suitable for a single-instance deployment. Distributed
//! deployments implement the traits over PostgreSQL, Redis, or another
//! shared backend; the services only ever see the trait.
//!
//! # Consistency Note
//!
//! The failed-attempt counter is read-modify-write through [`UserStore`] and
//! is NOT serialized against concurrent logins for the same account. Two
//! simultaneous wrong-password attempts can under-count toward the lockout
//! threshold. This is accepted: brute force is rate-limited upstream, not by
//! this counter.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{LoginAttempt, RefreshTokenRecord, User};

/// Store failure, surfaced as a generic server error at the boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or policy constraint was violated
    #[error("store conflict: {0}")]
    Conflict(String),

    /// The backend could not be reached or the operation failed
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Traits
// ============================================================================

/// Persistence for [`User`] rows
pub trait UserStore: Send + Sync {
    /// Exact, case-sensitive lookup by email as stored
    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Insert a new user; duplicate emails are a conflict
    fn insert(&self, user: User) -> StoreResult<User>;

    /// Persist mutated user state (counters, lock, password hash)
    fn update(&self, user: &User) -> StoreResult<()>;

    /// Number of users, for the single-user deployment policy
    fn count(&self) -> StoreResult<usize>;
}

/// Persistence for the refresh-token ledger
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a new ledger record; duplicate JTIs are a conflict
    fn insert(&self, record: RefreshTokenRecord) -> StoreResult<RefreshTokenRecord>;

    fn find_by_jti(&self, jti: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Lookup restricted to non-blacklisted records
    fn find_active_by_jti(&self, jti: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// All non-blacklisted records for a user
    fn active_for_user(&self, user_id: Uuid) -> StoreResult<Vec<RefreshTokenRecord>>;

    fn update(&self, record: &RefreshTokenRecord) -> StoreResult<()>;

    /// Delete records whose expiry is older than the cutoff; returns the count
    fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}

/// Append-only persistence for the login attempt audit log
///
/// Read helpers exist for monitoring and tests only; authentication never
/// reads this log back.
pub trait LoginAttemptStore: Send + Sync {
    fn append(&self, attempt: LoginAttempt) -> StoreResult<()>;

    /// Most-recent-first attempts for an email
    fn recent_for_email(&self, email: &str, limit: usize) -> StoreResult<Vec<LoginAttempt>>;
}

// ============================================================================
// In-Memory Implementations
// ============================================================================

/// In-memory [`UserStore`]
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().get(&id).cloned())
    }

    fn insert(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::conflict(format!(
                "user with email {} already exists",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write();
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::conflict(format!("no user with id {}", user.id))),
        }
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.users.read().len())
    }
}

/// In-memory [`RefreshTokenStore`]
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    records: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefreshTokenStore for InMemoryRefreshTokenStore {
    fn insert(&self, record: RefreshTokenRecord) -> StoreResult<RefreshTokenRecord> {
        let mut records = self.records.write();
        if records.values().any(|r| r.jti == record.jti) {
            return Err(StoreError::conflict(format!("duplicate jti {}", record.jti)));
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_by_jti(&self, jti: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let records = self.records.read();
        Ok(records.values().find(|r| r.jti == jti).cloned())
    }

    fn find_active_by_jti(&self, jti: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let records = self.records.read();
        Ok(records
            .values()
            .find(|r| r.jti == jti && !r.is_blacklisted)
            .cloned())
    }

    fn active_for_user(&self, user_id: Uuid) -> StoreResult<Vec<RefreshTokenRecord>> {
        let records = self.records.read();
        let mut active: Vec<_> = records
            .values()
            .filter(|r| r.user_id == user_id && !r.is_blacklisted)
            .cloned()
            .collect();
        active.sort_by_key(|r| r.created_at);
        Ok(active)
    }

    fn update(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::conflict(format!("no token record with id {}", record.id))),
        }
    }

    fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| r.expires_at >= cutoff);
        Ok(before - records.len())
    }
}

/// In-memory [`LoginAttemptStore`]
#[derive(Debug, Default)]
pub struct InMemoryLoginAttemptStore {
    attempts: RwLock<Vec<LoginAttempt>>,
}

impl InMemoryLoginAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of recorded attempts
    pub fn len(&self) -> usize {
        self.attempts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.read().is_empty()
    }
}

impl LoginAttemptStore for InMemoryLoginAttemptStore {
    fn append(&self, attempt: LoginAttempt) -> StoreResult<()> {
        self.attempts.write().push(attempt);
        Ok(())
    }

    fn recent_for_email(&self, email: &str, limit: usize) -> StoreResult<Vec<LoginAttempt>> {
        let attempts = self.attempts.read();
        Ok(attempts
            .iter()
            .rev()
            .filter(|a| a.email == email)
            .take(limit)
            .cloned()
            .collect())
    }
}
