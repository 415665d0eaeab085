//! Token Service
//!
//! JWT issuance, verification, rotation, and the server-side refresh ledger.
//! Access tokens are stateless and live or die by their signature and expiry.
//! Refresh tokens additionally have a ledger row keyed by JTI, so they can be
//! blacklisted before their natural expiry (logout, password change, explicit
//! revocation).
//!
//! Rotation hands out a fresh pair and leaves the presented token's ledger
//! row active until its own expiry; revocation is always an explicit act.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use postern::store::InMemoryRefreshTokenStore;
//! use postern::token::{JwtSigner, TokenService};
//!
//! let service = TokenService::new(
//!     Arc::new(JwtSigner::new("a-long-random-signing-secret")),
//!     Arc::new(InMemoryRefreshTokenStore::new()),
//! );
//! let pair = service.issue_pair(&user, &ctx)?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::ClientContext;
use crate::error::AuthError;
use crate::model::{RefreshTokenRecord, User};
use crate::observability::SecurityEvent;
use crate::security_event;
use crate::store::RefreshTokenStore;

// ============================================================================
// Claims
// ============================================================================

/// Which half of a pair a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claim set for both token kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Unique token id; for refresh tokens, the ledger key
    pub jti: String,
    #[serde(rename = "token_type")]
    pub kind: TokenKind,
}

impl Claims {
    fn new(user_id: Uuid, email: &str, ttl: Duration, kind: TokenKind) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(ttl.as_secs() as i64)).timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind,
        }
    }
}

/// An access/refresh token pair as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    /// Seconds until the access token expires
    pub access_expires_in: u64,
    /// Seconds until the refresh token expires
    pub refresh_expires_in: u64,
}

// ============================================================================
// Signer
// ============================================================================

/// Signing and verification seam
///
/// Production uses [`JwtSigner`]; tests use [`FakeSigner`] for deterministic,
/// inspectable tokens.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &Claims) -> Result<String, AuthError>;

    /// Verify signature and expiry, returning the claims
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// HMAC-SHA256 JWT signer with zero clock leeway
pub struct JwtSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl TokenSigner for JwtSigner {
    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding).map_err(|_| AuthError::TokenInvalid)
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }
}

/// Unsigned, inspectable token codec for tests
///
/// Encodes the claims as base64 JSON behind a fixed prefix. Carries no
/// cryptographic protection; never use outside tests.
#[derive(Debug, Default)]
pub struct FakeSigner;

const FAKE_PREFIX: &str = "fake.";

impl TokenSigner for FakeSigner {
    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;

        let json = serde_json::to_vec(claims).map_err(|_| AuthError::TokenInvalid)?;
        Ok(format!("{FAKE_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;

        let payload = token.strip_prefix(FAKE_PREFIX).ok_or(AuthError::TokenInvalid)?;
        let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| AuthError::TokenInvalid)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AuthError::TokenInvalid)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

// ============================================================================
// Service
// ============================================================================

/// Token issuance and refresh-ledger management
pub struct TokenService {
    signer: Arc<dyn TokenSigner>,
    tokens: Arc<dyn RefreshTokenStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// How long expired ledger rows are retained before the purge deletes them
    retention: Duration,
}

impl TokenService {
    /// Create a service with default lifetimes: 15 minute access tokens,
    /// 7 day refresh tokens, 30 day ledger retention
    pub fn new(signer: Arc<dyn TokenSigner>, tokens: Arc<dyn RefreshTokenStore>) -> Self {
        Self {
            signer,
            tokens,
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 3600),
            retention: Duration::from_secs(30 * 24 * 3600),
        }
    }

    /// Override the access and refresh token lifetimes
    pub fn with_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self
    }

    /// Override the expired-record retention window
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Issue a fresh token pair and open a ledger row for the refresh half
    pub fn issue_pair(&self, user: &User, ctx: &ClientContext) -> Result<TokenPair, AuthError> {
        let pair = self.mint_pair(user.id, &user.email, ctx)?;

        security_event!(
            SecurityEvent::TokenIssued,
            user_id = %user.id,
            email = %user.email,
            "Token pair issued"
        );

        Ok(pair)
    }

    /// Verify an access token and return its claims
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.signer.verify(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    /// Verify a token of either kind
    ///
    /// Checks signature and expiry; refresh tokens additionally fail when
    /// their JTI is blacklisted.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.signer.verify(token)?;
        if claims.kind == TokenKind::Refresh && self.is_blacklisted(&claims.jti)? {
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    /// Rotate a refresh token into a fresh pair
    ///
    /// The presented token must verify and have an active (non-blacklisted)
    /// ledger row. Its row stays active afterwards; rotation alone never
    /// revokes.
    pub fn refresh(&self, refresh_token: &str, ctx: &ClientContext) -> Result<TokenPair, AuthError> {
        let claims = self.verify_refresh_claims(refresh_token)?;

        match self.tokens.find_by_jti(&claims.jti)? {
            Some(record) if !record.is_blacklisted => {}
            Some(_) => return Err(AuthError::TokenInvalid),
            None => return Err(AuthError::TokenNotFound),
        }

        let pair = self.mint_pair(claims.sub, &claims.email, ctx)?;

        security_event!(
            SecurityEvent::TokenRefreshed,
            user_id = %claims.sub,
            old_jti = %claims.jti,
            "Refresh token rotated"
        );

        Ok(pair)
    }

    /// Blacklist the presented refresh token
    ///
    /// Idempotent: logging out with an already-blacklisted token succeeds.
    pub fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.verify_refresh_claims(refresh_token)?;
        self.blacklist_by_jti(&claims.jti)?;

        security_event!(
            SecurityEvent::Logout,
            user_id = %claims.sub,
            jti = %claims.jti,
            "User logged out"
        );

        Ok(())
    }

    /// Blacklist a ledger row by JTI
    ///
    /// Idempotent: returns true if this call performed the transition, false
    /// for rows already blacklisted or unknown.
    pub fn blacklist_by_jti(&self, jti: &str) -> Result<bool, AuthError> {
        let Some(mut record) = self.tokens.find_by_jti(jti)? else {
            return Ok(false);
        };

        if record.is_blacklisted {
            return Ok(false);
        }

        record.blacklist();
        self.tokens.update(&record)?;

        security_event!(
            SecurityEvent::TokenRevoked,
            user_id = %record.user_id,
            jti = %jti,
            "Refresh token blacklisted"
        );

        Ok(true)
    }

    /// Check whether a JTI is blacklisted; unknown JTIs are not
    pub fn is_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        Ok(self
            .tokens
            .find_by_jti(jti)?
            .is_some_and(|r| r.is_blacklisted))
    }

    /// Blacklist every active refresh token a user holds
    ///
    /// Used on password change and administrative revocation. Returns the
    /// number of rows transitioned.
    pub fn revoke_all_for_user(&self, user_id: Uuid) -> Result<usize, AuthError> {
        let active = self.tokens.active_for_user(user_id)?;
        let count = active.len();

        for mut record in active {
            record.blacklist();
            self.tokens.update(&record)?;
        }

        if count > 0 {
            security_event!(
                SecurityEvent::TokenRevoked,
                user_id = %user_id,
                revoked = count,
                "All refresh tokens revoked for user"
            );
        }

        Ok(count)
    }

    /// Delete ledger rows that expired longer ago than the retention window
    ///
    /// Recently expired rows are kept for audit. Returns the number deleted.
    pub fn purge_expired(&self) -> Result<usize, AuthError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.retention.as_secs() as i64);
        let purged = self.tokens.purge_expired_before(cutoff)?;

        if purged > 0 {
            security_event!(
                SecurityEvent::TokensPurged,
                purged = purged,
                "Expired refresh token records purged"
            );
        }

        Ok(purged)
    }

    fn verify_refresh_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.signer.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    fn mint_pair(&self, user_id: Uuid, email: &str, ctx: &ClientContext) -> Result<TokenPair, AuthError> {
        let access_claims = Claims::new(user_id, email, self.access_ttl, TokenKind::Access);
        let refresh_claims = Claims::new(user_id, email, self.refresh_ttl, TokenKind::Refresh);

        let access = self.signer.sign(&access_claims)?;
        let refresh = self.signer.sign(&refresh_claims)?;

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token: refresh.clone(),
            jti: refresh_claims.jti,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::seconds(self.refresh_ttl.as_secs() as i64),
            is_blacklisted: false,
            blacklisted_at: None,
            device_info: ctx.device_summary(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent_str().to_string(),
        };
        self.tokens.insert(record)?;

        Ok(TokenPair {
            access,
            refresh,
            access_expires_in: self.access_ttl.as_secs(),
            refresh_expires_in: self.refresh_ttl.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRefreshTokenStore;

    fn service() -> (TokenService, Arc<InMemoryRefreshTokenStore>) {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        let service = TokenService::new(Arc::new(FakeSigner), store.clone());
        (service, store)
    }

    fn user() -> User {
        User::new("owner@example.com", "hash")
    }

    fn ctx() -> ClientContext {
        ClientContext::new(
            Some("203.0.113.9".into()),
            Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0".into()),
        )
    }

    #[test]
    fn test_issue_pair_opens_ledger_row() {
        let (service, store) = service();
        let user = user();

        let pair = service.issue_pair(&user, &ctx()).unwrap();

        let claims = FakeSigner.verify(&pair.refresh).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.sub, user.id);

        let record = store.find_by_jti(&claims.jti).unwrap().unwrap();
        assert_eq!(record.user_id, user.id);
        assert_eq!(record.device_info, "Desktop - Firefox");
        assert_eq!(record.ip_address.as_deref(), Some("203.0.113.9"));
        assert!(!record.is_blacklisted);
    }

    #[test]
    fn test_verify_access_accepts_only_access_kind() {
        let (service, _) = service();
        let pair = service.issue_pair(&user(), &ctx()).unwrap();

        let claims = service.verify_access(&pair.access).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);

        // The refresh half must not pass as an access token.
        assert!(matches!(
            service.verify_access(&pair.refresh),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn test_refresh_rejects_access_token() {
        let (service, _) = service();
        let pair = service.issue_pair(&user(), &ctx()).unwrap();
        assert!(matches!(
            service.refresh(&pair.access, &ctx()),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn test_refresh_rotates_without_revoking_old() {
        let (service, store) = service();
        let user = user();
        let pair = service.issue_pair(&user, &ctx()).unwrap();
        let old_jti = FakeSigner.verify(&pair.refresh).unwrap().jti;

        let rotated = service.refresh(&pair.refresh, &ctx()).unwrap();
        let new_jti = FakeSigner.verify(&rotated.refresh).unwrap().jti;

        assert_ne!(old_jti, new_jti);
        // The presented token's row is still active.
        assert!(store.find_active_by_jti(&old_jti).unwrap().is_some());
        assert_eq!(store.active_for_user(user.id).unwrap().len(), 2);
    }

    #[test]
    fn test_refresh_rejects_blacklisted_token() {
        let (service, _) = service();
        let pair = service.issue_pair(&user(), &ctx()).unwrap();
        let jti = FakeSigner.verify(&pair.refresh).unwrap().jti;

        service.blacklist_by_jti(&jti).unwrap();
        assert!(matches!(
            service.refresh(&pair.refresh, &ctx()),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn test_refresh_rejects_unknown_ledger_row() {
        let (service, _) = service();
        // A well-formed refresh token the service never issued.
        let claims = Claims::new(
            Uuid::new_v4(),
            "ghost@example.com",
            Duration::from_secs(3600),
            TokenKind::Refresh,
        );
        let token = FakeSigner.sign(&claims).unwrap();

        assert!(matches!(
            service.refresh(&token, &ctx()),
            Err(AuthError::TokenNotFound)
        ));
    }

    #[test]
    fn test_logout_blacklists_and_is_idempotent() {
        let (service, store) = service();
        let pair = service.issue_pair(&user(), &ctx()).unwrap();
        let jti = FakeSigner.verify(&pair.refresh).unwrap().jti;

        service.logout(&pair.refresh).unwrap();
        assert!(store.find_by_jti(&jti).unwrap().unwrap().is_blacklisted);

        // Logging out again with the same token still succeeds.
        service.logout(&pair.refresh).unwrap();
    }

    #[test]
    fn test_blacklist_reports_transition_once() {
        let (service, _) = service();
        let pair = service.issue_pair(&user(), &ctx()).unwrap();
        let jti = FakeSigner.verify(&pair.refresh).unwrap().jti;

        assert!(service.blacklist_by_jti(&jti).unwrap());
        assert!(!service.blacklist_by_jti(&jti).unwrap());
        assert!(service.is_blacklisted(&jti).unwrap());

        // Unknown JTIs are a no-op, not an error.
        assert!(!service.blacklist_by_jti("no-such-jti").unwrap());
        assert!(!service.is_blacklisted("no-such-jti").unwrap());
    }

    #[test]
    fn test_verify_token_checks_refresh_blacklist() {
        let (service, _) = service();
        let pair = service.issue_pair(&user(), &ctx()).unwrap();

        assert!(service.verify_token(&pair.access).is_ok());
        assert!(service.verify_token(&pair.refresh).is_ok());

        service.logout(&pair.refresh).unwrap();
        // The access token stays stateless and live; the refresh half is dead.
        assert!(service.verify_token(&pair.access).is_ok());
        assert!(matches!(
            service.verify_token(&pair.refresh),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn test_revoke_all_for_user() {
        let (service, store) = service();
        let alice = user();
        let bob = User::new("bob@example.com", "hash");

        service.issue_pair(&alice, &ctx()).unwrap();
        service.issue_pair(&alice, &ctx()).unwrap();
        let bob_pair = service.issue_pair(&bob, &ctx()).unwrap();

        assert_eq!(service.revoke_all_for_user(alice.id).unwrap(), 2);
        assert!(store.active_for_user(alice.id).unwrap().is_empty());

        // Bob's token survives.
        let bob_jti = FakeSigner.verify(&bob_pair.refresh).unwrap().jti;
        assert!(store.find_active_by_jti(&bob_jti).unwrap().is_some());

        // Nothing left to revoke.
        assert_eq!(service.revoke_all_for_user(alice.id).unwrap(), 0);
    }

    #[test]
    fn test_purge_keeps_recently_expired_rows() {
        let (service, store) = service();
        let user_id = Uuid::new_v4();

        let row = |jti: &str, expired_days_ago: i64| RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token: format!("signed-{jti}"),
            jti: jti.into(),
            created_at: Utc::now() - chrono::Duration::days(expired_days_ago + 7),
            expires_at: Utc::now() - chrono::Duration::days(expired_days_ago),
            is_blacklisted: false,
            blacklisted_at: None,
            device_info: "Unknown".into(),
            ip_address: None,
            user_agent: String::new(),
        };

        store.insert(row("ancient", 40)).unwrap();
        store.insert(row("recent", 10)).unwrap();

        assert_eq!(service.purge_expired().unwrap(), 1);
        assert!(store.find_by_jti("ancient").unwrap().is_none());
        assert!(store.find_by_jti("recent").unwrap().is_some());
    }

    #[test]
    fn test_expired_fake_token_reports_expiry() {
        let (service, _) = service();
        let mut claims = Claims::new(
            Uuid::new_v4(),
            "owner@example.com",
            Duration::from_secs(3600),
            TokenKind::Access,
        );
        claims.exp = Utc::now().timestamp() - 60;
        let token = FakeSigner.sign(&claims).unwrap();

        assert!(matches!(service.verify_access(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_jwt_signer_roundtrip() {
        let signer = JwtSigner::new("test-secret-of-reasonable-length");
        let claims = Claims::new(
            Uuid::new_v4(),
            "owner@example.com",
            Duration::from_secs(900),
            TokenKind::Access,
        );

        let token = signer.sign(&claims).unwrap();
        let decoded = signer.verify(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_jwt_signer_rejects_wrong_key() {
        let signer = JwtSigner::new("key-one-key-one-key-one-key-one!");
        let other = JwtSigner::new("key-two-key-two-key-two-key-two!");
        let claims = Claims::new(
            Uuid::new_v4(),
            "owner@example.com",
            Duration::from_secs(900),
            TokenKind::Access,
        );

        let token = signer.sign(&claims).unwrap();
        assert!(matches!(other.verify(&token), Err(AuthError::TokenInvalid)));
        assert!(matches!(signer.verify("garbage"), Err(AuthError::TokenInvalid)));
    }
}
