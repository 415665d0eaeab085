//! Account Lifecycle
//!
//! Registration, password change, and the two emailed-link flows: password
//! reset and email verification. The emailed flows are enumeration-proof by
//! construction: requesting a link always succeeds from the caller's point
//! of view, whether or not the address has an account.
//!
//! Password change and reset both end by revoking every refresh token the
//! user holds, so a credential rotation logs out every device.

use std::sync::Arc;

use uuid::Uuid;

use crate::action_token::{ActionTokenGenerator, TokenPurpose};
use crate::contact::{Mailer, OutboundEmail};
use crate::error::AuthError;
use crate::model::User;
use crate::observability::SecurityEvent;
use crate::password::{hash_password, verify_password, PasswordPolicy};
use crate::security_event;
use crate::store::{StoreError, UserStore};
use crate::token::TokenService;
use crate::validation::{validate_email, ErrorCode, FieldErrors};

/// Registration, password, and verification flows
pub struct AccountService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    mailer: Arc<dyn Mailer>,
    action_tokens: ActionTokenGenerator,
    password_policy: PasswordPolicy,
    /// Base URL the emailed links point at
    link_base: String,
    /// Close registration after the first account exists
    single_user: bool,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        mailer: Arc<dyn Mailer>,
        action_tokens: ActionTokenGenerator,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            action_tokens,
            password_policy: PasswordPolicy::default(),
            link_base: "http://localhost:3000".to_string(),
            single_user: false,
        }
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    pub fn with_link_base(mut self, base: impl Into<String>) -> Self {
        self.link_base = base.into();
        self
    }

    /// Enable the single-account deployment policy
    pub fn with_single_user(mut self, enabled: bool) -> Self {
        self.single_user = enabled;
        self
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a new account and send its verification link
    pub fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if self.single_user && self.users.count()? > 0 {
            return Err(FieldErrors::single(
                "email",
                ErrorCode::PolicyViolation,
                "Registration is closed",
            )
            .into());
        }

        let mut errors = FieldErrors::new();
        errors.collect(validate_email(email, "email"));
        if let Err(policy_errors) = self.password_policy.validate(password, Some(email)) {
            errors.extend(policy_errors);
        }
        errors.into_result()?;

        let hash = hash_password(password)?;
        let user = match self.users.insert(User::new(email, hash)) {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => {
                return Err(FieldErrors::single(
                    "email",
                    ErrorCode::PolicyViolation,
                    "A user with this email already exists",
                )
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        security_event!(
            SecurityEvent::UserRegistered,
            user_id = %user.id,
            email = %user.email,
            "New user registered"
        );

        self.send_verification_mail(&user)?;
        Ok(user)
    }

    // ========================================================================
    // Password change
    // ========================================================================

    /// Change an authenticated user's password
    ///
    /// Requires the current password, applies the password policy to the new
    /// one, and revokes every refresh token so all sessions end.
    pub fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self
            .users
            .find_by_id(user_id)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(old_password, &user.password_hash) {
            return Err(FieldErrors::single(
                "old_password",
                ErrorCode::Mismatch,
                "Wrong password",
            )
            .into());
        }

        self.password_policy.validate(new_password, Some(&user.email))?;

        user.set_password_hash(hash_password(new_password)?);
        self.users.update(&user)?;
        let revoked = self.tokens.revoke_all_for_user(user.id)?;

        security_event!(
            SecurityEvent::PasswordChanged,
            user_id = %user.id,
            sessions_ended = revoked,
            "Password changed"
        );

        Ok(())
    }

    // ========================================================================
    // Password reset
    // ========================================================================

    /// Request a password reset link
    ///
    /// Always succeeds. The mail only goes out when the address belongs to an
    /// active account; the caller cannot tell the difference.
    pub fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        security_event!(
            SecurityEvent::PasswordResetRequested,
            email = %email,
            "Password reset requested"
        );

        let Some(user) = self.users.find_by_email(email)? else {
            return Ok(());
        };
        if !user.is_active {
            return Ok(());
        }

        let uid = ActionTokenGenerator::encode_uid(user.id);
        let token = self.action_tokens.make_token(TokenPurpose::PasswordReset, &user);

        self.mailer.send(&OutboundEmail {
            to: user.email.clone(),
            subject: "Password reset".to_string(),
            body: format!(
                "Use this link to reset your password:\n{}/reset-password/{}/{}",
                self.link_base, uid, token
            ),
        })?;

        Ok(())
    }

    /// Complete a password reset from an emailed link
    ///
    /// Setting the new password changes the hash the token was minted
    /// against, so the link works at most once. All sessions end.
    pub fn confirm_password_reset(
        &self,
        uid: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self.user_for_action(uid, TokenPurpose::PasswordReset, token)?;

        self.password_policy.validate(new_password, Some(&user.email))?;

        user.set_password_hash(hash_password(new_password)?);
        user.reset_failed_attempts();
        self.users.update(&user)?;
        self.tokens.revoke_all_for_user(user.id)?;

        security_event!(
            SecurityEvent::PasswordResetCompleted,
            user_id = %user.id,
            "Password reset completed"
        );

        Ok(())
    }

    // ========================================================================
    // Email verification
    // ========================================================================

    /// Send (or resend) a verification link
    ///
    /// Always succeeds; already-verified and unknown addresses get no mail
    /// and no distinguishable response.
    pub fn send_verification(&self, email: &str) -> Result<(), AuthError> {
        security_event!(
            SecurityEvent::VerificationRequested,
            email = %email,
            "Email verification requested"
        );

        let Some(user) = self.users.find_by_email(email)? else {
            return Ok(());
        };
        if user.is_verified || !user.is_active {
            return Ok(());
        }

        self.send_verification_mail(&user)
    }

    /// Mark an email verified from an emailed link
    ///
    /// Idempotent: re-submitting a link for an already-verified account
    /// succeeds without touching anything.
    pub fn verify_email(&self, uid: &str, token: &str) -> Result<(), AuthError> {
        let user_id = ActionTokenGenerator::decode_uid(uid).ok_or_else(invalid_link)?;
        let mut user = self.users.find_by_id(user_id)?.ok_or_else(invalid_link)?;
        if user.is_verified {
            return Ok(());
        }

        if !self
            .action_tokens
            .check_token(TokenPurpose::EmailVerification, &user, token)
        {
            return Err(invalid_link());
        }

        user.is_verified = true;
        self.users.update(&user)?;

        security_event!(
            SecurityEvent::EmailVerified,
            user_id = %user.id,
            email = %user.email,
            "Email address verified"
        );

        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Resolve an emailed-link uid/token pair to its user
    ///
    /// Any failure collapses to the same field-level error so a probing
    /// caller learns nothing about which part was wrong.
    fn user_for_action(
        &self,
        uid: &str,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<User, AuthError> {
        let user_id = ActionTokenGenerator::decode_uid(uid).ok_or_else(invalid_link)?;
        let user = self.users.find_by_id(user_id)?.ok_or_else(invalid_link)?;

        if !self.action_tokens.check_token(purpose, &user, token) {
            return Err(invalid_link());
        }
        Ok(user)
    }

    fn send_verification_mail(&self, user: &User) -> Result<(), AuthError> {
        let uid = ActionTokenGenerator::encode_uid(user.id);
        let token = self
            .action_tokens
            .make_token(TokenPurpose::EmailVerification, user);

        self.mailer.send(&OutboundEmail {
            to: user.email.clone(),
            subject: "Verify your email address".to_string(),
            body: format!(
                "Use this link to verify your email address:\n{}/verify-email/{}/{}",
                self.link_base, uid, token
            ),
        })?;

        Ok(())
    }
}

/// Uniform rejection for malformed, expired, or consumed emailed links
fn invalid_link() -> AuthError {
    FieldErrors::single("token", ErrorCode::InvalidToken, "Invalid or expired link").into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientContext;
    use crate::contact::RecordingMailer;
    use crate::store::{InMemoryRefreshTokenStore, InMemoryUserStore};
    use crate::token::FakeSigner;
    use std::time::Duration;

    const EMAIL: &str = "owner@example.com";
    const PASSWORD: &str = "correct horse battery staple";

    struct Fixture {
        service: AccountService,
        users: Arc<InMemoryUserStore>,
        tokens: Arc<TokenService>,
        mailer: Arc<RecordingMailer>,
        generator: ActionTokenGenerator,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserStore::new());
        let tokens = Arc::new(TokenService::new(
            Arc::new(FakeSigner),
            Arc::new(InMemoryRefreshTokenStore::new()),
        ));
        let mailer = Arc::new(RecordingMailer::new());
        let generator = ActionTokenGenerator::new("test-signing-secret", Duration::from_secs(24 * 3600));

        Fixture {
            service: AccountService::new(
                users.clone(),
                tokens.clone(),
                mailer.clone(),
                generator.clone(),
            ),
            users,
            tokens,
            mailer,
            generator,
        }
    }

    fn link_parts(body: &str) -> (String, String) {
        // Links look like {base}/{action}/{uid}/{token}
        let mut parts = body.rsplit('/');
        let token = parts.next().unwrap().to_string();
        let uid = parts.next().unwrap().to_string();
        (uid, token)
    }

    #[test]
    fn test_register_creates_user_and_mails_verification() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();
        assert_eq!(user.email, EMAIL);
        assert!(!user.is_verified);
        assert!(verify_password(PASSWORD, &user.password_hash));

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, EMAIL);
        assert!(sent[0].body.contains("/verify-email/"));
    }

    #[test]
    fn test_register_rejects_weak_password() {
        let f = fixture();
        let err = f.service.register(EMAIL, "short").unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert!(f.mailer.sent().is_empty());
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        let f = fixture();
        f.service.register(EMAIL, PASSWORD).unwrap();
        let err = f.service.register(EMAIL, "another fine passphrase").unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn test_single_user_closes_registration() {
        let f = fixture();
        let service = f.service.with_single_user(true);

        service.register(EMAIL, PASSWORD).unwrap();
        let err = service
            .register("second@example.com", "another fine passphrase")
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn test_change_password_revokes_sessions() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();
        f.tokens.issue_pair(&user, &ClientContext::default()).unwrap();
        f.tokens.issue_pair(&user, &ClientContext::default()).unwrap();

        f.service
            .change_password(user.id, PASSWORD, "an even better passphrase")
            .unwrap();

        let updated = f.users.find_by_id(user.id).unwrap().unwrap();
        assert!(verify_password("an even better passphrase", &updated.password_hash));
        assert!(updated.last_password_change.is_some());
        assert_eq!(f.tokens.revoke_all_for_user(user.id).unwrap(), 0);
    }

    #[test]
    fn test_change_password_requires_current_password() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();

        let err = f
            .service
            .change_password(user.id, "wrong", "an even better passphrase")
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let unchanged = f.users.find_by_id(user.id).unwrap().unwrap();
        assert!(verify_password(PASSWORD, &unchanged.password_hash));
    }

    #[test]
    fn test_reset_flow_roundtrip() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();
        f.tokens.issue_pair(&user, &ClientContext::default()).unwrap();

        f.service.request_password_reset(EMAIL).unwrap();
        let sent = f.mailer.sent();
        let reset_mail = sent.last().unwrap();
        assert!(reset_mail.body.contains("/reset-password/"));

        let (uid, token) = link_parts(&reset_mail.body);
        f.service
            .confirm_password_reset(&uid, &token, "a brand new passphrase")
            .unwrap();

        let updated = f.users.find_by_id(user.id).unwrap().unwrap();
        assert!(verify_password("a brand new passphrase", &updated.password_hash));
        // Reset logs out every device.
        assert_eq!(f.tokens.revoke_all_for_user(user.id).unwrap(), 0);
    }

    #[test]
    fn test_reset_link_is_single_use() {
        let f = fixture();
        f.service.register(EMAIL, PASSWORD).unwrap();
        f.service.request_password_reset(EMAIL).unwrap();

        let sent = f.mailer.sent();
        let (uid, token) = link_parts(&sent.last().unwrap().body);

        f.service
            .confirm_password_reset(&uid, &token, "a brand new passphrase")
            .unwrap();
        let err = f
            .service
            .confirm_password_reset(&uid, &token, "yet another passphrase")
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn test_reset_request_is_enumeration_proof() {
        let f = fixture();
        // Unknown address: succeeds, sends nothing.
        f.service.request_password_reset("ghost@example.com").unwrap();
        assert!(f.mailer.sent().is_empty());

        // Inactive account: same.
        let user = f.service.register(EMAIL, PASSWORD).unwrap();
        let mut user = f.users.find_by_id(user.id).unwrap().unwrap();
        user.is_active = false;
        f.users.update(&user).unwrap();

        let before = f.mailer.sent().len();
        f.service.request_password_reset(EMAIL).unwrap();
        assert_eq!(f.mailer.sent().len(), before);
    }

    #[test]
    fn test_confirm_reset_rejects_garbage() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();

        let uid = ActionTokenGenerator::encode_uid(user.id);
        for (bad_uid, bad_token) in [
            ("not-base64!!", "whatever"),
            (uid.as_str(), "tampered-token"),
            (uid.as_str(), ""),
        ] {
            let err = f
                .service
                .confirm_password_reset(bad_uid, bad_token, "a brand new passphrase")
                .unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }
    }

    #[test]
    fn test_verification_flow_roundtrip() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();

        let sent = f.mailer.sent();
        let (uid, token) = link_parts(&sent[0].body);
        f.service.verify_email(&uid, &token).unwrap();

        let updated = f.users.find_by_id(user.id).unwrap().unwrap();
        assert!(updated.is_verified);

        // Re-submitting the link is a harmless no-op once verified.
        f.service.verify_email(&uid, &token).unwrap();
        f.service.verify_email(&uid, "anything").unwrap();
    }

    #[test]
    fn test_verify_email_rejects_bad_tokens_while_unverified() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();
        let uid = ActionTokenGenerator::encode_uid(user.id);

        for (bad_uid, bad_token) in [("not-base64!!", "x"), (uid.as_str(), "forged-token")] {
            let err = f.service.verify_email(bad_uid, bad_token).unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }

        let unchanged = f.users.find_by_id(user.id).unwrap().unwrap();
        assert!(!unchanged.is_verified);
    }

    #[test]
    fn test_resend_skips_verified_accounts() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();

        let mut user = f.users.find_by_id(user.id).unwrap().unwrap();
        user.is_verified = true;
        f.users.update(&user).unwrap();

        let before = f.mailer.sent().len();
        f.service.send_verification(EMAIL).unwrap();
        f.service.send_verification("ghost@example.com").unwrap();
        assert_eq!(f.mailer.sent().len(), before);
    }

    #[test]
    fn test_resend_mails_unverified_account() {
        let f = fixture();
        f.service.register(EMAIL, PASSWORD).unwrap();

        f.service.send_verification(EMAIL).unwrap();
        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].body.contains("/verify-email/"));
    }

    #[test]
    fn test_action_token_respects_generator_secret() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD).unwrap();
        let user = f.users.find_by_id(user.id).unwrap().unwrap();

        // A token minted with a different secret never checks out.
        let other = ActionTokenGenerator::new("other-secret", Duration::from_secs(3600));
        let forged = other.make_token(TokenPurpose::PasswordReset, &user);
        let uid = ActionTokenGenerator::encode_uid(user.id);

        let err = f
            .service
            .confirm_password_reset(&uid, &forged, "a brand new passphrase")
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        // The fixture's own generator does.
        let genuine = f.generator.make_token(TokenPurpose::PasswordReset, &user);
        f.service
            .confirm_password_reset(&uid, &genuine, "a brand new passphrase")
            .unwrap();
    }
}
