//! HTTP Surface
//!
//! Thin axum adapters over the services: extract client context and a
//! validated payload, call one service method, map the result. No business
//! logic lives here.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use postern::config::PosternConfig;
//! use postern::contact::LogMailer;
//! use postern::http::{router, AppState};
//!
//! let config = PosternConfig::from_env()?;
//! let state = AppState::in_memory(&config, Arc::new(LogMailer));
//! let app = router(state);
//! ```

use std::sync::Arc;

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::AccountService;
use crate::action_token::ActionTokenGenerator;
use crate::authn::AuthBackend;
use crate::client::ClientContext;
use crate::config::PosternConfig;
use crate::contact::{ContactForm, ContactService, Mailer};
use crate::error::AuthError;
use crate::model::User;
use crate::password::PasswordPolicy;
use crate::store::{
    InMemoryLoginAttemptStore, InMemoryRefreshTokenStore, InMemoryUserStore, LoginAttemptStore,
    RefreshTokenStore, UserStore,
};
use crate::token::{Claims, JwtSigner, TokenService};
use crate::validation::{
    validate_confirmation, validate_email, validate_required, FieldErrors, Validate, ValidatedJson,
};

// ============================================================================
// State
// ============================================================================

/// Wired services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub auth: Arc<AuthBackend>,
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<AccountService>,
    /// Absent when no contact recipient is configured
    pub contact: Option<Arc<ContactService>>,
}

impl AppState {
    /// Wire the services over caller-provided stores
    pub fn wire(
        config: &PosternConfig,
        users: Arc<dyn UserStore>,
        token_store: Arc<dyn RefreshTokenStore>,
        attempts: Arc<dyn LoginAttemptStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = Arc::new(
            TokenService::new(Arc::new(JwtSigner::new(&config.jwt_secret)), token_store)
                .with_ttls(config.access_ttl, config.refresh_ttl)
                .with_retention(config.token_retention),
        );

        let auth = Arc::new(
            AuthBackend::new(users.clone(), attempts).with_policy(config.lockout.clone()),
        );

        let accounts = Arc::new(
            AccountService::new(
                users.clone(),
                tokens.clone(),
                mailer.clone(),
                ActionTokenGenerator::new(&config.jwt_secret, config.action_token_ttl),
            )
            .with_password_policy(PasswordPolicy::default())
            .with_link_base(&config.link_base)
            .with_single_user(config.single_user),
        );

        let contact = (!config.contact_recipient.is_empty())
            .then(|| Arc::new(ContactService::new(mailer, &config.contact_recipient)));

        Self {
            users,
            auth,
            tokens,
            accounts,
            contact,
        }
    }

    /// Wire the services over fresh in-memory stores
    pub fn in_memory(config: &PosternConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::wire(
            config,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryRefreshTokenStore::new()),
            Arc::new(InMemoryLoginAttemptStore::new()),
            mailer,
        )
    }
}

// ============================================================================
// Bearer auth extractor
// ============================================================================

/// Access-token claims of the authenticated caller
///
/// Rejects with 401 when the Authorization header is missing, malformed, or
/// carries anything but a live access token.
pub struct CurrentUser(pub Claims);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AuthError::TokenInvalid)?;

        Ok(Self(state.tokens.verify_access(token)?))
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_required(&self.email, "email"));
        errors.collect(validate_required(&self.password, "password"));
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_email(&self.email, "email"));
        errors.collect(validate_required(&self.password, "password"));
        errors.collect(validate_confirmation(
            &self.password,
            &self.confirm_password,
            "confirm_password",
        ));
        errors.into_result()
    }
}

/// Shared shape for logout and refresh
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenVerifyRequest {
    pub token: String,
}

impl Validate for TokenVerifyRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_required(&self.token, "token"));
        errors.into_result()
    }
}

impl Validate for RefreshTokenRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_required(&self.refresh, "refresh"));
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_required(&self.old_password, "old_password"));
        errors.collect(validate_required(&self.new_password, "new_password"));
        errors.collect(validate_confirmation(
            &self.new_password,
            &self.confirm_password,
            "confirm_password",
        ));
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

impl Validate for EmailRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_email(&self.email, "email"));
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub uid: String,
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl Validate for ResetConfirmRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_required(&self.uid, "uid"));
        errors.collect(validate_required(&self.token, "token"));
        errors.collect(validate_required(&self.new_password, "new_password"));
        errors.collect(validate_confirmation(
            &self.new_password,
            &self.confirm_password,
            "confirm_password",
        ));
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub uid: String,
    pub token: String,
}

impl Validate for VerifyEmailRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.collect(validate_required(&self.uid, "uid"));
        errors.collect(validate_required(&self.token, "token"));
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
struct UserResponse {
    id: Uuid,
    email: String,
    is_verified: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_verified: user.is_verified,
        }
    }
}

fn detail(message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "detail": message }))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn health_ready(State(state): State<AppState>) -> Result<Response, AuthError> {
    // Readiness means the user store answers.
    state.users.count()?;
    Ok(Json(serde_json::json!({ "status": "ready" })).into_response())
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, AuthError> {
    let ctx = ClientContext::from_headers(&headers);
    let user = state.auth.authenticate(&req.email, &req.password, &ctx)?;
    let pair = state.tokens.issue_pair(&user, &ctx)?;

    Ok(Json(serde_json::json!({
        "user": UserResponse::from(&user),
        "access": pair.access,
        "refresh": pair.refresh,
        "access_expires_in": pair.access_expires_in,
        "refresh_expires_in": pair.refresh_expires_in,
    }))
    .into_response())
}

async fn logout(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<StatusCode, AuthError> {
    state.tokens.logout(&req.refresh)?;
    Ok(StatusCode::RESET_CONTENT)
}

async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<Response, AuthError> {
    let ctx = ClientContext::from_headers(&headers);
    let pair = state.tokens.refresh(&req.refresh, &ctx)?;
    Ok(Json(pair).into_response())
}

async fn verify_token(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<TokenVerifyRequest>,
) -> Result<Response, AuthError> {
    state.tokens.verify_token(&req.token)?;
    Ok(detail("Token is valid.").into_response())
}

async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<Response, AuthError> {
    let user = state.accounts.register(&req.email, &req.password)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "user": UserResponse::from(&user) })),
    )
        .into_response())
}

async fn me(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Response, AuthError> {
    let user = state
        .users
        .find_by_id(claims.sub)?
        .ok_or(AuthError::TokenInvalid)?;
    Ok(Json(UserResponse::from(&user)).into_response())
}

async fn change_password(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Response, AuthError> {
    state
        .accounts
        .change_password(claims.sub, &req.old_password, &req.new_password)?;
    Ok(detail("Password changed.").into_response())
}

async fn request_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<Response, AuthError> {
    state.accounts.request_password_reset(&req.email)?;
    Ok(detail("If an account exists for that address, a password reset link has been sent.")
        .into_response())
}

async fn confirm_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetConfirmRequest>,
) -> Result<Response, AuthError> {
    state
        .accounts
        .confirm_password_reset(&req.uid, &req.token, &req.new_password)?;
    Ok(detail("Password has been reset.").into_response())
}

async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<Response, AuthError> {
    state.accounts.verify_email(&req.uid, &req.token)?;
    Ok(detail("Email verified.").into_response())
}

async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<Response, AuthError> {
    state.accounts.send_verification(&req.email)?;
    Ok(detail("If an account exists for that address, a verification link has been sent.")
        .into_response())
}

async fn contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(form): ValidatedJson<ContactForm>,
) -> Result<Response, AuthError> {
    let Some(service) = &state.contact else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "not_found",
                "message": "The contact form is not enabled.",
            })),
        )
            .into_response());
    };

    let ctx = ClientContext::from_headers(&headers);
    service.submit(&form, &ctx)?;
    Ok(detail("Message sent.").into_response())
}

// ============================================================================
// Router
// ============================================================================

/// Build the full route table over the wired state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/token/verify", post(verify_token))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/auth/password/change", post(change_password))
        .route("/auth/password/reset", post(request_reset))
        .route("/auth/password/reset/confirm", post(confirm_reset))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/verify-email/resend", post(resend_verification))
        .route("/contact", post(contact))
        .with_state(state)
}
