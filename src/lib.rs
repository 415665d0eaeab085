//! # Postern
//!
//! Authentication backend for a single-owner portfolio site: email/password
//! login with account lockout, JWT issuance and rotation backed by a
//! server-side refresh-token ledger, enumeration-proof password reset and
//! email verification flows, and a contact-form mailer.
//!
//! The crate is a library first. [`http`] provides an axum router over the
//! services for deployments that want the batteries included; everything
//! underneath is plain service types over storage traits, so the HTTP layer
//! is optional.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use postern::config::PosternConfig;
//! use postern::contact::LogMailer;
//! use postern::http::{router, AppState};
//!
//! postern::observability::init_tracing();
//! let config = PosternConfig::from_env()?;
//! let state = AppState::in_memory(&config, Arc::new(LogMailer));
//! let app = router(state);
//! ```
//!
//! ## Layout
//!
//! - [`model`] - users, the refresh-token ledger, the login-attempt log
//! - [`store`] - storage traits plus in-memory implementations
//! - [`authn`] - credential verification with lockout
//! - [`token`] - JWT issuance, rotation, blacklisting, retention purge
//! - [`account`] - registration, password change/reset, email verification
//! - [`action_token`] - HMAC tokens behind the emailed links
//! - [`contact`] - outbound mail seam and the contact form
//! - [`password`] - Argon2 hashing and the password policy
//! - [`client`] - request metadata (IP, device summary)
//! - [`http`] - axum handlers and router
//! - [`config`] - environment-driven configuration
//! - [`observability`] - structured security-event logging

pub mod account;
pub mod action_token;
pub mod authn;
pub mod client;
pub mod config;
pub mod contact;
pub mod error;
pub mod http;
pub mod model;
pub mod observability;
pub mod parse;
pub mod password;
pub mod prelude;
pub mod store;
pub mod token;
pub mod validation;

pub use error::AuthError;
pub use model::{LockoutPolicy, LoginAttempt, RefreshTokenRecord, User};
