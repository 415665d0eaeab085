//! Convenience re-exports for embedding the crate
//!
//! ```ignore
//! use postern::prelude::*;
//! ```

pub use crate::account::AccountService;
pub use crate::action_token::{ActionTokenGenerator, TokenPurpose};
pub use crate::authn::AuthBackend;
pub use crate::client::ClientContext;
pub use crate::config::PosternConfig;
pub use crate::contact::{ContactForm, ContactService, LogMailer, Mailer, OutboundEmail};
pub use crate::error::AuthError;
pub use crate::http::{router, AppState};
pub use crate::model::{LockoutPolicy, LoginAttempt, RefreshTokenRecord, User};
pub use crate::password::PasswordPolicy;
pub use crate::store::{
    InMemoryLoginAttemptStore, InMemoryRefreshTokenStore, InMemoryUserStore, LoginAttemptStore,
    RefreshTokenStore, UserStore,
};
pub use crate::token::{Claims, JwtSigner, TokenKind, TokenPair, TokenService, TokenSigner};
pub use crate::validation::{Validate, ValidatedJson};
