//! Configuration
//!
//! Environment-driven configuration with safe defaults for everything except
//! the signing secret, which must be present and long enough. All durations
//! accept human-readable values ("15m", "7d", "24h").
//!
//! | Variable                     | Default                 |
//! |------------------------------|-------------------------|
//! | `POSTERN_JWT_SECRET`         | required, 32+ bytes     |
//! | `POSTERN_ACCESS_TTL`         | `15m`                   |
//! | `POSTERN_REFRESH_TTL`        | `7d`                    |
//! | `POSTERN_TOKEN_RETENTION`    | `30d`                   |
//! | `POSTERN_ACTION_TOKEN_TTL`   | `24h`                   |
//! | `POSTERN_MAX_LOGIN_ATTEMPTS` | `5`                     |
//! | `POSTERN_LOCKOUT_DURATION`   | `30m`                   |
//! | `POSTERN_SINGLE_USER`        | `false`                 |
//! | `POSTERN_LINK_BASE`          | `http://localhost:3000` |
//! | `POSTERN_CONTACT_RECIPIENT`  | empty (contact off)     |
//! | `POSTERN_BIND_ADDR`          | `127.0.0.1:8000`        |

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::model::LockoutPolicy;
use crate::parse::{parse_bool, parse_duration};

/// Minimum acceptable signing secret length in bytes
const MIN_SECRET_LEN: usize = 32;

/// Configuration failure at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{0} must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret(&'static str),
}

/// Runtime configuration for the authentication service
#[derive(Debug, Clone)]
pub struct PosternConfig {
    /// HMAC secret for JWTs and emailed action tokens
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Retention window for expired refresh-token records
    pub token_retention: Duration,
    /// Lifetime of emailed reset/verification links
    pub action_token_ttl: Duration,
    pub lockout: LockoutPolicy,
    /// Close registration once one account exists
    pub single_user: bool,
    /// Base URL for links in outbound mail
    pub link_base: String,
    /// Contact form delivery address; empty disables the form
    pub contact_recipient: String,
    pub bind_addr: String,
}

impl PosternConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret =
            env::var("POSTERN_JWT_SECRET").map_err(|_| ConfigError::Missing("POSTERN_JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret("POSTERN_JWT_SECRET"));
        }

        let lockout = LockoutPolicy::builder()
            .max_attempts(
                env_or("POSTERN_MAX_LOGIN_ATTEMPTS", "")
                    .parse()
                    .unwrap_or(LockoutPolicy::default().max_attempts),
            )
            .lockout_duration(parse_duration(
                &env_or("POSTERN_LOCKOUT_DURATION", ""),
                LockoutPolicy::default().lockout_duration,
            ))
            .build();

        Ok(Self {
            jwt_secret,
            access_ttl: parse_duration(
                &env_or("POSTERN_ACCESS_TTL", "15m"),
                Duration::from_secs(15 * 60),
            ),
            refresh_ttl: parse_duration(
                &env_or("POSTERN_REFRESH_TTL", "7d"),
                Duration::from_secs(7 * 24 * 3600),
            ),
            token_retention: parse_duration(
                &env_or("POSTERN_TOKEN_RETENTION", "30d"),
                Duration::from_secs(30 * 24 * 3600),
            ),
            action_token_ttl: parse_duration(
                &env_or("POSTERN_ACTION_TOKEN_TTL", "24h"),
                Duration::from_secs(24 * 3600),
            ),
            lockout,
            single_user: parse_bool(&env_or("POSTERN_SINGLE_USER", ""), false),
            link_base: env_or("POSTERN_LINK_BASE", "http://localhost:3000"),
            contact_recipient: env_or("POSTERN_CONTACT_RECIPIENT", ""),
            bind_addr: env_or("POSTERN_BIND_ADDR", "127.0.0.1:8000"),
        })
    }

    /// A configuration with the given secret and every default, for tests
    /// and embedding
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 3600),
            token_retention: Duration::from_secs(30 * 24 * 3600),
            action_token_ttl: Duration::from_secs(24 * 3600),
            lockout: LockoutPolicy::default(),
            single_user: false,
            link_base: "http://localhost:3000".to_string(),
            contact_recipient: String::new(),
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
