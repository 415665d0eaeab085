//! Observability Infrastructure
//!
//! Structured logging for the authentication backend. Application code uses
//! standard `tracing` macros; security-relevant transitions go through the
//! [`security_event!`](crate::security_event) macro so every audit record
//! carries an event name, category, and severity.
//!
//! Metrics and log shipping are deployment concerns and live outside this
//! crate; everything here emits plain `tracing` events that any subscriber
//! can consume.

mod events;

pub use events::{SecurityEvent, Severity};

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber for the process.
///
/// Respects `RUST_LOG` for filtering, defaulting to `info`. Safe to call once
/// at startup; subsequent calls are no-ops.
///
/// ```ignore
/// postern::observability::init_tracing();
/// ```
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
