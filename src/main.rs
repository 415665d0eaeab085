//! Standalone server over in-memory stores
//!
//! Suitable for development and single-instance deployments where losing
//! sessions on restart is acceptable. Anything else should embed the library
//! and provide persistent stores.

use std::sync::Arc;

use postern::config::PosternConfig;
use postern::contact::LogMailer;
use postern::http::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    postern::observability::init_tracing();

    let config = PosternConfig::from_env()?;
    let state = AppState::in_memory(&config, Arc::new(LogMailer));

    // Hourly retention sweep for expired refresh-token records.
    let tokens = state.tokens.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = tokens.purge_expired() {
                tracing::error!(error = %e, "Retention sweep failed");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
