//! Concierge Daemon - retrieval-augmented site assistant
//!
//! Answers visitor questions grounded in the site's knowledge base and
//! content store, and serves the translation cache.

use anyhow::Result;
use concierged::config::Config;
use concierged::server::{self, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Concierge Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    if config.allowed_origins.is_empty() {
        info!("No origin allowlist configured - origin check disabled");
    }
    if !config.challenge_enabled() {
        info!("No challenge secret configured - challenge verification disabled");
    }

    let state = AppState::new(config)?;
    server::run(state).await
}
