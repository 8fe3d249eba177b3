//! HTTP server for concierged.

use anyhow::Result;
use axum::http::HeaderValue;
use axum::Router;
use concierge_common::knowledge::KnowledgeBase;
use concierge_common::retry::RetryPolicy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::admission::RateGuard;
use crate::config::Config;
use crate::content::ContentClient;
use crate::model::{GenerativeBackend, HttpBackend};
use crate::orchestrator::Orchestrator;
use crate::routes;
use crate::store::DocumentStore;
use crate::translator::Translator;

/// Maximum request body size: 64 KiB
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub orchestrator: Orchestrator,
    pub translator: Translator,
    pub rate_guard: RateGuard,
    pub http: reqwest::Client,
    pub start_time: Instant,
}

impl AppState {
    /// Wire up production collaborators from the configuration.
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(DocumentStore::open(&config.db_path)?);
        let backend: Arc<dyn GenerativeBackend> = Arc::new(HttpBackend::new(config.model.clone())?);
        Self::with_backend(config, store, backend)
    }

    /// Wire up state around an injected backend and store.
    pub fn with_backend(
        config: Config,
        store: Arc<DocumentStore>,
        backend: Arc<dyn GenerativeBackend>,
    ) -> Result<Self> {
        let content = Arc::new(ContentClient::new(&config.content));
        let kb = Arc::new(KnowledgeBase::new());
        let policy = RetryPolicy::default();

        let orchestrator = Orchestrator::new(
            backend.clone(),
            content,
            kb,
            policy.clone(),
            Duration::from_secs(config.chat_deadline_secs),
        );
        let translator = Translator::new(backend, store.clone(), policy);

        Ok(Self {
            config,
            orchestrator,
            translator,
            rate_guard: RateGuard::new(store),
            http: reqwest::Client::new(),
            start_time: Instant::now(),
        })
    }
}

/// Run the HTTP server
pub async fn run(state: AppState) -> Result<()> {
    let addr = state.config.bind_addr.clone();
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("  Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .merge(routes::chat_routes())
        .merge(routes::translate_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
