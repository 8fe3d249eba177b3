//! API routes for concierged.
//!
//! Chat errors are always delivered as a normal JSON body with a localized
//! message so the chat UI never renders a raw failure; the HTTP status still
//! tells the caller what happened.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use concierge_common::messages;
use concierge_common::types::{
    ChatRequest, ChatResponse, TranslateRequest, TranslateResponse, MAX_MESSAGE_CHARS,
    MAX_TRANSLATE_BATCH,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::admission::{check_origin, verify_challenge};
use crate::orchestrator::AnswerInput;
use crate::server::AppState;

type AppStateArc = Arc<AppState>;

/// Error body for the translate endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ============================================================================
// Chat Routes
// ============================================================================

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new().route("/chat", post(chat))
}

async fn chat(
    State(state): State<AppStateArc>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<ChatResponse>) {
    let request_id = Uuid::new_v4();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(ChatResponse::without_sources(messages::invalid_request("es"))),
        );
    }

    let req: ChatRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(e) => {
            warn!("[{}] Unparsable chat body: {}", request_id, e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ChatResponse::without_sources(messages::invalid_request("es"))),
            );
        }
    };
    let lang = req.lang.clone();

    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::without_sources(messages::invalid_request(&lang))),
        );
    }
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ChatResponse::without_sources(messages::message_too_long(&lang))),
        );
    }

    // Admission: origin, rate limit, challenge - in that order, each with
    // its own distinguishable status.
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok());
    if let Err(e) = check_origin(origin, referer, &state.config.allowed_origins) {
        warn!("[{}] Origin rejected: {}", request_id, e);
        return (
            StatusCode::FORBIDDEN,
            Json(ChatResponse::without_sources(messages::not_allowed(&lang))),
        );
    }

    let client_key = client_key(&headers, addr);
    let decision = state.rate_guard.is_rate_limited(
        &client_key,
        state.config.chat_rate_max,
        Duration::from_secs(state.config.chat_rate_window_secs),
        "chat",
    );
    if decision.limited {
        info!("[{}] Rate limited {} ({:?})", request_id, client_key, decision.source);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ChatResponse::without_sources(messages::rate_limited(&lang))),
        );
    }

    if let Err(e) = verify_challenge(
        &state.http,
        &state.config.challenge,
        req.captcha_token.as_deref(),
        Some(&client_key),
    )
    .await
    {
        warn!("[{}] Challenge rejected: {}", request_id, e);
        return (
            StatusCode::FORBIDDEN,
            Json(ChatResponse::without_sources(messages::not_allowed(&lang))),
        );
    }

    info!("[{}] Chat: {} chars, lang={}", request_id, req.message.chars().count(), lang);

    let input = AnswerInput {
        message: req.message,
        history: req.history,
        lang,
        current_date: req.current_date,
        current_time: req.current_time,
    };
    let response = state.orchestrator.answer(&input).await;
    (StatusCode::OK, Json(response))
}

/// Client key for rate limiting: forwarded address first, socket peer
/// otherwise.
fn client_key(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}

// ============================================================================
// Translate Routes
// ============================================================================

pub fn translate_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/translate", post(translate))
        .route("/translate/documents", delete(clear_translation_documents))
        .route("/translate/documents/:slug", delete(delete_translation_document))
}

async fn translate(
    State(state): State<AppStateArc>,
    Json(req): Json<TranslateRequest>,
) -> Response {
    if req.texts.is_empty() || req.texts.len() > MAX_TRANSLATE_BATCH {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: format!("texts must contain 1 to {} entries", MAX_TRANSLATE_BATCH),
            }),
        )
            .into_response();
    }
    if req.target_lang.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "targetLang is required".to_string(),
            }),
        )
            .into_response();
    }

    match state.translator.translate(&req.texts, &req.target_lang).await {
        Ok(translations) => Json(TranslateResponse { translations }).into_response(),
        Err(e) => {
            error!("Translation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "translation backend unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Count of documents affected by an administrative operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

async fn delete_translation_document(
    State(state): State<AppStateArc>,
    Path(slug): Path<String>,
) -> Response {
    match state.translator.delete_document(&slug) {
        Ok(deleted) => Json(DeletedResponse { deleted }).into_response(),
        Err(e) => {
            error!("Deleting translations for {} failed: {}", slug, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn clear_translation_documents(State(state): State<AppStateArc>) -> Response {
    match state.translator.clear_documents() {
        Ok(deleted) => Json(DeletedResponse { deleted }).into_response(),
        Err(e) => {
            error!("Clearing translations failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
