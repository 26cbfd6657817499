use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use crate::AppState;

pub mod baike;
pub mod chat;
pub mod deepsearch;
pub mod graph;
pub mod health;
pub mod timeline;

pub fn app(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    let main_page = format!("{}/main.html", static_dir);

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/timeline", get(timeline::timeline))
        .route("/timeline/stream", get(timeline::timeline_stream))
        .route("/graph", get(graph::graph))
        .route("/deepsearch/search", get(deepsearch::search))
        .route("/deepsearch/custom", post(deepsearch::custom))
        .route("/baike/search", get(baike::search))
        .route("/baike/lemma", get(baike::lemma))
        .route("/ark/chat", get(chat::ark_chat))
        .route("/deepseek/chat", get(chat::deepseek_chat))
        .route("/deepseek/stream", get(chat::deepseek_stream));

    Router::new()
        .nest("/api", api)
        .route_service("/", ServeFile::new(main_page))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Trimmed, non-empty query value.
pub fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

pub fn upstream_error(what: &str, err: anyhow::Error) -> Response {
    tracing::error!("{}: {:#}", what, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": what, "message": format!("{:#}", err) })),
    )
        .into_response()
}
