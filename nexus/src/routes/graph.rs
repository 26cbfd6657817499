use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use cortex::core::mode::Mode;
use cortex::core::types::Graph;
use crate::routes::required;
use crate::AppState;

const DEFAULT_KEYWORD: &str = "新闻";

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub keyword: Option<String>,
    pub mode: Option<String>,
}

/// Builds the timeline first, then derives the graph from it.
pub async fn graph(State(state): State<AppState>, Query(query): Query<GraphQuery>) -> Json<Graph> {
    let keyword = required(query.keyword).unwrap_or_else(|| DEFAULT_KEYWORD.to_string());
    let mode = query.mode.as_deref().map(Mode::parse).unwrap_or_default();
    tracing::info!(%keyword, %mode, "graph request");

    let timeline = state.agent.generate_timeline(&keyword, mode).await;
    Json(state.agent.generate_graph(&timeline).await)
}
