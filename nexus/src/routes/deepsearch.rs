use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use cortex::core::deepsearch::DeepSearchRequest;
use crate::routes::{bad_request, required, upstream_error};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomSearch {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub enable_deep_search: bool,
    #[serde(default)]
    pub max_completion_tokens: u32,
    /// week, month or year
    #[serde(default)]
    pub search_recency_filter: String,
}

impl CustomSearch {
    fn into_request(self) -> DeepSearchRequest {
        let mut request = DeepSearchRequest::new(self.query.trim());
        if self.enable_deep_search {
            request.enable_deep_search = true;
        }
        if self.max_completion_tokens > 0 {
            request.max_completion_tokens = self.max_completion_tokens;
        }
        if !self.search_recency_filter.is_empty() {
            request.search_recency_filter = self.search_recency_filter;
        }
        request
    }
}

async fn run(state: &AppState, request: DeepSearchRequest) -> Response {
    let query = request.query().to_string();
    tracing::info!(%query, deep = request.enable_deep_search, "deepsearch request");
    match state.deepsearch.search(&request).await {
        Ok(data) => Json(json!({ "success": true, "query": query, "data": data })).into_response(),
        Err(e) => upstream_error("深度搜索失败", e),
    }
}

pub async fn search(State(state): State<AppState>, Query(params): Query<SearchQuery>) -> Response {
    let Some(query) = required(params.query) else {
        return bad_request("query 参数不能为空");
    };
    run(&state, DeepSearchRequest::new(&query)).await
}

pub async fn custom(State(state): State<AppState>, Json(body): Json<CustomSearch>) -> Response {
    if body.query.trim().is_empty() {
        return bad_request("query 参数不能为空");
    }
    run(&state, body.into_request()).await
}
