use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::routes::{bad_request, required, upstream_error};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BaikeQuery {
    pub keyword: Option<String>,
    pub lemma_id: Option<String>,
}

pub async fn search(State(state): State<AppState>, Query(query): Query<BaikeQuery>) -> Response {
    let Some(keyword) = required(query.keyword) else {
        return bad_request("keyword 参数不能为空");
    };

    match state.baike.search(&keyword).await {
        Ok(data) => Json(json!({ "success": true, "keyword": keyword, "data": data })).into_response(),
        Err(e) => upstream_error("百科搜索失败", e),
    }
}

pub async fn lemma(State(state): State<AppState>, Query(query): Query<BaikeQuery>) -> Response {
    let Some(lemma_id) = required(query.lemma_id) else {
        return bad_request("lemma_id 参数不能为空");
    };

    match state.baike.search_by_lemma_id(&lemma_id).await {
        Ok(data) => Json(json!({ "success": true, "lemma_id": lemma_id, "data": data })).into_response(),
        Err(e) => upstream_error("百科搜索失败", e),
    }
}
