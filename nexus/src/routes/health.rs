use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use crate::AppState;

fn availability(configured: bool) -> &'static str {
    if configured { "available" } else { "not_configured" }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let baidu = &state.config.baidu;
    Json(json!({
        "status": "ok",
        "services": {
            "deep_search": availability(!baidu.deepsearch_api_key.is_empty()),
            "baike": availability(!baidu.baike_api_key.is_empty()),
            "ark_chat": availability(state.ark.is_some()),
        }
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get_json, state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn reports_unconfigured_services() {
        let (status, body) = get_json(state(Ok("")), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["services"]["ark_chat"], "not_configured");
        assert_eq!(body["services"]["baike"], "not_configured");
    }
}
