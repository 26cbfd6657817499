use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;

use cortex::core::llm::{ChatModel, ChatResponse};
use crate::routes::{bad_request, required, upstream_error};
use crate::AppState;

const ASSISTANT_PROMPT: &str = "你是一个有用的AI助手，请回答用户的问题。";

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub message: Option<String>,
}

fn payload(response: &ChatResponse) -> Value {
    json!({
        "response": response.content,
        "model": response.model,
        "usage": response.usage,
    })
}

async fn answer(model: &dyn ChatModel, message: &str) -> Response {
    tracing::info!(model = model.name(), "chat request: {}", message);
    match model.complete(ASSISTANT_PROMPT, message).await {
        Ok(response) => Json(json!({
            "success": true,
            "message": message,
            "data": payload(&response),
        }))
        .into_response(),
        Err(e) => upstream_error("发送消息失败", e),
    }
}

pub async fn deepseek_chat(State(state): State<AppState>, Query(query): Query<ChatQuery>) -> Response {
    let Some(message) = required(query.message) else {
        return bad_request("message 参数不能为空");
    };
    answer(state.deepseek.as_ref(), &message).await
}

pub async fn ark_chat(State(state): State<AppState>, Query(query): Query<ChatQuery>) -> Response {
    let Some(message) = required(query.message) else {
        return bad_request("message 参数不能为空");
    };
    let Some(ark) = state.ark.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "ARK_API_KEY 未配置" })),
        )
            .into_response();
    };
    answer(ark.as_ref(), &message).await
}

/// Single-shot answer delivered as SSE: one `message` (or `error`) event,
/// then `done`.
pub async fn deepseek_stream(State(state): State<AppState>, Query(query): Query<ChatQuery>) -> Response {
    let Some(message) = required(query.message) else {
        return bad_request("message 参数不能为空");
    };

    let first = match state.deepseek.complete(ASSISTANT_PROMPT, &message).await {
        Ok(response) => Event::default().event("message").data(payload(&response).to_string()),
        Err(e) => {
            tracing::error!("deepseek stream failed: {:#}", e);
            Event::default()
                .event("error")
                .data(json!({ "error": format!("发送消息失败: {}", e) }).to_string())
        }
    };
    let done = Event::default()
        .event("done")
        .data(json!({ "message": "流式响应完成" }).to_string());

    Sse::new(stream::iter([Ok::<_, Infallible>(first), Ok(done)])).into_response()
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get, get_json, state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn deepseek_chat_wraps_answer_and_usage() {
        let (status, body) = get_json(state(Ok("你好")), "/api/deepseek/chat?message=hi").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "hi");
        assert_eq!(body["data"]["response"], "你好");
        assert_eq!(body["data"]["usage"]["total_tokens"], 7);
    }

    #[tokio::test]
    async fn chat_errors_map_to_status_codes() {
        let (status, _) = get_json(state(Ok("x")), "/api/deepseek/chat").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_json(state(Err("quota")), "/api/deepseek/chat?message=hi").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("quota"));

        let (status, _) = get_json(state(Ok("x")), "/api/ark/chat?message=hi").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn stream_sends_message_then_done() {
        let (status, body) = get(state(Ok("答案")), "/api/deepseek/stream?message=hi").await;
        assert_eq!(status, StatusCode::OK);
        let message_at = body.find("message").unwrap();
        let done_at = body.find("event: done").or_else(|| body.find("event:done")).unwrap();
        assert!(message_at < done_at);
        assert!(body.contains("答案"));
    }
}
