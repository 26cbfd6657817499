use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use cortex::core::mode::Mode;
use cortex::core::stream::StreamEvent;
use crate::routes::{bad_request, required};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub keyword: Option<String>,
    pub mode: Option<String>,
    pub stream: Option<String>,
}

impl TimelineQuery {
    fn mode(&self) -> Mode {
        self.mode.as_deref().map(Mode::parse).unwrap_or_default()
    }

    fn wants_stream(&self) -> bool {
        matches!(self.stream.as_deref(), Some("true") | Some("1"))
    }
}

pub async fn timeline(State(state): State<AppState>, Query(query): Query<TimelineQuery>) -> Response {
    let mode = query.mode();
    let stream = query.wants_stream();
    let Some(keyword) = required(query.keyword) else {
        return bad_request("keyword query parameter is required");
    };

    if stream {
        return timeline_sse(state, keyword, mode).into_response();
    }

    tracing::info!(%keyword, %mode, "timeline request");
    Json(state.agent.generate_timeline(&keyword, mode).await).into_response()
}

pub async fn timeline_stream(State(state): State<AppState>, Query(query): Query<TimelineQuery>) -> Response {
    let mode = query.mode();
    let Some(keyword) = required(query.keyword) else {
        return bad_request("keyword query parameter is required");
    };
    timeline_sse(state, keyword, mode).into_response()
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.kind.as_str())
        .data(serde_json::to_string(event).unwrap_or_default())
}

/// Runs the pipeline in the background and forwards its events. Dropping the
/// response closes the channel, which stops the pipeline at its next send.
fn timeline_sse(
    state: AppState,
    keyword: String,
    mode: Mode,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, %keyword, %mode, "timeline stream started");

    let start = Event::default().event("start").data(
        json!({
            "message": "开始生成时间链",
            "keyword": keyword,
            "mode": mode.as_str(),
            "run_id": run_id,
        })
        .to_string(),
    );

    let (tx, rx) = mpsc::channel::<StreamEvent>(64);
    let agent = state.agent.clone();
    tokio::spawn(async move {
        match agent.stream_timeline(&keyword, mode, &tx).await {
            Ok(timeline) => {
                tracing::info!(%run_id, events = timeline.events.len(), "timeline stream finished")
            }
            Err(e) => tracing::warn!(%run_id, "timeline stream aborted: {:#}", e),
        }
    });

    let events = stream::once(async move { Ok::<_, Infallible>(start) })
        .chain(ReceiverStream::new(rx).map(|event| Ok(sse_event(&event))));

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get, get_json, state};
    use axum::http::StatusCode;

    fn timeline_reply(events: usize) -> String {
        let events: Vec<_> = (1..=events)
            .map(|i| serde_json::json!({ "id": i.to_string(), "title": format!("t{}", i) }))
            .collect();
        serde_json::json!({ "keyword": "oil", "events": events }).to_string()
    }

    #[tokio::test]
    async fn missing_keyword_is_rejected() {
        let (status, body) = get_json(state(Ok("")), "/api/timeline").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("keyword"));

        let (status, _) = get_json(state(Ok("")), "/api/timeline/stream?keyword=%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn returns_generated_timeline() {
        let reply = timeline_reply(6);
        let (status, body) = get_json(state(Ok(&reply)), "/api/timeline?keyword=oil&mode=fast").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keyword"], "oil");
        assert_eq!(body["events"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn model_failure_returns_mock() {
        let (status, body) = get_json(state(Err("down")), "/api/timeline?keyword=oil").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn stream_starts_and_ends_with_done() {
        let reply = timeline_reply(6);
        let (status, body) = get(state(Ok(&reply)), "/api/timeline?keyword=oil&stream=true").await;
        assert_eq!(status, StatusCode::OK);

        let names: Vec<&str> = body
            .lines()
            .filter_map(|line| line.strip_prefix("event:"))
            .map(str::trim)
            .collect();
        assert_eq!(names.first(), Some(&"start"));
        assert!(names.contains(&"thinking"));
        assert!(names.contains(&"result"));
        assert_eq!(names.last(), Some(&"done"));
        assert!(body.contains("\"run_id\""));
    }
}
