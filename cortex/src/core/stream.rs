use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Thinking,
    Result,
    Error,
    Done,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Thinking => "thinking",
            EventKind::Result => "result",
            EventKind::Error => "error",
            EventKind::Done => "done",
        }
    }
}

/// Progress message pushed to streaming clients.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: Value,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stage: String,
    pub timestamp: i64,
}

impl StreamEvent {
    pub fn new(kind: EventKind, stage: &str, content: impl Into<Value>) -> Self {
        Self {
            kind,
            content: content.into(),
            stage: stage.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn thinking(stage: &str, message: impl Into<String>) -> Self {
        Self::new(EventKind::Thinking, stage, message.into())
    }

    pub fn error(stage: &str, message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, stage, message.into())
    }

    pub fn done(stage: &str, message: impl Into<String>) -> Self {
        Self::new(EventKind::Done, stage, message.into())
    }

    pub fn result(stage: &str, content: impl Into<Value>) -> Self {
        Self::new(EventKind::Result, stage, content)
    }
}

/// The consumer of a stream went away.
#[derive(Debug, Clone, Copy)]
pub struct Disconnected;

impl fmt::Display for Disconnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stream consumer disconnected")
    }
}

impl std::error::Error for Disconnected {}

pub fn is_disconnected(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Disconnected>().is_some()
}

/// Receiver of pipeline progress. A failed send means the consumer is gone
/// and the pipeline should stop.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: StreamEvent) -> Result<()>;

    fn is_streaming(&self) -> bool {
        true
    }
}

pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn send(&self, _event: StreamEvent) -> Result<()> {
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        false
    }
}

#[async_trait]
impl EventSink for mpsc::Sender<StreamEvent> {
    async fn send(&self, event: StreamEvent) -> Result<()> {
        mpsc::Sender::send(self, event)
            .await
            .map_err(|_| anyhow::Error::new(Disconnected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = StreamEvent::thinking("总览", "开始");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "thinking");
        assert_eq!(value["content"], "开始");
        assert_eq!(value["stage"], "总览");

        let bare = serde_json::to_value(StreamEvent::done("", "ok")).unwrap();
        assert!(bare.get("stage").is_none());
    }

    #[tokio::test]
    async fn channel_sink_fails_once_receiver_dropped() {
        let (tx, mut rx) = mpsc::channel(4);
        EventSink::send(&tx, StreamEvent::thinking("s", "a")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Thinking);

        drop(rx);
        let err = EventSink::send(&tx, StreamEvent::thinking("s", "b")).await.unwrap_err();
        assert!(is_disconnected(&err));
        assert!(is_disconnected(&err.context("while refining")));
    }
}
