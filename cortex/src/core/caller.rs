use anyhow::{anyhow, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::{Arc, OnceLock};
use crate::core::llm::{strip_think, ChatModel};
use crate::core::stream::{EventSink, StreamEvent};

const PREVIEW_CHARS: usize = 200;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("valid fence regex"))
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

/// Byte range of the first balanced `{...}` or `[...]`, skipping brackets
/// inside string literals.
fn balanced_json_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some((start, end));
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a JSON value out of free-form model output.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let text = strip_think(raw);
    if text.is_empty() {
        return Err(anyhow!("model returned empty content"));
    }

    let unfenced = fence_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text);

    let direct_err = match serde_json::from_str::<T>(unfenced) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some((start, end)) = balanced_json_span(unfenced) {
        let candidate = &unfenced[start..end];
        if candidate.len() != unfenced.len() {
            log::debug!("Retrying JSON parse on embedded region ({} bytes)", candidate.len());
            return serde_json::from_str::<T>(candidate).map_err(|e| {
                anyhow!("Failed to parse JSON: {}, raw content: {}", e, preview(raw))
            });
        }
    }

    Err(anyhow!("Failed to parse JSON: {}, raw content: {}", direct_err, preview(raw)))
}

/// Sends prompt pairs to a chat model, logging every stage and mirroring
/// progress to an event sink.
#[derive(Clone)]
pub struct LlmCaller {
    model: Arc<dyn ChatModel>,
}

impl LlmCaller {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn call(&self, system: &str, user: &str, stage: &str, sink: &dyn EventSink) -> Result<String> {
        log::info!("[LlmCaller] Calling {} for stage: {}", self.model.name(), stage);
        log::debug!("[LlmCaller] {} system prompt:\n{}", stage, system);
        log::debug!("[LlmCaller] {} user prompt:\n{}", stage, user);

        sink.send(StreamEvent::thinking(stage, format!("正在处理 {} 阶段...", stage))).await?;
        if sink.is_streaming() {
            sink.send(StreamEvent::thinking(stage, format!("System Prompt: {}", system))).await?;
            sink.send(StreamEvent::thinking(stage, format!("User Prompt: {}", user))).await?;
        }

        let response = match self.model.complete(system, user).await {
            Ok(r) => r,
            Err(e) => {
                log::error!("[LlmCaller] {} failed: {}", stage, e);
                sink.send(StreamEvent::error(stage, format!("LLM调用失败: {}", e))).await?;
                return Err(e.context(format!("LLM call failed at stage {}", stage)));
            }
        };

        log::info!(
            "[LlmCaller] {} answered ({} chars, {} tokens)",
            stage,
            response.content.chars().count(),
            response.usage.total_tokens
        );
        log::debug!("[LlmCaller] {} response: {}", stage, response.content);

        sink.send(StreamEvent::result(stage, response.content.clone())).await?;
        Ok(response.content)
    }

    pub async fn call_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        stage: &str,
        sink: &dyn EventSink,
    ) -> Result<T> {
        let content = self.call(system, user, stage, sink).await?;

        sink.send(StreamEvent::thinking(stage, format!("正在解析 {} 阶段的响应...", stage))).await?;
        match extract_json::<T>(&content) {
            Ok(value) => {
                sink.send(StreamEvent::done(stage, format!("{} 阶段完成", stage))).await?;
                Ok(value)
            }
            Err(e) => {
                log::warn!("[LlmCaller] {}: {}", stage, e);
                sink.send(StreamEvent::error(stage, e.to_string())).await?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ScriptedModel;
    use crate::core::stream::{EventKind, NoopSink};
    use crate::core::types::Timeline;
    use tokio::sync::mpsc;

    #[test]
    fn parses_plain_json() {
        let t: Timeline = extract_json(r#"{"keyword":"k","events":[]}"#).unwrap();
        assert_eq!(t.keyword, "k");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "好的，结果如下：\n```json\n{\"keyword\":\"k\",\"events\":[{\"id\":\"1\"}]}\n```\n以上。";
        let t: Timeline = extract_json(raw).unwrap();
        assert_eq!(t.events.len(), 1);
    }

    #[test]
    fn parses_json_wrapped_in_prose_with_brackets_in_strings() {
        let raw = r#"<think>先想想 {</think>结果：{"keyword":"k","events":[{"id":"1","title":"a } b [c"}]} 完毕 }"#;
        let t: Timeline = extract_json(raw).unwrap();
        assert_eq!(t.events[0].title, "a } b [c");
    }

    #[test]
    fn handles_escaped_quotes() {
        let raw = r#"x {"keyword":"say \"hi\" }","events":[]} y"#;
        let t: Timeline = extract_json(raw).unwrap();
        assert_eq!(t.keyword, "say \"hi\" }");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(extract_json::<Timeline>("   ").is_err());
        assert!(extract_json::<Timeline>("no json here").is_err());
        assert!(extract_json::<Timeline>("{\"keyword\": ").is_err());
    }

    #[tokio::test]
    async fn call_json_streams_stage_events() {
        let model = ScriptedModel::new(vec![Ok(r#"{"keyword":"k","events":[]}"#.to_string())]);
        let caller = LlmCaller::new(model.clone());
        let (tx, mut rx) = mpsc::channel(32);

        let t: Timeline = caller.call_json("sys", "user", "阶段", &tx).await.unwrap();
        assert_eq!(t.keyword, "k");
        drop(tx);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.stage, "阶段");
            kinds.push(event.kind);
        }
        assert_eq!(kinds.first(), Some(&EventKind::Thinking));
        assert!(kinds.contains(&EventKind::Result));
        assert_eq!(kinds.last(), Some(&EventKind::Done));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn call_surfaces_model_errors() {
        let model = ScriptedModel::new(vec![Err("boom".to_string())]);
        let caller = LlmCaller::new(model);
        let err = caller.call("s", "u", "x", &NoopSink).await.unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
    }
}
