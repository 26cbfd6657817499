use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use crate::core::config::DeepSeekConfig;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn from_json(usage: &serde_json::Value) -> Self {
        let field = |name: &str| usage[name].as_u64().unwrap_or(0);
        Self {
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// A chat model that answers one system + user prompt pair.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<ChatResponse>;
}

/// Remove a reasoning preamble some models emit before the answer.
pub fn strip_think(content: &str) -> &str {
    match content.find("</think>") {
        Some(idx) => content[idx + "</think>".len()..].trim(),
        None => content.trim(),
    }
}

/// OpenAI-compatible chat completions client (DeepSeek).
pub struct LlmClient {
    client: Client,
    config: DeepSeekConfig,
}

impl LlmClient {
    pub fn new(config: DeepSeekConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<ChatResponse> {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user }));

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false
        });

        let url = self.endpoint();
        log::debug!("Sending LLM request to {}. Body: {}", url, body);

        let res = match self.client.post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("Failed to connect to LLM at {}: {}", url, e);
                    return Err(anyhow::anyhow!("LLM Connection Failed: {}", e));
                }
            };

        if !res.status().is_success() {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            log::error!("LLM Error {}: {}", status, error_text);
            return Err(anyhow::anyhow!("LLM API Error {}: {}", status, error_text));
        }

        let response_json: serde_json::Value = res.json().await?;
        log::debug!("Received LLM response: {}", response_json);

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Unexpected LLM response format: {}", response_json))?;

        Ok(ChatResponse {
            content: strip_think(content).to_string(),
            model: response_json["model"]
                .as_str()
                .unwrap_or(&self.config.model)
                .to_string(),
            usage: TokenUsage::from_json(&response_json["usage"]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_block() {
        assert_eq!(strip_think("<think>hmm</think>\n {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_think("  plain "), "plain");
    }

    #[test]
    fn usage_reads_missing_fields_as_zero() {
        let usage = TokenUsage::from_json(&json!({ "prompt_tokens": 12, "total_tokens": 20 }));
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 0);
        assert_eq!(usage.total_tokens, 20);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = LlmClient::new(DeepSeekConfig {
            base_url: "https://api.deepseek.com/".into(),
            ..Default::default()
        });
        assert_eq!(client.endpoint(), "https://api.deepseek.com/chat/completions");
        assert_eq!(client.name(), "deepseek-chat");
    }
}
