use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::core::config::ArkConfig;
use crate::core::llm::{strip_think, ChatModel, ChatResponse, TokenUsage};
use crate::core::mode::ContextSource;
use crate::core::prompts;

#[derive(Debug, Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct InputContent {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct InputItem {
    role: &'static str,
    content: Vec<InputContent>,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    input: Vec<InputItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputText {
    #[serde(rename = "type")]
    kind: String,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    role: String,
    content: Vec<OutputText>,
    summary: Vec<OutputText>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsesBody {
    model: String,
    output: Vec<OutputItem>,
    usage: serde_json::Value,
}

impl ResponsesBody {
    /// Assistant `output_text`, falling back to the reasoning summary.
    fn answer(&self) -> Option<&str> {
        let message = self
            .output
            .iter()
            .filter(|o| o.kind == "message" && o.role == "assistant")
            .flat_map(|o| o.content.iter())
            .find(|c| c.kind == "output_text" && !c.text.is_empty());
        if let Some(text) = message {
            return Some(&text.text);
        }

        self.output
            .iter()
            .filter(|o| o.kind == "reasoning")
            .flat_map(|o| o.summary.iter())
            .find(|s| s.kind == "summary_text" && !s.text.is_empty())
            .map(|s| s.text.as_str())
    }

    fn usage(&self) -> TokenUsage {
        // The responses API names its counters input/output tokens.
        let mut usage = TokenUsage::from_json(&self.usage);
        if usage.prompt_tokens == 0 {
            usage.prompt_tokens = self.usage["input_tokens"].as_u64().unwrap_or(0);
        }
        if usage.completion_tokens == 0 {
            usage.completion_tokens = self.usage["output_tokens"].as_u64().unwrap_or(0);
        }
        usage
    }
}

/// Volcengine Ark "responses" client with the built-in web search tool.
pub struct ArkClient {
    client: Client,
    config: ArkConfig,
}

impl ArkClient {
    pub fn new(config: ArkConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(180))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn build_request<'a>(model: &'a str, system: &str, user: &str, web_search: bool) -> ResponsesRequest<'a> {
        let item = |role, text: &str| InputItem {
            role,
            content: vec![InputContent {
                kind: "input_text",
                text: text.to_string(),
            }],
        };

        let mut input = Vec::new();
        if !system.is_empty() {
            input.push(item("system", system));
        }
        input.push(item("user", user));

        ResponsesRequest {
            model,
            stream: false,
            tools: if web_search { vec![Tool { kind: "web_search" }] } else { Vec::new() },
            input,
        }
    }

    pub async fn respond(&self, model: &str, system: &str, user: &str, web_search: bool) -> Result<ChatResponse> {
        if self.config.api_key.is_empty() {
            return Err(anyhow!("Ark API key is not configured"));
        }

        let url = format!("{}/responses", self.config.base_url.trim_end_matches('/'));
        let request = Self::build_request(model, system, user, web_search);

        log::info!("Sending Ark request (model={}, web_search={})", model, web_search);
        let res = self.client.post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Ark Connection Failed: {}", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            log::error!("Ark Error {}: {}", status, text);
            return Err(anyhow!("Ark API Error {}: {}", status, text));
        }

        let body: ResponsesBody = res.json().await?;
        let content = body
            .answer()
            .ok_or_else(|| anyhow!("Ark response contained no output text"))?;

        Ok(ChatResponse {
            content: strip_think(content).to_string(),
            model: if body.model.is_empty() { model.to_string() } else { body.model.clone() },
            usage: body.usage(),
        })
    }
}

#[async_trait]
impl ChatModel for ArkClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<ChatResponse> {
        self.respond(&self.config.model, system, user, true).await
    }
}

#[async_trait]
impl ContextSource for ArkClient {
    fn label(&self) -> &str {
        "Ark web search"
    }

    async fn gather(&self, keyword: &str) -> Result<Option<String>> {
        let response = self
            .respond(
                &self.config.search_model,
                prompts::WEB_SEARCH_SYSTEM_PROMPT,
                &prompts::web_search_user_prompt(keyword),
                true,
            )
            .await?;
        let text = response.content.trim();
        Ok(if text.is_empty() { None } else { Some(text.to_string()) })
    }
}
