use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::core::config::BaiduConfig;
use crate::core::mode::ContextSource;
use crate::core::types::null_as_default;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeFilter {
    #[serde(rename = "type")]
    pub kind: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepSearchRequest {
    pub messages: Vec<Message>,
    pub search_source: String,
    pub resource_type_filter: Vec<ResourceTypeFilter>,
    pub search_recency_filter: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub search_mode: String,
    pub enable_reasoning: bool,
    pub enable_deep_search: bool,
    pub max_completion_tokens: u32,
    pub response_format: String,
    pub enable_corner_markers: bool,
    pub enable_followup_queries: bool,
    pub stream: bool,
    pub safety_level: String,
    pub max_search_query_num: u32,
}

impl DeepSearchRequest {
    pub fn new(query: &str) -> Self {
        let filter = |kind: &str| ResourceTypeFilter { kind: kind.to_string(), top_k: 4 };
        Self {
            messages: vec![Message { role: "user".to_string(), content: query.to_string() }],
            search_source: "baidu_search_v1".to_string(),
            resource_type_filter: vec![filter("image"), filter("video"), filter("web")],
            search_recency_filter: "week".to_string(),
            model: "ernie-3.5-8k".to_string(),
            temperature: 1e-10,
            top_p: 1e-10,
            search_mode: "auto".to_string(),
            enable_reasoning: true,
            enable_deep_search: false,
            max_completion_tokens: 2048,
            response_format: "auto".to_string(),
            enable_corner_markers: true,
            enable_followup_queries: false,
            stream: false,
            safety_level: "standard".to_string(),
            max_search_query_num: 10,
        }
    }

    pub fn query(&self) -> &str {
        self.messages.first().map(|m| m.content.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseMessage {
    #[serde(deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Choice {
    #[serde(deserialize_with = "null_as_default")]
    pub index: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub finish_reason: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub website: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    #[serde(deserialize_with = "null_as_default")]
    pub prompt_tokens: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub completion_tokens: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepSearchResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub request_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub choices: Vec<Choice>,
    #[serde(deserialize_with = "null_as_default")]
    pub references: Vec<Reference>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_safe: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub usage: Usage,
}

impl DeepSearchResponse {
    /// First answer followed by one line per reference; `None` without choices.
    pub fn as_context(&self) -> Option<String> {
        let choice = self.choices.first()?;
        let mut text = choice.message.content.clone();
        for reference in &self.references {
            text.push_str(&format!("\n参考信息: {} - {}", reference.title, reference.url));
        }
        Some(text)
    }
}

/// Baidu Qianfan AI search ("deep search") client.
pub struct DeepSearchClient {
    client: Client,
    api_key: String,
    url: String,
}

impl DeepSearchClient {
    pub fn new(config: &BaiduConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(180))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: config.deepsearch_api_key.clone(),
            url: config.deepsearch_url.clone(),
        }
    }

    pub async fn search(&self, request: &DeepSearchRequest) -> Result<DeepSearchResponse> {
        if self.api_key.is_empty() {
            return Err(anyhow!("Baidu DeepSearch API key is not configured"));
        }

        log::info!("DeepSearch query: {}", request.query());
        let res = self.client.post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("DeepSearch API Error {}: {}", status, text));
        }

        let body = res.text().await?;
        log::debug!("DeepSearch response: {}", body);
        serde_json::from_str(&body).map_err(|e| anyhow!("Failed to parse DeepSearch response: {}", e))
    }
}

#[async_trait]
impl ContextSource for DeepSearchClient {
    fn label(&self) -> &str {
        "Baidu DeepSearch"
    }

    async fn gather(&self, keyword: &str) -> Result<Option<String>> {
        let request = DeepSearchRequest::new(&format!("按照时间线梳理{}相关信息", keyword));
        let response = self.search(&request).await?;
        Ok(response.as_context())
    }
}
