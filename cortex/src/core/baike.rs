use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::core::config::BaiduConfig;
use crate::core::mode::ContextSource;
use crate::core::types::null_as_default;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LemmaLookup {
    Title,
    Id,
}

impl LemmaLookup {
    fn as_param(self) -> &'static str {
        match self {
            LemmaLookup::Title => "lemmaTitle",
            LemmaLookup::Id => "lemmaId",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BaikeRelation {
    #[serde(deserialize_with = "null_as_default")]
    pub lemma_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub lemma_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub relation_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub square_pic_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BaikeResult {
    #[serde(deserialize_with = "null_as_default")]
    pub lemma_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub lemma_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub lemma_desc: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub abstract_plain: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pic_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub relations: Vec<BaikeRelation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BaikeResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub request_id: String,
    pub result: Option<BaikeResult>,
}

impl BaikeResult {
    pub fn as_context(&self) -> String {
        let mut text = format!(
            "词条标题: {}\n摘要: {}\n描述: {}",
            self.lemma_title, self.summary, self.lemma_desc
        );
        if !self.abstract_plain.is_empty() && self.abstract_plain != self.summary {
            text.push_str(&format!("\n简介: {}", self.abstract_plain));
        }
        text
    }
}

/// Baidu Baike lemma lookup.
pub struct BaikeClient {
    client: Client,
    api_key: String,
    url: String,
}

impl BaikeClient {
    pub fn new(config: &BaiduConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: config.baike_api_key.clone(),
            url: config.baike_url.clone(),
        }
    }

    pub async fn search(&self, keyword: &str) -> Result<BaikeResponse> {
        self.lookup(LemmaLookup::Title, keyword).await
    }

    pub async fn search_by_lemma_id(&self, lemma_id: &str) -> Result<BaikeResponse> {
        self.lookup(LemmaLookup::Id, lemma_id).await
    }

    async fn lookup(&self, by: LemmaLookup, key: &str) -> Result<BaikeResponse> {
        if self.api_key.is_empty() {
            return Err(anyhow!("Baidu Baike API key is not configured"));
        }

        log::info!("Baike lookup ({}): {}", by.as_param(), key);
        let res = self.client.get(&self.url)
            .query(&[("search_type", by.as_param()), ("search_key", key)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("Baike API Error {}: {}", status, text));
        }

        let body = res.text().await?;
        log::debug!("Baike response: {}", body);
        let response: BaikeResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse Baike response: {}", e))?;
        Ok(response)
    }
}

#[async_trait]
impl ContextSource for BaikeClient {
    fn label(&self) -> &str {
        "Baidu Baike"
    }

    async fn gather(&self, keyword: &str) -> Result<Option<String>> {
        let response = self.search(keyword).await?;
        Ok(response.result.map(|r| r.as_context()))
    }
}
