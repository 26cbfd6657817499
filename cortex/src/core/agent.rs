use anyhow::Result;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use crate::core::ark::ArkClient;
use crate::core::baike::BaikeClient;
use crate::core::caller::LlmCaller;
use crate::core::config::{CacheConfig, Config};
use crate::core::deepsearch::DeepSearchClient;
use crate::core::graph::GraphWorkflow;
use crate::core::llm::{ChatModel, LlmClient};
use crate::core::mode::{ContextSources, Mode, ModeWorkflow};
use crate::core::stream::{is_disconnected, EventSink, NoopSink, StreamEvent};
use crate::core::types::{mock_graph, mock_timeline, Graph, Timeline};

/// Entry point for the HTTP layer and CLI. Generation never fails from the
/// caller's point of view: errors degrade to the mock results.
pub struct NewsAgent {
    modes: ModeWorkflow,
    graphs: GraphWorkflow,
    timelines: Option<Cache<String, Timeline>>,
    graph_cache: Option<Cache<String, Graph>>,
}

fn build_cache<V: Clone + Send + Sync + 'static>(config: &CacheConfig) -> Option<Cache<String, V>> {
    if config.ttl_secs == 0 {
        return None;
    }
    Some(
        Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build(),
    )
}

impl NewsAgent {
    pub fn new(model: Arc<dyn ChatModel>, sources: ContextSources, cache: &CacheConfig) -> Self {
        let caller = LlmCaller::new(model);
        Self {
            modes: ModeWorkflow::new(caller.clone(), sources),
            graphs: GraphWorkflow::new(caller),
            timelines: build_cache(cache),
            graph_cache: build_cache(cache),
        }
    }

    /// DeepSeek drives generation; each retrieval service is wired in only
    /// when its key is present.
    pub fn from_config(config: &Config) -> Self {
        let model: Arc<dyn ChatModel> = Arc::new(LlmClient::new(config.deepseek.clone()));

        let mut sources = ContextSources::default();
        if !config.baidu.baike_api_key.is_empty() {
            sources.baike = Some(Arc::new(BaikeClient::new(&config.baidu)));
        }
        if config.ark_enabled() {
            sources.web_search = Some(Arc::new(ArkClient::new(config.ark.clone())));
        }
        if !config.baidu.deepsearch_api_key.is_empty() {
            sources.deep_search = Some(Arc::new(DeepSearchClient::new(&config.baidu)));
        }
        log::info!(
            "Agent ready (baike: {}, web search: {}, deep search: {}, cache ttl: {}s)",
            sources.baike.is_some(),
            sources.web_search.is_some(),
            sources.deep_search.is_some(),
            config.cache.ttl_secs
        );

        Self::new(model, sources, &config.cache)
    }

    pub async fn clarify_keyword(&self, keyword: &str) -> String {
        self.modes
            .clarify_keyword(keyword, &NoopSink)
            .await
            .unwrap_or_else(|_| keyword.to_string())
    }

    pub async fn generate_timeline(&self, keyword: &str, mode: Mode) -> Timeline {
        match self.stream_timeline(keyword, mode, &NoopSink).await {
            Ok(timeline) => timeline,
            Err(e) => {
                log::error!("Timeline pipeline for '{}' aborted: {:#}", keyword, e);
                mock_timeline(keyword)
            }
        }
    }

    /// Runs the pipeline with progress mirrored to `sink`. Workflow failures
    /// are reported as an `error` event followed by the mock result; only a
    /// sink failure comes back as `Err`.
    pub async fn stream_timeline(&self, keyword: &str, mode: Mode, sink: &dyn EventSink) -> Result<Timeline> {
        let key = format!("{}:{}", mode, keyword);

        if let Some(cache) = &self.timelines {
            if let Some(timeline) = cache.get(&key).await {
                log::info!("Timeline cache hit for {}", key);
                sink.send(StreamEvent::thinking("缓存", "命中缓存，直接返回已有时间链")).await?;
                sink.send(StreamEvent::result("最终结果", serde_json::to_value(&timeline)?)).await?;
                sink.send(StreamEvent::done("最终结果", "时间链生成完成")).await?;
                return Ok(timeline);
            }
        }

        match self.modes.generate(keyword, mode, sink).await {
            Ok(timeline) => {
                if let Some(cache) = &self.timelines {
                    cache.insert(key, timeline.clone()).await;
                }
                Ok(timeline)
            }
            Err(e) if is_disconnected(&e) => Err(e),
            Err(e) => {
                log::error!("Timeline generation for '{}' failed, serving mock: {:#}", keyword, e);
                let mock = mock_timeline(keyword);
                sink.send(StreamEvent::error("最终结果", format!("时间链生成失败: {}", e))).await?;
                sink.send(StreamEvent::result("最终结果", serde_json::to_value(&mock)?)).await?;
                sink.send(StreamEvent::done("最终结果", "已返回示例数据")).await?;
                Ok(mock)
            }
        }
    }

    pub async fn generate_graph(&self, timeline: &Timeline) -> Graph {
        let key = format!("graph:{}:{}", timeline.keyword, timeline.events.len());

        if let Some(cache) = &self.graph_cache {
            if let Some(graph) = cache.get(&key).await {
                log::info!("Graph cache hit for {}", key);
                return graph;
            }
        }

        match self.graphs.generate(timeline, &NoopSink).await {
            Ok(graph) => {
                if *timeline == mock_timeline(&timeline.keyword) {
                    log::info!("Graph for '{}' built from the mock timeline, not caching", timeline.keyword);
                } else if let Some(cache) = &self.graph_cache {
                    cache.insert(key, graph.clone()).await;
                }
                graph
            }
            Err(e) => {
                log::error!("Graph generation for '{}' failed, serving mock: {:#}", timeline.keyword, e);
                mock_graph(&timeline.keyword)
            }
        }
    }
}
