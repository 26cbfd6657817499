use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use crate::core::caller::LlmCaller;
use crate::core::prompts;
use crate::core::refine::RefinePolicy;
use crate::core::stream::{is_disconnected, EventSink, StreamEvent};
use crate::core::timeline::{Grounding, TimelineWorkflow};
use crate::core::types::Timeline;

/// How much grounding work happens before the timeline is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Encyclopedia context, single generation pass.
    #[default]
    Fast,
    /// Clarified keyword, web search context, refine loop.
    DeepSearch,
    /// Clarified keyword, Baidu AI search context, refine loop.
    Balanced,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::DeepSearch => "deepsearch",
            Mode::Balanced => "balanced",
        }
    }

    /// Lenient parse: anything unrecognised is `Fast`.
    pub fn parse(value: &str) -> Mode {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "deepsearch" | "deep_search" | "deep-search" => Ok(Mode::DeepSearch),
            "balanced" => Ok(Mode::Balanced),
            other => Err(anyhow::anyhow!("unknown mode: {}", other)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can fetch background text about a keyword.
#[async_trait]
pub trait ContextSource: Send + Sync {
    fn label(&self) -> &str;

    /// `Ok(None)` means the source had nothing useful.
    async fn gather(&self, keyword: &str) -> Result<Option<String>>;
}

#[derive(Clone, Default)]
pub struct ContextSources {
    pub baike: Option<Arc<dyn ContextSource>>,
    pub web_search: Option<Arc<dyn ContextSource>>,
    pub deep_search: Option<Arc<dyn ContextSource>>,
}

pub struct ModeWorkflow {
    caller: LlmCaller,
    sources: ContextSources,
    refined: TimelineWorkflow,
    single_pass: TimelineWorkflow,
}

impl ModeWorkflow {
    pub fn new(caller: LlmCaller, sources: ContextSources) -> Self {
        Self {
            refined: TimelineWorkflow::new(caller.clone()),
            single_pass: TimelineWorkflow::with_policy(caller.clone(), RefinePolicy::TIMELINE.without_rounds()),
            caller,
            sources,
        }
    }

    /// Rewrite a keyword into a sharper search phrase. Never fails; the
    /// original keyword comes back when the model does not help.
    pub async fn clarify_keyword(&self, keyword: &str, sink: &dyn EventSink) -> Result<String> {
        let answer = self
            .caller
            .call(
                prompts::KEYWORD_CLARIFICATION_SYSTEM_PROMPT,
                &prompts::keyword_clarification_user_prompt(keyword),
                "关键词澄清",
                sink,
            )
            .await;

        let clarified = match answer {
            Ok(raw) => clean_keyword(&raw),
            Err(e) if is_disconnected(&e) => return Err(e),
            Err(e) => {
                log::warn!("Keyword clarification failed for '{}': {:#}", keyword, e);
                String::new()
            }
        };

        if clarified.is_empty() {
            return Ok(keyword.to_string());
        }
        log::info!("Clarified keyword '{}' -> '{}'", keyword, clarified);
        Ok(clarified)
    }

    pub async fn generate(&self, keyword: &str, mode: Mode, sink: &dyn EventSink) -> Result<Timeline> {
        log::info!("Running {} mode for '{}'", mode, keyword);
        sink.send(StreamEvent::thinking("模式", format!("使用 {} 模式生成时间链", mode))).await?;

        let (keyword, source, workflow) = match mode {
            Mode::Fast => (keyword.to_string(), &self.sources.baike, &self.single_pass),
            Mode::DeepSearch => {
                let clarified = self.clarify_keyword(keyword, sink).await?;
                (clarified, &self.sources.web_search, &self.refined)
            }
            Mode::Balanced => {
                let clarified = self.clarify_keyword(keyword, sink).await?;
                (clarified, &self.sources.deep_search, &self.refined)
            }
        };

        let context = match source {
            Some(source) => self.gather(source.as_ref(), &keyword, sink).await?,
            None => {
                sink.send(StreamEvent::thinking("资料检索", "未配置检索服务，直接由模型生成")).await?;
                None
            }
        };

        let grounding = match (source, context.as_deref()) {
            (Some(source), Some(text)) => Some(Grounding { source: source.label(), text }),
            _ => None,
        };
        workflow.generate(&keyword, grounding, sink).await
    }

    async fn gather(&self, source: &dyn ContextSource, keyword: &str, sink: &dyn EventSink) -> Result<Option<String>> {
        let stage = "资料检索";
        sink.send(StreamEvent::thinking(stage, format!("正在通过{}检索「{}」", source.label(), keyword))).await?;

        match source.gather(keyword).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                log::info!("{} returned {} chars for '{}'", source.label(), text.chars().count(), keyword);
                sink.send(StreamEvent::thinking(
                    stage,
                    format!("{}检索完成，获得 {} 字资料", source.label(), text.chars().count()),
                ))
                .await?;
                Ok(Some(text))
            }
            Ok(_) => {
                log::info!("{} had nothing for '{}'", source.label(), keyword);
                sink.send(StreamEvent::thinking(stage, format!("{}未找到相关资料，直接由模型生成", source.label())))
                    .await?;
                Ok(None)
            }
            Err(e) => {
                log::warn!("{} lookup failed for '{}': {:#}", source.label(), keyword, e);
                sink.send(StreamEvent::thinking(
                    stage,
                    format!("{}检索失败（{}），直接由模型生成", source.label(), e),
                ))
                .await?;
                Ok(None)
            }
        }
    }
}

fn clean_keyword(raw: &str) -> String {
    let text = crate::core::llm::strip_think(raw).trim();
    let quotes: &[char] = &['"', '\'', '“', '”', '‘', '’', '「', '」', '『', '』', '《', '》'];
    text.trim_matches(|c: char| quotes.contains(&c) || c.is_whitespace()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::NoopSink;
    use crate::core::testing::{timeline_json, ScriptedModel, StaticSource};
    use std::sync::atomic::Ordering;

    #[test]
    fn parses_modes_leniently() {
        assert_eq!(Mode::parse("DeepSearch"), Mode::DeepSearch);
        assert_eq!(Mode::parse(" BALANCED "), Mode::Balanced);
        assert_eq!(Mode::parse(""), Mode::Fast);
        assert_eq!(Mode::parse("turbo"), Mode::Fast);
        assert!("turbo".parse::<Mode>().is_err());
        assert_eq!(Mode::DeepSearch.to_string(), "deepsearch");
    }

    #[test]
    fn strips_quotes_from_clarified_keyword() {
        assert_eq!(clean_keyword("  「俄乌冲突」\n"), "俄乌冲突");
        assert_eq!(clean_keyword("\"油价\""), "油价");
        assert_eq!(clean_keyword("<think>嗯</think>  "), "");
    }

    #[tokio::test]
    async fn clarify_falls_back_to_original() {
        let model = ScriptedModel::new(vec![Err("down".to_string()), Ok("  ".to_string()), Ok("“新词”".to_string())]);
        let wf = ModeWorkflow::new(LlmCaller::new(model), ContextSources::default());

        assert_eq!(wf.clarify_keyword("原词", &NoopSink).await.unwrap(), "原词");
        assert_eq!(wf.clarify_keyword("原词", &NoopSink).await.unwrap(), "原词");
        assert_eq!(wf.clarify_keyword("原词", &NoopSink).await.unwrap(), "新词");
    }

    #[tokio::test]
    async fn fast_mode_uses_baike_and_skips_refinement() {
        let model = ScriptedModel::new(vec![Ok(timeline_json("k", 6)), Ok(timeline_json("k", 40))]);
        let baike = StaticSource::new(Ok(Some("百科正文".to_string())));
        let sources = ContextSources { baike: Some(baike.clone()), ..Default::default() };
        let wf = ModeWorkflow::new(LlmCaller::new(model.clone()), sources);

        let t = wf.generate("k", Mode::Fast, &NoopSink).await.unwrap();
        assert_eq!(t.events.len(), 6);
        assert_eq!(model.calls(), 1);
        assert_eq!(baike.calls.load(Ordering::SeqCst), 1);
        assert!(model.user_prompts()[0].contains("百科正文"));
    }

    #[tokio::test]
    async fn balanced_mode_clarifies_then_grounds_on_deep_search() {
        let model = ScriptedModel::new(vec![
            Ok("澄清后".to_string()),
            Ok(timeline_json("", 8)),
            Ok(timeline_json("", 20)),
        ]);
        let deep = StaticSource::new(Ok(Some("搜索摘要".to_string())));
        let baike = StaticSource::new(Ok(Some("unused".to_string())));
        let sources = ContextSources {
            baike: Some(baike.clone()),
            deep_search: Some(deep.clone()),
            ..Default::default()
        };
        let wf = ModeWorkflow::new(LlmCaller::new(model.clone()), sources);

        let t = wf.generate("原词", Mode::Balanced, &NoopSink).await.unwrap();
        assert_eq!(t.keyword, "澄清后");
        assert_eq!(t.events.len(), 20);
        assert_eq!(deep.calls.load(Ordering::SeqCst), 1);
        assert_eq!(baike.calls.load(Ordering::SeqCst), 0);
        let prompts = model.user_prompts();
        assert!(prompts[1].contains("搜索摘要"));
        assert!(prompts[1].contains("澄清后"));
    }

    #[tokio::test]
    async fn deep_search_mode_grounds_on_web_search() {
        let model = ScriptedModel::new(vec![
            Ok("关键词".to_string()),
            Ok(timeline_json("", 16)),
        ]);
        let web = StaticSource::new(Ok(Some("网页资料".to_string())));
        let deep = StaticSource::new(Ok(Some("unused".to_string())));
        let baike = StaticSource::new(Ok(Some("unused".to_string())));
        let sources = ContextSources {
            baike: Some(baike.clone()),
            web_search: Some(web.clone()),
            deep_search: Some(deep.clone()),
        };
        let wf = ModeWorkflow::new(LlmCaller::new(model.clone()), sources);

        let t = wf.generate("k", Mode::DeepSearch, &NoopSink).await.unwrap();
        assert_eq!(t.keyword, "关键词");
        assert_eq!(t.events.len(), 16);
        assert_eq!(web.calls.load(Ordering::SeqCst), 1);
        assert_eq!(deep.calls.load(Ordering::SeqCst), 0);
        assert_eq!(baike.calls.load(Ordering::SeqCst), 0);
        let prompts = model.user_prompts();
        assert!(prompts[1].contains("网页资料"));
        assert!(prompts[1].contains("关键词"));
    }

    #[tokio::test]
    async fn failed_context_falls_back_to_ungrounded() {
        let model = ScriptedModel::new(vec![
            Ok("关键词".to_string()),
            Ok(timeline_json("", 16)),
        ]);
        let web = StaticSource::new(Err("quota".to_string()));
        let sources = ContextSources { web_search: Some(web), ..Default::default() };
        let wf = ModeWorkflow::new(LlmCaller::new(model.clone()), sources);

        let t = wf.generate("k", Mode::DeepSearch, &NoopSink).await.unwrap();
        assert_eq!(t.events.len(), 16);
        assert_eq!(model.user_prompts()[1], prompts::timeline_user_prompt("关键词"));
    }
}
