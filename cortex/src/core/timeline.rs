use anyhow::Result;
use crate::core::caller::LlmCaller;
use crate::core::prompts;
use crate::core::refine::{RefinePolicy, RefineSpec, Refinement};
use crate::core::stream::{EventSink, StreamEvent};
use crate::core::types::Timeline;

const STAGE: &str = "时间链生成";

/// Grounding material gathered before generation, with the name of the
/// source it came from.
#[derive(Debug, Clone, Copy)]
pub struct Grounding<'a> {
    pub source: &'a str,
    pub text: &'a str,
}

pub struct TimelineWorkflow {
    caller: LlmCaller,
    refiner: RefineSpec,
}

impl TimelineWorkflow {
    pub fn new(caller: LlmCaller) -> Self {
        Self::with_policy(caller, RefinePolicy::TIMELINE)
    }

    pub fn with_policy(caller: LlmCaller, policy: RefinePolicy) -> Self {
        Self {
            caller,
            refiner: RefineSpec {
                policy,
                system_prompt: prompts::TIMELINE_REFINEMENT_SYSTEM_PROMPT,
                user_prompt: prompts::timeline_refinement_user_prompt,
                unit: "events",
                stage: "时间链反思优化",
            },
        }
    }

    /// Initial generation followed by the refine loop. Fails only when the
    /// initial call fails or the sink disconnects.
    pub async fn generate(
        &self,
        keyword: &str,
        grounding: Option<Grounding<'_>>,
        sink: &dyn EventSink,
    ) -> Result<Timeline> {
        log::info!(
            "Generating timeline for '{}' ({})",
            keyword,
            grounding.map(|g| g.source).unwrap_or("ungrounded")
        );
        sink.send(StreamEvent::thinking(
            "总览",
            format!(
                "开始为「{}」生成时间链：初始生成 1 次，随后最多 {} 轮反思优化",
                keyword, self.refiner.policy.max_rounds
            ),
        ))
        .await?;

        let user = match grounding {
            Some(g) => prompts::grounded_timeline_user_prompt(keyword, g.source, g.text),
            None => prompts::timeline_user_prompt(keyword),
        };
        let mut timeline: Timeline = self
            .caller
            .call_json(prompts::TIMELINE_GENERATION_SYSTEM_PROMPT, &user, STAGE, sink)
            .await?;
        timeline.normalize(keyword);
        log::info!("Initial timeline for '{}' has {} events", keyword, timeline.events.len());
        sink.send(StreamEvent::thinking(
            STAGE,
            format!("初始时间链生成完成，共 {} 个事件", timeline.events.len()),
        ))
        .await?;

        let timeline = self.refiner.run(&self.caller, keyword, timeline, sink).await?;

        sink.send(StreamEvent::result("最终结果", serde_json::to_value(&timeline)?)).await?;
        sink.send(StreamEvent::done(
            "最终结果",
            format!("时间链生成完成，共 {} 个事件", timeline.events.len()),
        ))
        .await?;
        Ok(timeline)
    }

    /// One critique pass. A candidate below the acceptance threshold is
    /// reported as `Kept`.
    pub async fn refine(
        &self,
        keyword: &str,
        timeline: &Timeline,
        sink: &dyn EventSink,
    ) -> Result<Refinement<Timeline>> {
        self.refiner.refine_once(&self.caller, keyword, timeline, 1, sink).await
    }
}
