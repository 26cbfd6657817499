use anyhow::Result;
use crate::core::caller::LlmCaller;
use crate::core::prompts;
use crate::core::refine::{RefinePolicy, RefineSpec, Refinement};
use crate::core::stream::{EventSink, StreamEvent};
use crate::core::types::{Graph, Timeline};

const STAGE: &str = "知识图谱生成";

/// Builds a knowledge graph out of a finished timeline.
pub struct GraphWorkflow {
    caller: LlmCaller,
    refiner: RefineSpec,
}

impl GraphWorkflow {
    pub fn new(caller: LlmCaller) -> Self {
        Self {
            caller,
            refiner: RefineSpec {
                policy: RefinePolicy::GRAPH,
                system_prompt: prompts::GRAPH_REFINEMENT_SYSTEM_PROMPT,
                user_prompt: prompts::graph_refinement_user_prompt,
                unit: "nodes",
                stage: "知识图谱反思优化",
            },
        }
    }

    pub async fn generate(&self, timeline: &Timeline, sink: &dyn EventSink) -> Result<Graph> {
        let keyword = timeline.keyword.as_str();
        log::info!("Generating graph for '{}' from {} events", keyword, timeline.events.len());
        sink.send(StreamEvent::thinking(
            "总览",
            format!(
                "开始根据 {} 个事件构建知识图谱，最多 {} 轮反思优化",
                timeline.events.len(),
                self.refiner.policy.max_rounds
            ),
        ))
        .await?;

        let timeline_json = serde_json::to_string(timeline)?;
        let mut graph: Graph = self
            .caller
            .call_json(
                prompts::GRAPH_GENERATION_SYSTEM_PROMPT,
                &prompts::graph_user_prompt(&timeline_json),
                STAGE,
                sink,
            )
            .await?;
        graph.normalize(keyword);
        log::info!(
            "Initial graph for '{}' has {} nodes and {} links",
            keyword,
            graph.nodes.len(),
            graph.links.len()
        );

        let graph = self.refiner.run(&self.caller, keyword, graph, sink).await?;

        sink.send(StreamEvent::result("最终结果", serde_json::to_value(&graph)?)).await?;
        sink.send(StreamEvent::done(
            "最终结果",
            format!("知识图谱生成完成，共 {} 个节点、{} 条关系", graph.nodes.len(), graph.links.len()),
        ))
        .await?;
        Ok(graph)
    }

    pub async fn refine(&self, keyword: &str, graph: &Graph, sink: &dyn EventSink) -> Result<Refinement<Graph>> {
        self.refiner.refine_once(&self.caller, keyword, graph, 1, sink).await
    }
}
