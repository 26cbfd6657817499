use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::core::caller::LlmCaller;
use crate::core::stream::{is_disconnected, EventSink, StreamEvent};
use crate::core::types::{Graph, Timeline};

/// A model-produced artifact that can be sized and tidied after parsing.
pub trait Refinable: Serialize + DeserializeOwned + Send + Sync {
    fn size(&self) -> usize;

    fn normalize(&mut self, keyword: &str);
}

impl Refinable for Timeline {
    fn size(&self) -> usize {
        self.events.len()
    }

    fn normalize(&mut self, keyword: &str) {
        Timeline::normalize(self, keyword)
    }
}

impl Refinable for Graph {
    fn size(&self) -> usize {
        self.nodes.len()
    }

    fn normalize(&mut self, keyword: &str) {
        Graph::normalize(self, keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinePolicy {
    pub max_rounds: usize,
    /// Candidates smaller than this are rejected.
    pub min_accept: usize,
    pub target_min: usize,
    pub target_max: usize,
}

impl RefinePolicy {
    pub const TIMELINE: RefinePolicy = RefinePolicy {
        max_rounds: 3,
        min_accept: 5,
        target_min: 15,
        target_max: 100,
    };

    pub const GRAPH: RefinePolicy = RefinePolicy {
        max_rounds: 3,
        min_accept: 10,
        target_min: 20,
        target_max: 100,
    };

    pub fn without_rounds(self) -> Self {
        Self { max_rounds: 0, ..self }
    }

    pub fn in_target(&self, size: usize) -> bool {
        (self.target_min..=self.target_max).contains(&size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Refinement<T> {
    Improved(T),
    /// The candidate was too small; keep the previous version.
    Kept,
}

/// Prompts and thresholds for one kind of artifact.
pub struct RefineSpec {
    pub policy: RefinePolicy,
    pub system_prompt: &'static str,
    pub user_prompt: fn(&str, &str) -> String,
    pub unit: &'static str,
    pub stage: &'static str,
}

impl RefineSpec {
    pub async fn refine_once<T: Refinable>(
        &self,
        caller: &LlmCaller,
        keyword: &str,
        current: &T,
        round: usize,
        sink: &dyn EventSink,
    ) -> Result<Refinement<T>> {
        let current_json = serde_json::to_string(current)?;
        let user = (self.user_prompt)(keyword, &current_json);
        let stage = format!("{}第{}轮", self.stage, round);

        let mut candidate: T = caller.call_json(self.system_prompt, &user, &stage, sink).await?;
        candidate.normalize(keyword);

        if candidate.size() < self.policy.min_accept {
            log::info!(
                "Refined result too small ({} {}), keeping previous ({} {})",
                candidate.size(),
                self.unit,
                current.size(),
                self.unit
            );
            return Ok(Refinement::Kept);
        }
        Ok(Refinement::Improved(candidate))
    }

    /// Run up to `max_rounds` refinements, stopping on the first failure,
    /// rejection or in-target size.
    pub async fn run<T: Refinable>(
        &self,
        caller: &LlmCaller,
        keyword: &str,
        initial: T,
        sink: &dyn EventSink,
    ) -> Result<T> {
        let mut current = initial;

        for round in 1..=self.policy.max_rounds {
            let stage = format!("{}第{}轮", self.stage, round);
            log::info!("Refine round {} starting with {} {}", round, current.size(), self.unit);

            match self.refine_once(caller, keyword, &current, round, sink).await {
                Ok(Refinement::Improved(candidate)) => {
                    current = candidate;
                    log::info!("Refine round {} produced {} {}", round, current.size(), self.unit);
                    sink.send(StreamEvent::thinking(
                        &stage,
                        format!("第 {} 轮反思优化完成，当前数量: {}", round, current.size()),
                    ))
                    .await?;

                    if self.policy.in_target(current.size()) {
                        log::info!("{} {} within target, stopping refinement", current.size(), self.unit);
                        sink.send(StreamEvent::thinking(
                            &stage,
                            format!("数量已满足要求（{}），结束反思循环", current.size()),
                        ))
                        .await?;
                        break;
                    }
                }
                Ok(Refinement::Kept) => {
                    sink.send(StreamEvent::thinking(
                        &stage,
                        format!("第 {} 轮反思结果过少，保留上一版本并停止反思", round),
                    ))
                    .await?;
                    break;
                }
                Err(e) if is_disconnected(&e) => return Err(e),
                Err(e) => {
                    log::warn!("Refine round {} failed: {:#}", round, e);
                    sink.send(StreamEvent::thinking(
                        &stage,
                        format!("第 {} 轮反思优化失败，使用上一版本结果: {}", round, e),
                    ))
                    .await?;
                    break;
                }
            }
        }

        Ok(current)
    }
}
