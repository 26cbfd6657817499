//! In-process fakes for workflow tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use crate::core::llm::{ChatModel, ChatResponse, TokenUsage};
use crate::core::mode::ContextSource;
use crate::core::types::{Event, Graph, GraphNode, Timeline};

/// Answers from a fixed script; `Err` entries become model failures.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn user_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().iter().map(|(_, u)| u.clone()).collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push((system.to_string(), user.to_string()));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(ChatResponse {
                content,
                model: "scripted".to_string(),
                usage: TokenUsage::default(),
            }),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("script exhausted")),
        }
    }
}

pub struct StaticSource {
    pub answer: Result<Option<String>, String>,
    pub calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(answer: Result<Option<String>, String>) -> Arc<Self> {
        Arc::new(Self { answer, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ContextSource for StaticSource {
    fn label(&self) -> &str {
        "static"
    }

    async fn gather(&self, _keyword: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(|e| anyhow!(e))
    }
}

pub fn timeline_json(keyword: &str, events: usize) -> String {
    let timeline = Timeline {
        keyword: keyword.to_string(),
        events: (1..=events)
            .map(|i| Event {
                id: i.to_string(),
                title: format!("event {}", i),
                ..Default::default()
            })
            .collect(),
    };
    serde_json::to_string(&timeline).unwrap()
}

pub fn graph_json(keyword: &str, nodes: usize) -> String {
    let graph = Graph {
        keyword: keyword.to_string(),
        nodes: (1..=nodes)
            .map(|i| GraphNode {
                id: format!("n{}", i),
                name: format!("node {}", i),
                category: "事件".to_string(),
            })
            .collect(),
        links: Vec::new(),
    };
    serde_json::to_string(&graph).unwrap()
}
