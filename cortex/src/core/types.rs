use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Models are asked for string ids but regularly answer with numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Treat an explicit `null` like a missing key.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, alias = "ID", alias = "Id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, alias = "Title", deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, alias = "Time", deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(default, alias = "Location", deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, alias = "People", deserialize_with = "null_as_default")]
    pub people: Vec<String>,
    #[serde(default, alias = "Summary", deserialize_with = "null_as_default")]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default, alias = "Keyword", deserialize_with = "null_as_default")]
    pub keyword: String,
    #[serde(default, alias = "Events", deserialize_with = "null_as_default")]
    pub events: Vec<Event>,
}

impl Timeline {
    pub fn normalize(&mut self, keyword: &str) {
        if self.keyword.trim().is_empty() {
            self.keyword = keyword.to_string();
        }
        for (i, event) in self.events.iter_mut().enumerate() {
            if event.id.trim().is_empty() {
                event.id = (i + 1).to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(default, alias = "ID", alias = "Id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, alias = "Name", deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, alias = "Category", deserialize_with = "null_as_default")]
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    #[serde(default, alias = "Source", deserialize_with = "string_or_number")]
    pub source: String,
    #[serde(default, alias = "Target", deserialize_with = "string_or_number")]
    pub target: String,
    #[serde(default, alias = "Relation", deserialize_with = "null_as_default")]
    pub relation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default, alias = "Keyword", deserialize_with = "null_as_default")]
    pub keyword: String,
    #[serde(default, alias = "Nodes", deserialize_with = "null_as_default")]
    pub nodes: Vec<GraphNode>,
    #[serde(default, alias = "Links", alias = "edges", deserialize_with = "null_as_default")]
    pub links: Vec<GraphLink>,
}

impl Graph {
    /// Fill the keyword and drop links pointing at unknown nodes.
    pub fn normalize(&mut self, keyword: &str) {
        if self.keyword.trim().is_empty() {
            self.keyword = keyword.to_string();
        }
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        let before = self.links.len();
        self.links
            .retain(|l| ids.contains(l.source.as_str()) && ids.contains(l.target.as_str()));
        let dropped = before - self.links.len();
        if dropped > 0 {
            log::warn!("Dropped {} graph links with unknown endpoints", dropped);
        }
    }
}

pub fn mock_timeline(keyword: &str) -> Timeline {
    let event = |id: &str, title: String, time: &str, location: &str, people: &[&str], summary: String| Event {
        id: id.to_string(),
        title,
        time: time.to_string(),
        location: location.to_string(),
        people: people.iter().map(|p| p.to_string()).collect(),
        summary,
    };

    Timeline {
        keyword: keyword.to_string(),
        events: vec![
            event(
                "1",
                format!("{} 相关新闻一：事件起源", keyword),
                "2023-01-10",
                "北京",
                &["张三", "李四"],
                format!("围绕 {} 的最初报道和背景信息。", keyword),
            ),
            event(
                "2",
                format!("{} 相关新闻二：事态发展", keyword),
                "2023-03-05",
                "上海",
                &["王五"],
                format!("{} 相关事件在区域内的进一步发酵与反应。", keyword),
            ),
            event(
                "3",
                format!("{} 相关新闻三：官方回应", keyword),
                "2023-05-20",
                "广州",
                &["官方发言人"],
                format!("有关部门针对 {} 发布官方说明与政策。", keyword),
            ),
            event(
                "4",
                format!("{} 相关新闻四：后续影响", keyword),
                "2023-08-01",
                "深圳",
                &["媒体", "专家"],
                format!("{} 对社会、产业或公众情绪产生的长期影响分析。", keyword),
            ),
        ],
    }
}

pub fn mock_graph(keyword: &str) -> Graph {
    let node = |id: &str, name: String, category: &str| GraphNode {
        id: id.to_string(),
        name,
        category: category.to_string(),
    };
    let link = |source: &str, target: &str, relation: &str| GraphLink {
        source: source.to_string(),
        target: target.to_string(),
        relation: relation.to_string(),
    };

    Graph {
        keyword: keyword.to_string(),
        nodes: vec![
            node("e1", format!("{} 核心事件", keyword), "事件"),
            node("e2", format!("{} 延伸事件", keyword), "事件"),
            node("p1", "张三".to_string(), "人物"),
            node("p2", "李四".to_string(), "人物"),
            node("l1", "北京".to_string(), "地点"),
            node("l2", "上海".to_string(), "地点"),
            node("t1", format!("{} 政策", keyword), "主题"),
        ],
        links: vec![
            link("e1", "p1", "相关人物"),
            link("e1", "l1", "发生地点"),
            link("e1", "t1", "涉及主题"),
            link("e2", "p2", "相关人物"),
            link("e2", "l2", "发生地点"),
            link("e2", "t1", "政策影响"),
            link("e1", "e2", "事件演化"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_accepts_numeric_ids_and_capitalised_keys() {
        let raw = r#"{"Keyword":"芯片","Events":[{"ID":3,"Title":"t","People":["a"]},{"id":"x"}]}"#;
        let timeline: Timeline = serde_json::from_str(raw).unwrap();
        assert_eq!(timeline.keyword, "芯片");
        assert_eq!(timeline.events[0].id, "3");
        assert_eq!(timeline.events[0].people, vec!["a"]);
        assert_eq!(timeline.events[1].id, "x");
        assert_eq!(timeline.events[1].summary, "");
    }

    #[test]
    fn normalize_fills_keyword_and_ids() {
        let mut timeline = Timeline {
            keyword: String::new(),
            events: vec![Event::default(), Event { id: "b".into(), ..Default::default() }],
        };
        timeline.normalize("油价");
        assert_eq!(timeline.keyword, "油价");
        assert_eq!(timeline.events[0].id, "1");
        assert_eq!(timeline.events[1].id, "b");
    }

    #[test]
    fn graph_normalize_drops_dangling_links() {
        let mut graph = mock_graph("k");
        graph.links.push(GraphLink {
            source: "e1".into(),
            target: "missing".into(),
            relation: "?".into(),
        });
        graph.keyword.clear();
        graph.normalize("k2");
        assert_eq!(graph.keyword, "k2");
        assert_eq!(graph.links.len(), 7);
    }

    #[test]
    fn mocks_are_templated_with_keyword() {
        let timeline = mock_timeline("台风");
        assert_eq!(timeline.events.len(), 4);
        assert!(timeline.events.iter().all(|e| e.title.contains("台风")));

        let graph = mock_graph("台风");
        assert_eq!(graph.nodes.len(), 7);
        assert_eq!(graph.links.len(), 7);
    }

    #[test]
    fn explicit_nulls_read_as_empty() {
        let timeline: Timeline = serde_json::from_str(
            r#"{"keyword":null,"events":[{"id":1,"title":"t","time":null,"location":null,"people":null,"summary":null}]}"#,
        )
        .unwrap();
        let event = &timeline.events[0];
        assert_eq!(timeline.keyword, "");
        assert_eq!(event.id, "1");
        assert_eq!(event.location, "");
        assert!(event.people.is_empty());

        let graph: Graph = serde_json::from_str(
            r#"{"keyword":"k","nodes":[{"id":"a","name":null,"category":null}],"links":null}"#,
        )
        .unwrap();
        assert_eq!(graph.nodes[0].category, "");
        assert!(graph.links.is_empty());
    }

    #[test]
    fn nulls_survive_json_extraction() {
        let raw = r#"```json
{"keyword":"k","events":[{"id":"1","title":"a","location":null,"people":null}]}
```"#;
        let timeline: Timeline = crate::core::caller::extract_json(raw).unwrap();
        assert_eq!(timeline.events.len(), 1);
    }
}
