//! Quest graphs: node/link documents authored in the level editor.
//!
//! A walk starts at the `Start` node and follows one link at a time. It only stops to
//! hand control back to the dialogue engine (lines to show, a choice to make) or when
//! the path ends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::condition::ConditionEvaluator;
use super::engine::{DialogueVars, SpokenLine};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestGraph {
    #[serde(default)]
    pub nodes: Vec<QuestNode>,
    #[serde(default)]
    pub links: Vec<QuestLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestNode {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LinkRepr")]
pub struct QuestLink {
    pub origin_id: u64,
    pub origin_slot: usize,
    pub target_id: u64,
    pub target_slot: usize,
}

/// Links arrive either as objects or as litegraph arrays
/// `[id, origin_id, origin_slot, target_id, target_slot, type]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum LinkRepr {
    Object {
        origin_id: u64,
        #[serde(default)]
        origin_slot: usize,
        target_id: u64,
        #[serde(default)]
        target_slot: usize,
    },
    Array(Vec<Value>),
}

impl TryFrom<LinkRepr> for QuestLink {
    type Error = String;

    fn try_from(value: LinkRepr) -> Result<Self, Self::Error> {
        match value {
            LinkRepr::Object { origin_id, origin_slot, target_id, target_slot } => {
                Ok(QuestLink { origin_id, origin_slot, target_id, target_slot })
            }
            LinkRepr::Array(items) => {
                if items.len() < 5 {
                    return Err(format!("link array needs at least 5 entries, got {}", items.len()));
                }
                let field = |i: usize| {
                    items[i].as_u64().ok_or_else(|| format!("link entry {i} is not an unsigned integer"))
                };
                Ok(QuestLink {
                    origin_id: field(1)?,
                    origin_slot: field(2)? as usize,
                    target_id: field(3)?,
                    target_slot: field(4)? as usize,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestNodeKind {
    Start,
    Say,
    Choice,
    Check,
    Give,
    End,
}

impl QuestNodeKind {
    /// Matches `"Say"`, `"say"` and namespaced tags such as `"quest/say"`.
    pub fn parse(tag: &str) -> Option<Self> {
        let short = tag.rsplit('/').next().unwrap_or(tag).trim();
        match short.to_ascii_lowercase().as_str() {
            "start" => Some(QuestNodeKind::Start),
            "say" | "dialogue" => Some(QuestNodeKind::Say),
            "choice" => Some(QuestNodeKind::Choice),
            "check" => Some(QuestNodeKind::Check),
            "give" | "reward" => Some(QuestNodeKind::Give),
            "end" => Some(QuestNodeKind::End),
            _ => None,
        }
    }
}

impl QuestNode {
    pub fn node_kind(&self) -> Option<QuestNodeKind> {
        QuestNodeKind::parse(&self.kind)
    }

    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn f64_property(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }

    pub fn choice_options(&self) -> Vec<String> {
        match self.properties.get("options") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl QuestGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: u64) -> Option<&QuestNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn start_node(&self) -> Option<&QuestNode> {
        let mut starts = self.nodes.iter().filter(|node| node.node_kind() == Some(QuestNodeKind::Start));
        let first = starts.next()?;
        if starts.next().is_some() {
            warn!(node = first.id, "quest graph has several Start nodes; using the first");
        }
        Some(first)
    }

    /// Target of the first link leaving `slot` of node `id`.
    pub fn successor(&self, id: u64, slot: usize) -> Option<u64> {
        self.links.iter().find(|link| link.origin_id == id && link.origin_slot == slot).map(|link| link.target_id)
    }

    /// Structural problems worth reporting before the graph ever runs.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.nodes.is_empty() {
            return issues;
        }
        if self.start_node().is_none() {
            issues.push("no Start node".to_string());
        }
        for node in &self.nodes {
            if node.node_kind().is_none() {
                issues.push(format!("node {} has unknown type '{}'", node.id, node.kind));
            }
        }
        for link in &self.links {
            if self.node(link.origin_id).is_none() || self.node(link.target_id).is_none() {
                issues.push(format!("dangling link {} -> {}", link.origin_id, link.target_id));
            }
        }
        issues
    }
}

/// Where a walk handed control back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WalkStop {
    /// Consecutive Say nodes folded into one dialogue; `resume` is the first node after them.
    Say { lines: Vec<SpokenLine>, resume: Option<u64> },
    Choice { node: u64, options: Vec<String> },
    Finished,
    Halted,
}

pub(crate) struct QuestWalker<'a> {
    pub graph: &'a QuestGraph,
    pub vars: &'a mut DialogueVars,
    pub conditions: &'a ConditionEvaluator,
    pub visited: &'a mut Vec<u64>,
    pub rewards: &'a mut Vec<(String, i64)>,
}

impl QuestWalker<'_> {
    pub(crate) fn walk_from(&mut self, from: u64) -> WalkStop {
        let budget = self.graph.nodes.len().saturating_mul(4).max(16);
        let mut current = from;
        for _ in 0..budget {
            let Some(node) = self.graph.node(current) else {
                warn!(node = current, "quest link points at a missing node; stopping");
                return WalkStop::Halted;
            };
            let Some(kind) = node.node_kind() else {
                warn!(node = node.id, kind = %node.kind, "unknown quest node type; stopping");
                return WalkStop::Halted;
            };
            self.visited.push(node.id);
            let next = match kind {
                QuestNodeKind::Start => self.graph.successor(node.id, 0),
                QuestNodeKind::Say => return self.collect_lines(node),
                QuestNodeKind::Choice => {
                    return WalkStop::Choice { node: node.id, options: node.choice_options() };
                }
                QuestNodeKind::Check => {
                    let passed = self.conditions.check_node(node, self.vars);
                    debug!(node = node.id, passed, "quest check");
                    self.graph.successor(node.id, if passed { 0 } else { 1 })
                }
                QuestNodeKind::Give => {
                    if let Some(item) = node.str_property("item") {
                        let amount = node.f64_property("amount").map(|a| a as i64).unwrap_or(1);
                        self.vars.add_item(item, amount);
                        self.rewards.push((item.to_string(), amount));
                    } else {
                        warn!(node = node.id, "Give node without an item");
                    }
                    self.graph.successor(node.id, 0)
                }
                QuestNodeKind::End => return WalkStop::Finished,
            };
            match next {
                Some(id) => current = id,
                None => return WalkStop::Finished,
            }
        }
        warn!(start = from, "quest walk exceeded its step budget; the graph probably loops");
        WalkStop::Halted
    }

    fn collect_lines(&mut self, first: &QuestNode) -> WalkStop {
        let mut lines = vec![say_line(first)];
        let mut cursor = self.graph.successor(first.id, 0);
        while let Some(id) = cursor {
            let Some(node) = self.graph.node(id) else { break };
            if node.node_kind() != Some(QuestNodeKind::Say) || self.visited.contains(&node.id) {
                break;
            }
            self.visited.push(node.id);
            lines.push(say_line(node));
            cursor = self.graph.successor(node.id, 0);
        }
        WalkStop::Say { lines, resume: cursor }
    }
}

fn say_line(node: &QuestNode) -> SpokenLine {
    SpokenLine {
        speaker: node.str_property("speaker").map(str::to_string),
        text: node.str_property("text").unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_litegraph_and_object_links() {
        let graph: QuestGraph = serde_json::from_str(
            r#"{
                "nodes": [{"id": 1, "type": "quest/Start"}, {"id": 2, "type": "End"}],
                "links": [[7, 1, 0, 2, 0, null], {"origin_id": 2, "target_id": 1}]
            }"#,
        )
        .expect("graph parses");
        assert_eq!(graph.successor(1, 0), Some(2));
        assert_eq!(graph.successor(2, 0), Some(1));
        assert_eq!(graph.start_node().map(|n| n.id), Some(1));
    }

    #[test]
    fn short_link_arrays_are_rejected() {
        let result = serde_json::from_str::<QuestGraph>(r#"{"nodes": [], "links": [[1, 2]]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_reports_missing_start_and_unknown_types() {
        let graph: QuestGraph = serde_json::from_str(
            r#"{"nodes": [{"id": 1, "type": "Teleport"}], "links": [[1, 1, 0, 9, 0]]}"#,
        )
        .expect("graph parses");
        let issues = graph.validate();
        assert!(issues.iter().any(|i| i.contains("no Start")));
        assert!(issues.iter().any(|i| i.contains("unknown type")));
        assert!(issues.iter().any(|i| i.contains("dangling")));
    }
}
