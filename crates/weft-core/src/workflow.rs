use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// A declarative workflow: typed nodes connected by directed edges.
///
/// Workflows are immutable once handed to the engine; every run reads the
/// same definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: vec![],
            edges: vec![],
        }
    }

    /// Append a node.
    pub fn with_node(mut self, node: WorkflowNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Append an edge.
    pub fn with_edge(mut self, edge: WorkflowEdge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Parse a workflow definition from JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Parse a workflow definition from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| WeftError::Config(e.to_string()))
    }
}

/// A typed unit of work. `data` is opaque to the engine and interpreted only
/// by the handler registered for `node_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: serde_json::Map::new(),
        }
    }

    /// Set a single data field.
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Get a data field.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a data field as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// A directed link from `source` to `target`.
///
/// `branch` optionally ties the edge to one outcome of the source node: when
/// the source reports a `path` output, the edge only fires if the values match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl WorkflowEdge {
    /// Create an unconditional edge.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            branch: None,
        }
    }

    /// Create an edge that only fires on the given branch of its source.
    pub fn on_branch(
        source: impl Into<String>,
        target: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            branch: Some(branch.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_workflow_builder() {
        let wf = Workflow::new("wf", "Demo")
            .with_node(WorkflowNode::new("a", "transform").with_data("input", json!("x")))
            .with_node(WorkflowNode::new("b", "llm"))
            .with_edge(WorkflowEdge::new("a", "b"));

        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.edges.len(), 1);
        assert_eq!(wf.node("a").and_then(|n| n.get_str("input")), Some("x"));
        assert!(wf.node("zzz").is_none());
    }

    #[test]
    fn test_parse_json_definition() {
        let wf = Workflow::from_json_str(
            r#"{
                "id": "wf-1",
                "name": "Greeting",
                "nodes": [
                    {"id": "up", "type": "transform", "data": {"transformation": "toUpperCase", "input": "${inputs.text}"}},
                    {"id": "check", "type": "condition", "data": {"condition": "${outputs.result} == \"HI\""}}
                ],
                "edges": [{"source": "up", "target": "check"}]
            }"#,
        )
        .unwrap();

        assert_eq!(wf.id, "wf-1");
        assert_eq!(wf.nodes[0].node_type, "transform");
        assert_eq!(wf.edges[0].branch, None);
    }

    #[test]
    fn test_parse_toml_definition() {
        let wf = Workflow::from_toml_str(
            r#"
id = "wf-2"
name = "Branching"

[[nodes]]
id = "gate"
type = "condition"
data = { condition = "${inputs.n} > 3" }

[[nodes]]
id = "big"
type = "transform"

[[edges]]
source = "gate"
target = "big"
branch = "true"
"#,
        )
        .unwrap();

        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.edges[0].branch.as_deref(), Some("true"));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let edge = WorkflowEdge::on_branch("a", "b", "false");
        let json = serde_json::to_string(&edge).unwrap();
        let parsed: WorkflowEdge = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, edge);

        let plain = serde_json::to_value(WorkflowEdge::new("a", "b")).unwrap();
        assert!(plain.get("branch").is_none());
    }
}
