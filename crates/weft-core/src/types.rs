use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key/value outputs produced by a node or a whole run.
pub type Outputs = serde_json::Map<String, serde_json::Value>;

/// Unique identifier of one workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal state of a node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Completed,
    Failed,
}

/// Result of executing a single node. Written once per node per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub success: bool,
    #[serde(default)]
    pub outputs: Outputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration: u64,
}

impl NodeExecutionResult {
    pub fn completed(
        node_id: impl Into<String>,
        outputs: Outputs,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            success: true,
            outputs,
            error: None,
            start_time,
            end_time,
            duration: millis_between(start_time, end_time),
        }
    }

    pub fn failed(
        node_id: impl Into<String>,
        error: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            success: false,
            outputs: Outputs::new(),
            error: Some(error.into()),
            start_time,
            end_time,
            duration: millis_between(start_time, end_time),
        }
    }

    pub fn status(&self) -> NodeStatus {
        if self.success {
            NodeStatus::Completed
        } else {
            NodeStatus::Failed
        }
    }
}

/// Result of executing an entire workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionResult {
    pub execution_id: ExecutionId,
    pub workflow_id: String,
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: u64,
    #[serde(default)]
    pub outputs: Outputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub node_results: Vec<NodeExecutionResult>,
}

impl WorkflowExecutionResult {
    /// Results of the nodes that failed, in recording order.
    pub fn failed_nodes(&self) -> Vec<&NodeExecutionResult> {
        self.node_results.iter().filter(|r| !r.success).collect()
    }

    /// Result recorded for a node, if it ran.
    pub fn node_result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }
}

pub(crate) fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

/// What a tool backend reports back for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// A single completion request issued by an `llm` node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Provider-specific knobs (temperature, max_tokens, ...), passed through as-is.
    #[serde(default)]
    pub options: Outputs,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub completion: String,
}

/// Lifecycle event broadcast to all subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Run passed validation and is about to dispatch its start nodes.
    RunStarted {
        workflow_id: String,
        execution_id: ExecutionId,
    },
    /// A node's handler is about to be invoked.
    NodeStarted {
        workflow_id: String,
        execution_id: ExecutionId,
        node_id: String,
        node_type: String,
    },
    /// A node finished successfully.
    NodeCompleted {
        workflow_id: String,
        execution_id: ExecutionId,
        node_id: String,
        duration: u64,
    },
    /// A node failed; its downstream branch stops.
    NodeFailed {
        workflow_id: String,
        execution_id: ExecutionId,
        node_id: String,
        error: String,
    },
    /// Run finished and every executed node succeeded.
    RunCompleted {
        workflow_id: String,
        execution_id: ExecutionId,
        duration: u64,
        outputs: Outputs,
    },
    /// Run failed validation, had failing nodes, or hit an unexpected error.
    RunFailed {
        workflow_id: String,
        execution_id: ExecutionId,
        duration: u64,
        error: String,
    },
}

impl WorkflowEvent {
    pub fn execution_id(&self) -> &ExecutionId {
        match self {
            Self::RunStarted { execution_id, .. }
            | Self::NodeStarted { execution_id, .. }
            | Self::NodeCompleted { execution_id, .. }
            | Self::NodeFailed { execution_id, .. }
            | Self::RunCompleted { execution_id, .. }
            | Self::RunFailed { execution_id, .. } => execution_id,
        }
    }

    /// Whether this event closes a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted { .. } | Self::RunFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_node_result_duration() {
        let start = Utc::now();
        let end = start + Duration::milliseconds(42);
        let r = NodeExecutionResult::completed("n1", Outputs::new(), start, end);
        assert!(r.success);
        assert_eq!(r.duration, 42);
        assert_eq!(r.status(), NodeStatus::Completed);

        let r = NodeExecutionResult::failed("n2", "boom", start, start);
        assert_eq!(r.status(), NodeStatus::Failed);
        assert_eq!(r.error.as_deref(), Some("boom"));
        assert_eq!(r.duration, 0);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let now = Utc::now();
        let r = NodeExecutionResult::completed("n1", Outputs::new(), now, now);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("nodeId").is_some());
        assert!(json.get("startTime").is_some());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_nodes_filter() {
        let now = Utc::now();
        let result = WorkflowExecutionResult {
            execution_id: ExecutionId::new(),
            workflow_id: "wf".into(),
            success: false,
            start_time: now,
            end_time: now,
            duration: 0,
            outputs: Outputs::new(),
            error: Some("node(s) failed: b".into()),
            node_results: vec![
                NodeExecutionResult::completed("a", Outputs::new(), now, now),
                NodeExecutionResult::failed("b", "bad", now, now),
            ],
        };
        let failed = result.failed_nodes();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].node_id, "b");
        assert!(result.node_result("a").is_some());
    }

    #[test]
    fn test_event_tagging() {
        let event = WorkflowEvent::RunStarted {
            workflow_id: "wf".into(),
            execution_id: ExecutionId("e1".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "run_started");
        assert_eq!(event.execution_id().as_str(), "e1");
        assert!(!event.is_terminal());
    }
}
