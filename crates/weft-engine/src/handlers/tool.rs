use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use weft_core::context::ExecutionContext;
use weft_core::error::{Result, WeftError};
use weft_core::traits::{NodeHandler, ToolBackend};
use weft_core::types::Outputs;
use weft_core::workflow::WorkflowNode;

use super::required_str;
use crate::expression::resolve_in;

/// Runs `data.toolName` on the tool backend with `data.params` resolved
/// against the run. Returns `{ result }`.
pub struct ToolHandler {
    backend: Option<Arc<dyn ToolBackend>>,
}

impl ToolHandler {
    pub fn new(backend: Option<Arc<dyn ToolBackend>>) -> Self {
        Self { backend }
    }
}

impl NodeHandler for ToolHandler {
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>> {
        Box::pin(async move {
            let backend = self
                .backend
                .as_ref()
                .ok_or_else(|| WeftError::handler(&node.id, "no tool backend configured"))?;
            let tool_name = required_str(node, "toolName")?;
            let params = node
                .get("params")
                .map(|p| resolve_in(ctx, p))
                .unwrap_or_else(|| Value::Object(Default::default()));

            debug!(node_id = %node.id, tool = %tool_name, "Invoking tool");
            let outcome = backend.execute_tool(tool_name, params).await?;
            if !outcome.success {
                let message = outcome
                    .error
                    .unwrap_or_else(|| format!("Tool {} failed", tool_name));
                return Err(WeftError::ToolExecution {
                    tool: tool_name.to_string(),
                    message,
                });
            }

            let mut outputs = Outputs::new();
            outputs.insert("result".into(), outcome.result.unwrap_or(Value::Null));
            Ok(outputs)
        })
    }
}
