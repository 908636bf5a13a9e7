use futures::future::BoxFuture;
use serde_json::Value;

use weft_core::context::ExecutionContext;
use weft_core::error::{Result, WeftError};
use weft_core::traits::NodeHandler;
use weft_core::types::Outputs;
use weft_core::workflow::WorkflowNode;

use super::required_str;
use crate::condition::evaluate;

/// Evaluates `data.condition` and returns `{ condition, path }`, where `path`
/// is `"true"` or `"false"`. Edges labelled with a branch use `path` to
/// decide whether they fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionHandler;

impl NodeHandler for ConditionHandler {
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>> {
        Box::pin(async move {
            let source = required_str(node, "condition")?;
            let verdict = ctx
                .with_scope(|scope| evaluate(source, scope))
                .map_err(|e| WeftError::Expression(format!("{}: {}", node.id, e)))?;

            let mut outputs = Outputs::new();
            outputs.insert("condition".into(), Value::Bool(verdict));
            outputs.insert("path".into(), Value::String(verdict.to_string()));
            Ok(outputs)
        })
    }
}
