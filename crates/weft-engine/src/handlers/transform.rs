use futures::future::BoxFuture;
use serde_json::Value;

use weft_core::context::ExecutionContext;
use weft_core::error::{Result, WeftError};
use weft_core::traits::NodeHandler;
use weft_core::types::Outputs;
use weft_core::workflow::WorkflowNode;

use super::required_str;
use crate::expression::{display, resolve_in};

/// Applies `data.transformation` to the resolved `data.input`.
/// Returns `{ result }`.
///
/// Supported transformations: `toUpperCase`, `toLowerCase`, `parseJson`,
/// `stringify`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformHandler;

impl NodeHandler for TransformHandler {
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>> {
        Box::pin(async move {
            let transformation = required_str(node, "transformation")?;
            let input = node
                .get("input")
                .map(|v| resolve_in(ctx, v))
                .unwrap_or(Value::Null);

            let result = apply(transformation, input).map_err(|e| WeftError::handler(&node.id, e))?;

            let mut outputs = Outputs::new();
            outputs.insert("result".into(), result);
            Ok(outputs)
        })
    }
}

fn apply(transformation: &str, input: Value) -> std::result::Result<Value, String> {
    match transformation {
        "toUpperCase" => Ok(Value::String(display(&input).to_uppercase())),
        "toLowerCase" => Ok(Value::String(display(&input).to_lowercase())),
        "parseJson" => match input {
            Value::String(s) => {
                serde_json::from_str(&s).map_err(|e| format!("parseJson: invalid JSON: {}", e))
            }
            other => Err(format!("parseJson: expected a string, got {}", other)),
        },
        "stringify" => Ok(Value::String(input.to_string())),
        other => Err(format!("Unknown transformation: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(transformation: &str, input: Value, inputs: Outputs) -> Result<Outputs> {
        let ctx = ExecutionContext::new("wf", inputs);
        let node = WorkflowNode::new("t", "transform")
            .with_data("transformation", json!(transformation))
            .with_data("input", input);
        TransformHandler.execute(&node, &ctx).await
    }

    #[tokio::test]
    async fn test_upper_case_from_input() {
        let mut inputs = Outputs::new();
        inputs.insert("text".into(), json!("hi"));
        let out = run("toUpperCase", json!("${inputs.text}"), inputs).await.unwrap();
        assert_eq!(out["result"], json!("HI"));
    }

    #[tokio::test]
    async fn test_lower_case() {
        let out = run("toLowerCase", json!("MiXeD"), Outputs::new()).await.unwrap();
        assert_eq!(out["result"], json!("mixed"));
    }

    #[tokio::test]
    async fn test_parse_and_stringify() {
        let out = run("parseJson", json!("{\"a\":[1,2]}"), Outputs::new()).await.unwrap();
        assert_eq!(out["result"], json!({"a": [1, 2]}));

        let out = run("stringify", json!({"a": 1}), Outputs::new()).await.unwrap();
        assert_eq!(out["result"], json!("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_parse_rejects_bad_json() {
        let err = run("parseJson", json!("{nope"), Outputs::new()).await.unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn test_unknown_transformation() {
        let err = run("reverse", json!("abc"), Outputs::new()).await.unwrap_err();
        assert!(err.to_string().contains("Unknown transformation: reverse"));
    }
}
