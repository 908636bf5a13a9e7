use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use weft_core::context::ExecutionContext;
use weft_core::error::{Result, WeftError};
use weft_core::traits::{CompletionBackend, NodeHandler};
use weft_core::types::{CompletionRequest, Outputs};
use weft_core::workflow::WorkflowNode;

use super::required_str;
use crate::expression::{display, render_in, resolve_in};

/// Sends `data.prompt`, rendered as a template, to the completion backend.
/// Returns `{ completion }`.
///
/// Optional fields: `model` (string, may contain references) and `options`
/// (object, resolved and forwarded as-is).
pub struct LlmHandler {
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl LlmHandler {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        Self { backend }
    }
}

impl NodeHandler for LlmHandler {
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>> {
        Box::pin(async move {
            let backend = self
                .backend
                .as_ref()
                .ok_or_else(|| WeftError::handler(&node.id, "no completion backend configured"))?;
            let prompt = render_in(ctx, required_str(node, "prompt")?);

            let mut request = CompletionRequest::new(prompt);
            if let Some(model) = node.get("model") {
                match resolve_in(ctx, model) {
                    Value::Null => {}
                    resolved => request = request.with_model(display(&resolved)),
                }
            }
            if let Some(Value::Object(options)) = node.get("options").map(|o| resolve_in(ctx, o)) {
                request.options = options;
            }

            debug!(node_id = %node.id, model = ?request.model, "Requesting completion");
            let response = backend.complete(request).await?;

            let mut outputs = Outputs::new();
            outputs.insert("completion".into(), Value::String(response.completion));
            Ok(outputs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_test_utils::MockCompletionBackend;

    #[tokio::test]
    async fn test_renders_prompt_and_forwards_options() {
        let backend = Arc::new(MockCompletionBackend::new().with_response("a summary"));
        let handler = LlmHandler::new(Some(backend.clone()));

        let mut inputs = Outputs::new();
        inputs.insert("topic".into(), json!("graphs"));
        inputs.insert("temp".into(), json!(0.5));
        let ctx = ExecutionContext::new("wf", inputs);
        let node = WorkflowNode::new("l", "llm")
            .with_data("prompt", json!("Summarize ${inputs.topic}"))
            .with_data("model", json!("small"))
            .with_data("options", json!({"temperature": "${inputs.temp}"}));

        let out = handler.execute(&node, &ctx).await.unwrap();
        assert_eq!(out["completion"], json!("a summary"));

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "Summarize graphs");
        assert_eq!(requests[0].model.as_deref(), Some("small"));
        assert_eq!(requests[0].options["temperature"], json!(0.5));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let backend = Arc::new(MockCompletionBackend::new().failing("rate limited"));
        let handler = LlmHandler::new(Some(backend));
        let ctx = ExecutionContext::new("wf", Outputs::new());
        let node = WorkflowNode::new("l", "llm").with_data("prompt", json!("hi"));

        let err = handler.execute(&node, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_missing_prompt() {
        let backend = Arc::new(MockCompletionBackend::new());
        let handler = LlmHandler::new(Some(backend));
        let ctx = ExecutionContext::new("wf", Outputs::new());
        let err = handler
            .execute(&WorkflowNode::new("l", "llm"), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("prompt"));
    }
}
