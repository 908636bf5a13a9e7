use futures::future::BoxFuture;
use tracing::debug;

use weft_core::context::ExecutionContext;
use weft_core::error::Result;
use weft_core::traits::NodeHandler;
use weft_core::types::Outputs;
use weft_core::workflow::WorkflowNode;

/// Placeholder for `parallel`, `loop` and `error-handler` nodes.
///
/// Fan-out already happens for any node with several outgoing edges, so these
/// types only reserve their names. They succeed with no outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubHandler;

impl NodeHandler for StubHandler {
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>> {
        Box::pin(async move {
            debug!(node_id = %node.id, node_type = %node.node_type, "Stub node passes through");
            Ok(Outputs::new())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_returns_empty_outputs() {
        let ctx = ExecutionContext::new("wf", Outputs::new());
        let node = WorkflowNode::new("p", "parallel");
        let out = StubHandler.execute(&node, &ctx).await.unwrap();
        assert!(out.is_empty());
    }
}
