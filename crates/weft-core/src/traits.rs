use futures::future::BoxFuture;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::types::*;
use crate::workflow::WorkflowNode;

/// Executes named tools for `tool` nodes.
pub trait ToolBackend: Send + Sync + 'static {
    /// Run a tool by name with already-resolved parameters.
    fn execute_tool(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> BoxFuture<'_, Result<ToolOutcome>>;
}

/// Text generation for `llm` nodes.
pub trait CompletionBackend: Send + Sync + 'static {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>>;
}

/// The executable behind one node type.
pub trait NodeHandler: Send + Sync + 'static {
    /// Execute `node` against the run context and return its outputs.
    ///
    /// An error fails this node only; the rest of the run continues.
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>>;
}

/// Lifecycle callbacks around each handler invocation.
///
/// Both calls are awaited. An error from `before_node` fails the node before
/// its handler runs; an error from `after_node` turns a successful node into
/// a failed one.
pub trait NodeHooks: Send + Sync + 'static {
    fn before_node<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<()>> {
        let _ = (node, ctx);
        Box::pin(async { Ok(()) })
    }

    fn after_node<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
        result: &'a NodeExecutionResult,
    ) -> BoxFuture<'a, Result<()>> {
        let _ = (node, ctx, result);
        Box::pin(async { Ok(()) })
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl NodeHooks for NoopHooks {}
