use futures::future::BoxFuture;

use weft_core::config::HooksConfig;
use weft_core::context::ExecutionContext;
use weft_core::error::Result;
use weft_core::hooks::run_hooks;
use weft_core::traits::NodeHooks;
use weft_core::types::NodeExecutionResult;
use weft_core::workflow::WorkflowNode;

/// Node hooks backed by shell commands from `[hooks]` in the config.
///
/// Commands see `WEFT_WORKFLOW_ID`, `WEFT_EXECUTION_ID`, `WEFT_NODE_ID` and
/// `WEFT_NODE_TYPE`; after-node commands also get `WEFT_NODE_SUCCESS`.
#[derive(Debug, Clone, Default)]
pub struct CommandHooks {
    config: HooksConfig,
}

impl CommandHooks {
    pub fn new(config: HooksConfig) -> Self {
        Self { config }
    }
}

impl NodeHooks for CommandHooks {
    fn before_node<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.config.before_node.is_empty() {
                return Ok(());
            }
            run_hooks(
                &self.config.before_node,
                &[
                    ("WEFT_WORKFLOW_ID", ctx.workflow_id()),
                    ("WEFT_EXECUTION_ID", ctx.execution_id().as_str()),
                    ("WEFT_NODE_ID", node.id.as_str()),
                    ("WEFT_NODE_TYPE", node.node_type.as_str()),
                ],
            )
            .await
        })
    }

    fn after_node<'a>(
        &'a self,
        node: &'a WorkflowNode,
        ctx: &'a ExecutionContext,
        result: &'a NodeExecutionResult,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.config.after_node.is_empty() {
                return Ok(());
            }
            let success = if result.success { "true" } else { "false" };
            run_hooks(
                &self.config.after_node,
                &[
                    ("WEFT_WORKFLOW_ID", ctx.workflow_id()),
                    ("WEFT_EXECUTION_ID", ctx.execution_id().as_str()),
                    ("WEFT_NODE_ID", node.id.as_str()),
                    ("WEFT_NODE_TYPE", node.node_type.as_str()),
                    ("WEFT_NODE_SUCCESS", success),
                ],
            )
            .await
        })
    }
}
