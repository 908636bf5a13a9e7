use std::collections::HashMap;
use std::sync::Arc;

use weft_core::traits::{CompletionBackend, NodeHandler, ToolBackend};

use crate::handlers::{
    condition::ConditionHandler, llm::LlmHandler, stub::StubHandler, tool::ToolHandler,
    transform::TransformHandler,
};

/// Maps node type strings to the handler that executes them.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any existing handler for the type.
    pub fn register(&mut self, node_type: impl Into<String>, handler: impl NodeHandler) {
        self.handlers.insert(node_type.into(), Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn register_arc(&mut self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        self.handlers.insert(node_type.into(), handler);
    }

    /// Unregister a handler by type.
    pub fn unregister(&mut self, node_type: &str) -> bool {
        self.handlers.remove(node_type).is_some()
    }

    /// Get a handler by type.
    pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// List all registered types, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Create a registry with all built-in node types registered.
    ///
    /// `tool` and `llm` nodes fail at execution time when their backend is
    /// not provided.
    pub fn with_builtins(
        tools: Option<Arc<dyn ToolBackend>>,
        completion: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        let mut registry = Self::new();

        registry.register("tool", ToolHandler::new(tools));
        registry.register("llm", LlmHandler::new(completion));
        registry.register("condition", ConditionHandler);
        registry.register("transform", TransformHandler);

        // Extension points without behavior of their own.
        registry.register("parallel", StubHandler);
        registry.register("loop", StubHandler);
        registry.register("error-handler", StubHandler);

        registry
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use weft_core::context::ExecutionContext;
    use weft_core::error::Result;
    use weft_core::types::Outputs;
    use weft_core::workflow::WorkflowNode;

    struct Custom;

    impl NodeHandler for Custom {
        fn execute<'a>(
            &'a self,
            _node: &'a WorkflowNode,
            _ctx: &'a ExecutionContext,
        ) -> BoxFuture<'a, Result<Outputs>> {
            Box::pin(async { Ok(Outputs::new()) })
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = HandlerRegistry::with_builtins(None, None);
        assert_eq!(
            registry.list(),
            vec![
                "condition",
                "error-handler",
                "llm",
                "loop",
                "parallel",
                "tool",
                "transform"
            ]
        );
    }

    #[test]
    fn test_register_and_unregister() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.get("custom").is_none());
        registry.register("custom", Custom);
        assert!(registry.contains("custom"));
        assert!(registry.unregister("custom"));
        assert!(!registry.unregister("custom"));
    }

    #[test]
    fn test_override_builtin() {
        let mut registry = HandlerRegistry::with_builtins(None, None);
        let before = registry.get("transform").unwrap();
        registry.register("transform", Custom);
        let after = registry.get("transform").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
