use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::info;

use weft_core::config::AppConfig;
use weft_core::error::{Result, ValidationError, WeftError};
use weft_core::event::EventBus;
use weft_core::traits::{CompletionBackend, NodeHandler, NodeHooks, ToolBackend};
use weft_core::types::{Outputs, WorkflowEvent, WorkflowExecutionResult};
use weft_core::workflow::Workflow;

use crate::executor::WorkflowExecutor;
use crate::hooks::CommandHooks;
use crate::registry::HandlerRegistry;

/// In-process entry point: a workflow store in front of a
/// [`WorkflowExecutor`].
pub struct WorkflowEngine {
    executor: WorkflowExecutor,
    workflows: RwLock<HashMap<String, Arc<Workflow>>>,
}

impl WorkflowEngine {
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::default()
    }

    /// Make a workflow runnable by id. Replaces any workflow with the same id.
    pub fn register_workflow(&self, workflow: Workflow) {
        info!(workflow_id = %workflow.id, nodes = workflow.nodes.len(), "Workflow registered");
        self.workflows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(workflow.id.clone(), Arc::new(workflow));
    }

    pub fn unregister_workflow(&self, id: &str) -> bool {
        self.workflows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some()
    }

    pub fn workflow(&self, id: &str) -> Option<Arc<Workflow>> {
        self.workflows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Registered workflow ids, sorted.
    pub fn list_workflows(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .workflows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Run a registered workflow.
    ///
    /// Fails only when no workflow has this id; every other problem is
    /// reported inside the returned result.
    pub async fn execute_workflow(&self, id: &str, inputs: Outputs) -> Result<WorkflowExecutionResult> {
        let workflow = self
            .workflow(id)
            .ok_or_else(|| WeftError::WorkflowNotFound(id.to_string()))?;
        Ok(self.executor.execute(&workflow, inputs).await)
    }

    /// Run a workflow that has not been registered.
    pub async fn execute(&self, workflow: &Workflow, inputs: Outputs) -> WorkflowExecutionResult {
        self.executor.execute(workflow, inputs).await
    }

    /// Register or override the handler for a node type.
    pub fn register_node_handler(&self, node_type: impl Into<String>, handler: impl NodeHandler) {
        self.executor.register_node_handler(node_type, Arc::new(handler));
    }

    pub fn node_types(&self) -> Vec<String> {
        self.executor
            .registry()
            .list()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn validate(&self, workflow: &Workflow) -> std::result::Result<(), ValidationError> {
        self.executor.validate(workflow)
    }

    /// Subscribe to lifecycle events of every run on this engine.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.executor.event_bus().subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        self.executor.event_bus()
    }
}

/// Builder for [`WorkflowEngine`].
#[derive(Default)]
pub struct WorkflowEngineBuilder {
    tools: Option<Arc<dyn ToolBackend>>,
    completion: Option<Arc<dyn CompletionBackend>>,
    hooks: Option<Arc<dyn NodeHooks>>,
    event_bus: Option<Arc<EventBus>>,
    handlers: Vec<(String, Arc<dyn NodeHandler>)>,
}

impl WorkflowEngineBuilder {
    pub fn tool_backend(mut self, tools: Arc<dyn ToolBackend>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn completion_backend(mut self, completion: Arc<dyn CompletionBackend>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn NodeHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn handler(mut self, node_type: impl Into<String>, handler: impl NodeHandler) -> Self {
        self.handlers.push((node_type.into(), Arc::new(handler)));
        self
    }

    /// Apply the engine-level sections of a config: event capacity and
    /// command hooks. Backends are built separately and passed in.
    pub fn config(mut self, config: &AppConfig) -> Self {
        if self.event_bus.is_none() {
            self.event_bus = Some(Arc::new(EventBus::new(config.engine.event_capacity)));
        }
        if let Some(hooks) = config.hooks.as_ref().filter(|h| !h.is_empty()) {
            self.hooks = Some(Arc::new(CommandHooks::new(hooks.clone())));
        }
        self
    }

    pub fn build(self) -> WorkflowEngine {
        let mut registry = HandlerRegistry::with_builtins(self.tools, self.completion);
        for (node_type, handler) in self.handlers {
            registry.register_arc(node_type, handler);
        }

        let mut executor = WorkflowExecutor::new(registry);
        if let Some(hooks) = self.hooks {
            executor = executor.with_hooks(hooks);
        }
        if let Some(bus) = self.event_bus {
            executor = executor.with_event_bus(bus);
        }

        WorkflowEngine {
            executor,
            workflows: RwLock::new(HashMap::new()),
        }
    }
}
