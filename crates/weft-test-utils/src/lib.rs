//! Mocks and fixtures shared by the Weft test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use weft_core::context::ExecutionContext;
use weft_core::error::{Result, WeftError};
use weft_core::traits::{CompletionBackend, NodeHandler, NodeHooks, ToolBackend};
use weft_core::types::{
    CompletionRequest, CompletionResponse, NodeExecutionResult, Outputs, ToolOutcome,
};
use weft_core::workflow::{Workflow, WorkflowEdge, WorkflowNode};

/// Tool backend with canned outcomes per tool name. Records every call.
#[derive(Default)]
pub struct MockToolBackend {
    outcomes: HashMap<String, ToolOutcome>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockToolBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, tool: &str, result: Value) -> Self {
        self.outcomes.insert(tool.to_string(), ToolOutcome::success(result));
        self
    }

    pub fn with_failure(mut self, tool: &str, error: &str) -> Self {
        self.outcomes.insert(tool.to_string(), ToolOutcome::error(error));
        self
    }

    /// `(tool, params)` for every call, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolBackend for MockToolBackend {
    fn execute_tool(&self, name: &str, params: Value) -> BoxFuture<'_, Result<ToolOutcome>> {
        self.calls.lock().unwrap().push((name.to_string(), params));
        let outcome = self
            .outcomes
            .get(name)
            .cloned()
            .ok_or_else(|| WeftError::ToolNotFound(name.to_string()));
        Box::pin(async move { outcome })
    }
}

/// Completion backend returning queued responses, then echoing the prompt.
#[derive(Default)]
pub struct MockCompletionBackend {
    responses: Mutex<Vec<String>>,
    failure: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response. Responses are returned in the order queued.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().unwrap().push(text.to_string());
        self
    }

    /// Fail every request with this message.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl CompletionBackend for MockCompletionBackend {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>> {
        let prompt = request.prompt.clone();
        self.requests.lock().unwrap().push(request);
        let result = match &self.failure {
            Some(message) => Err(WeftError::Completion(message.clone())),
            None => {
                let mut queued = self.responses.lock().unwrap();
                let completion = if queued.is_empty() {
                    prompt
                } else {
                    queued.remove(0)
                };
                Ok(CompletionResponse { completion })
            }
        };
        Box::pin(async move { result })
    }
}

/// Handler returning fixed outputs, optionally after a delay. Counts calls.
#[derive(Clone, Default)]
pub struct StaticHandler {
    outputs: Outputs,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticHandler {
    pub fn new(outputs: Outputs) -> Self {
        Self {
            outputs,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared call counter; clones of this handler count together.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NodeHandler for StaticHandler {
    fn execute<'a>(
        &'a self,
        _node: &'a WorkflowNode,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.outputs.clone())
        })
    }
}

/// Handler that always fails with the given message.
#[derive(Clone)]
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl NodeHandler for FailingHandler {
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Outputs>> {
        Box::pin(async move { Err(WeftError::handler(&node.id, &self.message)) })
    }
}

/// Hooks that record `before:<id>` and `after:<id>:<ok|failed>` entries.
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl NodeHooks for RecordingHooks {
    fn before_node<'a>(
        &'a self,
        node: &'a WorkflowNode,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<()>> {
        self.events.lock().unwrap().push(format!("before:{}", node.id));
        Box::pin(async { Ok(()) })
    }

    fn after_node<'a>(
        &'a self,
        node: &'a WorkflowNode,
        _ctx: &'a ExecutionContext,
        result: &'a NodeExecutionResult,
    ) -> BoxFuture<'a, Result<()>> {
        let status = if result.success { "ok" } else { "failed" };
        self.events
            .lock()
            .unwrap()
            .push(format!("after:{}:{}", node.id, status));
        Box::pin(async { Ok(()) })
    }
}

/// Hooks that fail on one side of the handler call.
#[derive(Debug, Clone, Copy)]
pub enum FailingHooks {
    Before,
    After,
}

impl NodeHooks for FailingHooks {
    fn before_node<'a>(
        &'a self,
        _node: &'a WorkflowNode,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<()>> {
        let fail = matches!(self, Self::Before);
        Box::pin(async move {
            if fail {
                Err(hook_error("before_node"))
            } else {
                Ok(())
            }
        })
    }

    fn after_node<'a>(
        &'a self,
        _node: &'a WorkflowNode,
        _ctx: &'a ExecutionContext,
        _result: &'a NodeExecutionResult,
    ) -> BoxFuture<'a, Result<()>> {
        let fail = matches!(self, Self::After);
        Box::pin(async move {
            if fail {
                Err(hook_error("after_node"))
            } else {
                Ok(())
            }
        })
    }
}

fn hook_error(hook: &str) -> WeftError {
    WeftError::Hook {
        hook: hook.to_string(),
        message: "rejected by test hook".to_string(),
    }
}

/// Build a workflow from `(id, type)` pairs and `(source, target)` pairs.
pub fn workflow(id: &str, nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> Workflow {
    let mut wf = Workflow::new(id, id);
    for (node_id, node_type) in nodes {
        wf = wf.with_node(WorkflowNode::new(*node_id, *node_type));
    }
    for (source, target) in edges {
        wf = wf.with_edge(WorkflowEdge::new(*source, *target));
    }
    wf
}

/// Build an `Outputs` map from key/value pairs.
pub fn outputs(pairs: &[(&str, Value)]) -> Outputs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
