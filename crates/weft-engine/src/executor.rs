use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use weft_core::context::ExecutionContext;
use weft_core::error::{Result, ValidationError, WeftError};
use weft_core::event::EventBus;
use weft_core::traits::{NodeHandler, NodeHooks, NoopHooks};
use weft_core::types::{NodeExecutionResult, Outputs, WorkflowEvent, WorkflowExecutionResult};
use weft_core::workflow::{Workflow, WorkflowNode};

use crate::graph::{Link, WorkflowGraph};
use crate::registry::HandlerRegistry;
use crate::validator;

/// Executes workflows against a handler registry.
///
/// Each call to [`execute`](Self::execute) validates the workflow, creates a
/// fresh [`ExecutionContext`], and runs every start node concurrently. A node
/// fans out to its targets once its result is recorded; a target with several
/// parents waits until the last of them has settled.
///
/// Node failures are recorded as data and stop only the failing node's
/// downstream branch. The caller always gets a [`WorkflowExecutionResult`].
pub struct WorkflowExecutor {
    registry: RwLock<HandlerRegistry>,
    hooks: Arc<dyn NodeHooks>,
    event_bus: Arc<EventBus>,
}

impl WorkflowExecutor {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
            hooks: Arc::new(NoopHooks),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn NodeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Register or replace the handler for a node type. Runs already in
    /// flight keep the handlers they started with.
    pub fn register_node_handler(&self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        self.registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register_arc(node_type, handler);
    }

    /// Snapshot of the registered handlers.
    pub fn registry(&self) -> HandlerRegistry {
        self.registry.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Validate without running.
    pub fn validate(&self, workflow: &Workflow) -> std::result::Result<(), ValidationError> {
        validator::validate(workflow, &self.registry())
    }

    /// Validate and run a workflow to completion.
    pub async fn execute(&self, workflow: &Workflow, inputs: Outputs) -> WorkflowExecutionResult {
        let start = Utc::now();
        let ctx = ExecutionContext::new(workflow.id.clone(), inputs);
        let registry = self.registry();

        if let Err(e) = validator::validate(workflow, &registry) {
            warn!(workflow_id = %workflow.id, error = %e, "Workflow validation failed");
            return self.finish(&ctx, start, Err(e.into()));
        }

        info!(
            workflow_id = %workflow.id,
            execution_id = %ctx.execution_id(),
            nodes = workflow.nodes.len(),
            "Workflow run started"
        );
        self.event_bus.publish(WorkflowEvent::RunStarted {
            workflow_id: workflow.id.clone(),
            execution_id: ctx.execution_id().clone(),
        });

        let run = Run::new(workflow, &ctx, registry, self.hooks.as_ref(), &self.event_bus);
        let outcome = match AssertUnwindSafe(run.run_all()).catch_unwind().await {
            Ok(outputs) => Ok(outputs),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(workflow_id = %workflow.id, error = %message, "Workflow run panicked");
                Err(WeftError::Internal(message))
            }
        };

        self.finish(&ctx, start, outcome)
    }

    /// Run one node of `workflow`, and whatever becomes runnable below it,
    /// against an existing context.
    ///
    /// No validation happens here. The node fails with
    /// [`WeftError::DependencyNotReady`] if any of its parents has no
    /// recorded result in `ctx`. Only parents settled during this call count
    /// towards a downstream join.
    pub async fn execute_branch(
        &self,
        workflow: &Workflow,
        node_id: &str,
        ctx: &ExecutionContext,
    ) -> Result<Outputs> {
        let run = Run::new(workflow, ctx, self.registry(), self.hooks.as_ref(), &self.event_bus);
        let idx = run
            .graph
            .index_of(node_id)
            .ok_or_else(|| WeftError::handler(node_id, "node not found in workflow"))?;
        Ok(run.run_node(idx).await)
    }

    fn finish(
        &self,
        ctx: &ExecutionContext,
        start: DateTime<Utc>,
        outcome: Result<Outputs>,
    ) -> WorkflowExecutionResult {
        let end = Utc::now();
        let duration = (end - start).num_milliseconds().max(0) as u64;
        let node_results = ctx.node_results();

        let (outputs, error) = match outcome {
            Ok(outputs) => {
                let failed: Vec<&str> = node_results
                    .iter()
                    .filter(|r| !r.success)
                    .map(|r| r.node_id.as_str())
                    .collect();
                if failed.is_empty() {
                    (outputs, None)
                } else {
                    (outputs, Some(format!("Node(s) failed: {}", failed.join(", "))))
                }
            }
            Err(e) => (Outputs::new(), Some(e.to_string())),
        };

        let result = WorkflowExecutionResult {
            execution_id: ctx.execution_id().clone(),
            workflow_id: ctx.workflow_id().to_string(),
            success: error.is_none(),
            start_time: start,
            end_time: end,
            duration,
            outputs,
            error,
            node_results,
        };

        match &result.error {
            None => {
                info!(
                    workflow_id = %result.workflow_id,
                    execution_id = %result.execution_id,
                    duration_ms = duration,
                    nodes = result.node_results.len(),
                    "Workflow run completed"
                );
                self.event_bus.publish(WorkflowEvent::RunCompleted {
                    workflow_id: result.workflow_id.clone(),
                    execution_id: result.execution_id.clone(),
                    duration,
                    outputs: result.outputs.clone(),
                });
            }
            Some(error) => {
                warn!(
                    workflow_id = %result.workflow_id,
                    execution_id = %result.execution_id,
                    duration_ms = duration,
                    error = %error,
                    "Workflow run failed"
                );
                self.event_bus.publish(WorkflowEvent::RunFailed {
                    workflow_id: result.workflow_id.clone(),
                    execution_id: result.execution_id.clone(),
                    duration,
                    error: error.clone(),
                });
            }
        }

        result
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Parents of a node that have settled so far, and how many of those edges
/// fired.
#[derive(Debug, Clone, Copy)]
struct JoinState {
    remaining: usize,
    fired: usize,
}

/// Scheduling state for one run.
struct Run<'r> {
    graph: WorkflowGraph<'r>,
    ctx: &'r ExecutionContext,
    registry: HandlerRegistry,
    hooks: &'r dyn NodeHooks,
    events: &'r EventBus,
    joins: Mutex<HashMap<usize, JoinState>>,
    skipped: Mutex<HashSet<usize>>,
}

impl<'r> Run<'r> {
    fn new(
        workflow: &'r Workflow,
        ctx: &'r ExecutionContext,
        registry: HandlerRegistry,
        hooks: &'r dyn NodeHooks,
        events: &'r EventBus,
    ) -> Self {
        Self {
            graph: WorkflowGraph::new(workflow),
            ctx,
            registry,
            hooks,
            events,
            joins: Mutex::new(HashMap::new()),
            skipped: Mutex::new(HashSet::new()),
        }
    }

    /// Run every start node concurrently and merge what they return, in
    /// workflow order.
    async fn run_all(&self) -> Outputs {
        let starts = self.graph.start_nodes();
        debug!(start_nodes = starts.len(), "Dispatching start nodes");

        let mut merged = Outputs::new();
        for outputs in join_all(starts.into_iter().map(|idx| self.run_node(idx))).await {
            merged.extend(outputs);
        }
        merged
    }

    /// Execute a node, then every target it makes runnable. Returns the node's
    /// outputs merged with its subtree's; empty if the node failed.
    fn run_node<'a>(&'a self, idx: usize) -> BoxFuture<'a, Outputs> {
        Box::pin(async move {
            let Some(mut outputs) = self.execute_node(idx).await else {
                return Outputs::new();
            };

            let children = self.settle_edges(idx, &outputs);
            if !children.is_empty() {
                let results = join_all(children.into_iter().map(|c| self.run_node(c))).await;
                for child in results {
                    outputs.extend(child);
                }
            }
            outputs
        })
    }

    /// Run one node through the gate, hooks and handler, and record its
    /// result. Returns its outputs if it completed.
    async fn execute_node(&self, idx: usize) -> Option<Outputs> {
        let node = self.graph.node(idx);
        if self.ctx.has_result(&node.id) {
            warn!(node_id = %node.id, "Node already has a result in this run, not re-running");
            return None;
        }
        let started = Utc::now();

        if let Err(e) = self.check_dependencies(idx) {
            self.record(node, NodeExecutionResult::failed(&node.id, e.to_string(), started, Utc::now()));
            return None;
        }

        let Some(handler) = self.registry.get(&node.node_type) else {
            let e = WeftError::handler(
                &node.id,
                format!("no handler registered for type '{}'", node.node_type),
            );
            self.record(node, NodeExecutionResult::failed(&node.id, e.to_string(), started, Utc::now()));
            return None;
        };

        debug!(node_id = %node.id, node_type = %node.node_type, "Executing node");
        self.events.publish(WorkflowEvent::NodeStarted {
            workflow_id: self.ctx.workflow_id().to_string(),
            execution_id: self.ctx.execution_id().clone(),
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
        });

        let outcome = match self.hooks.before_node(node, self.ctx).await {
            Ok(()) => handler.execute(node, self.ctx).await,
            Err(e) => Err(e),
        };
        let mut result = match outcome {
            Ok(outputs) => NodeExecutionResult::completed(&node.id, outputs, started, Utc::now()),
            Err(e) => NodeExecutionResult::failed(&node.id, e.to_string(), started, Utc::now()),
        };

        if let Err(e) = self.hooks.after_node(node, self.ctx, &result).await {
            if result.success {
                result = NodeExecutionResult::failed(&node.id, e.to_string(), started, Utc::now());
            } else {
                warn!(node_id = %node.id, error = %e, "after_node hook failed on a failed node");
            }
        }

        let completed = result.success.then(|| result.outputs.clone());
        if !self.record(node, result) {
            return None;
        }
        if let Some(outputs) = &completed {
            self.ctx.merge_outputs(outputs);
        }
        completed
    }

    /// Every parent must have a recorded result or have been skipped.
    fn check_dependencies(&self, idx: usize) -> Result<()> {
        let skipped = lock(&self.skipped);
        for &parent in self.graph.incoming(idx) {
            if !skipped.contains(&parent) && !self.ctx.has_result(&self.graph.node(parent).id) {
                return Err(WeftError::DependencyNotReady {
                    node_id: self.graph.node(idx).id.clone(),
                    dependency: self.graph.node(parent).id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Write a node's terminal result and announce it. Returns `false` if the
    /// node already had a result in this run.
    fn record(&self, node: &WorkflowNode, result: NodeExecutionResult) -> bool {
        let event = if result.success {
            debug!(node_id = %node.id, duration_ms = result.duration, "Node completed");
            WorkflowEvent::NodeCompleted {
                workflow_id: self.ctx.workflow_id().to_string(),
                execution_id: self.ctx.execution_id().clone(),
                node_id: node.id.clone(),
                duration: result.duration,
            }
        } else {
            let error = result.error.clone().unwrap_or_default();
            warn!(node_id = %node.id, error = %error, "Node failed");
            WorkflowEvent::NodeFailed {
                workflow_id: self.ctx.workflow_id().to_string(),
                execution_id: self.ctx.execution_id().clone(),
                node_id: node.id.clone(),
                error,
            }
        };

        if !self.ctx.record_result(result) {
            warn!(node_id = %node.id, "Node already has a result in this run, keeping the first");
            return false;
        }
        self.events.publish(event);
        true
    }

    /// Settle the outgoing edges of a completed node and return the targets
    /// that are now ready to run.
    ///
    /// An edge fires unless it carries a branch label that differs from the
    /// source's `path` output. A target whose parents have all settled runs if
    /// at least one incoming edge fired; otherwise it is skipped, and its own
    /// outgoing edges settle without firing.
    fn settle_edges(&self, idx: usize, outputs: &Outputs) -> Vec<usize> {
        let path = outputs.get("path").and_then(Value::as_str);
        let mut pending: VecDeque<(usize, bool)> = self
            .graph
            .outgoing(idx)
            .iter()
            .map(|link| (link.target, fires(link, path)))
            .collect();

        let mut runnable = Vec::new();
        let mut joins = lock(&self.joins);
        while let Some((target, fired)) = pending.pop_front() {
            let join = joins.entry(target).or_insert(JoinState {
                remaining: self.graph.incoming(target).len(),
                fired: 0,
            });
            join.remaining = join.remaining.saturating_sub(1);
            if fired {
                join.fired += 1;
            }
            if join.remaining > 0 {
                continue;
            }

            if join.fired > 0 {
                runnable.push(target);
            } else {
                debug!(node_id = %self.graph.node(target).id, "Node skipped, no incoming edge fired");
                lock(&self.skipped).insert(target);
                pending.extend(self.graph.outgoing(target).iter().map(|l| (l.target, false)));
            }
        }
        runnable
    }
}

fn fires(link: &Link, path: Option<&str>) -> bool {
    match (link.branch.as_deref(), path) {
        (Some(branch), Some(path)) => branch == path,
        _ => true,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
