use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{ExecutionId, NodeExecutionResult, Outputs};

/// Per-run mutable state shared by every node of one execution.
///
/// Branches of a run may be polled from several worker threads, so every
/// mutable bucket sits behind its own lock. Locks are only held for the
/// duration of a map operation, never across an await point.
#[derive(Debug)]
pub struct ExecutionContext {
    execution_id: ExecutionId,
    workflow_id: String,
    inputs: Outputs,
    outputs: RwLock<Outputs>,
    state: RwLock<Outputs>,
    node_results: Mutex<NodeResults>,
}

/// Read-only view of the three variable buckets, borrowed for the duration of
/// one resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub inputs: &'a Outputs,
    pub outputs: &'a Outputs,
    pub state: &'a Outputs,
}

#[derive(Debug, Default)]
struct NodeResults {
    order: Vec<String>,
    by_id: HashMap<String, NodeExecutionResult>,
}

impl ExecutionContext {
    /// Create a fresh context with a new execution id.
    pub fn new(workflow_id: impl Into<String>, inputs: Outputs) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            workflow_id: workflow_id.into(),
            inputs,
            outputs: RwLock::new(Outputs::new()),
            state: RwLock::new(Outputs::new()),
            node_results: Mutex::new(NodeResults::default()),
        }
    }

    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn inputs(&self) -> &Outputs {
        &self.inputs
    }

    /// Snapshot of the accumulated outputs.
    pub fn outputs(&self) -> Outputs {
        read(&self.outputs).clone()
    }

    pub fn output(&self, key: &str) -> Option<serde_json::Value> {
        read(&self.outputs).get(key).cloned()
    }

    pub fn set_output(&self, key: impl Into<String>, value: serde_json::Value) {
        write(&self.outputs).insert(key.into(), value);
    }

    /// Merge node outputs into the run outputs (overwrites on conflict).
    pub fn merge_outputs(&self, outputs: &Outputs) {
        let mut current = write(&self.outputs);
        for (k, v) in outputs {
            current.insert(k.clone(), v.clone());
        }
    }

    /// Snapshot of the scratch state.
    pub fn state(&self) -> Outputs {
        read(&self.state).clone()
    }

    pub fn get_state(&self, key: &str) -> Option<serde_json::Value> {
        read(&self.state).get(key).cloned()
    }

    pub fn set_state(&self, key: impl Into<String>, value: serde_json::Value) {
        write(&self.state).insert(key.into(), value);
    }

    /// Run `f` against a consistent view of inputs, outputs and state.
    pub fn with_scope<R>(&self, f: impl FnOnce(Scope<'_>) -> R) -> R {
        let outputs = read(&self.outputs);
        let state = read(&self.state);
        f(Scope {
            inputs: &self.inputs,
            outputs: &outputs,
            state: &state,
        })
    }

    /// Record a node's terminal result.
    ///
    /// Returns `false` and leaves the existing entry untouched if the node
    /// already has a result in this run.
    pub fn record_result(&self, result: NodeExecutionResult) -> bool {
        let mut results = lock(&self.node_results);
        if results.by_id.contains_key(&result.node_id) {
            return false;
        }
        results.order.push(result.node_id.clone());
        results.by_id.insert(result.node_id.clone(), result);
        true
    }

    pub fn has_result(&self, node_id: &str) -> bool {
        lock(&self.node_results).by_id.contains_key(node_id)
    }

    pub fn node_result(&self, node_id: &str) -> Option<NodeExecutionResult> {
        lock(&self.node_results).by_id.get(node_id).cloned()
    }

    /// All recorded results, in the order they were written.
    pub fn node_results(&self) -> Vec<NodeExecutionResult> {
        let results = lock(&self.node_results);
        results
            .order
            .iter()
            .filter_map(|id| results.by_id.get(id).cloned())
            .collect()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
