use thiserror::Error;

/// Structural problems found before a run starts. No node executes when one
/// of these is reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Edge references missing {role} node: {node_id}")]
    MissingEdgeEndpoint { role: &'static str, node_id: String },

    #[error("No handler registered for node {node_id} (type '{node_type}')")]
    MissingHandler { node_id: String, node_type: String },

    #[error("Cycle detected at node: {0}")]
    CycleDetected(String),
}

#[derive(Debug, Error)]
pub enum WeftError {
    // Workflow structure
    #[error("Workflow validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    // Node execution
    #[error("Node {node_id} cannot run: upstream node {dependency} has not been executed yet")]
    DependencyNotReady { node_id: String, dependency: String },

    #[error("Node {node_id} failed: {message}")]
    Handler { node_id: String, message: String },

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Unexpected error: {0}")]
    Internal(String),

    // Collaborators
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Completion request failed: {0}")]
    Completion(String),

    #[error("Hook failed: {hook}: {message}")]
    Hook { hook: String, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeftError {
    pub fn handler(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            node_id: node_id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WeftError>;
