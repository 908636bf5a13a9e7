//! Built-in node handlers.

pub mod condition;
pub mod llm;
pub mod stub;
pub mod tool;
pub mod transform;

use weft_core::error::{Result, WeftError};
use weft_core::workflow::WorkflowNode;

/// Read a required string field from a node's data.
pub(crate) fn required_str<'a>(node: &'a WorkflowNode, key: &str) -> Result<&'a str> {
    node.get_str(key)
        .ok_or_else(|| WeftError::handler(&node.id, format!("missing '{}' in node data", key)))
}
