//! Workflow validation and execution.
//!
//! A [`WorkflowEngine`] holds registered workflows and a handler registry.
//! Running a workflow validates its graph, then dispatches nodes
//! concurrently in dependency order, resolving `${...}` references in node
//! data against the run's inputs, outputs and state.

pub mod condition;
pub mod engine;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod handlers;
pub mod hooks;
pub mod registry;
pub mod run_log;
pub mod validator;

pub use engine::{WorkflowEngine, WorkflowEngineBuilder};
pub use executor::WorkflowExecutor;
pub use hooks::CommandHooks;
pub use registry::HandlerRegistry;
pub use run_log::RunLogger;
pub use validator::validate;
