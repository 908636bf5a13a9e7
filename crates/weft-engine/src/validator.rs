use std::collections::HashSet;

use weft_core::error::ValidationError;
use weft_core::workflow::Workflow;

use crate::graph::WorkflowGraph;
use crate::registry::HandlerRegistry;

/// Check a workflow's structure before anything runs.
///
/// Checks, in order: unique node ids, edge endpoints, registered handlers,
/// and acyclicity. The first problem found is returned. Validation reads only
/// the workflow and the registry, so repeated calls give the same verdict.
pub fn validate(workflow: &Workflow, registry: &HandlerRegistry) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(workflow.nodes.len());
    for node in &workflow.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNode(node.id.clone()));
        }
    }

    for edge in &workflow.edges {
        if !seen.contains(edge.source.as_str()) {
            return Err(ValidationError::MissingEdgeEndpoint {
                role: "source",
                node_id: edge.source.clone(),
            });
        }
        if !seen.contains(edge.target.as_str()) {
            return Err(ValidationError::MissingEdgeEndpoint {
                role: "target",
                node_id: edge.target.clone(),
            });
        }
    }

    for node in &workflow.nodes {
        if !registry.contains(&node.node_type) {
            return Err(ValidationError::MissingHandler {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }

    let graph = WorkflowGraph::new(workflow);
    if let Some(idx) = find_cycle(&graph) {
        return Err(ValidationError::CycleDetected(graph.node(idx).id.clone()));
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first search with a recursion stack. Returns the node that closed a
/// cycle, if any.
///
/// Start nodes are searched first. Every remaining node is then used as a
/// root too, since a cycle with no entry point has no start node at all.
fn find_cycle(graph: &WorkflowGraph<'_>) -> Option<usize> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let roots = graph.start_nodes().into_iter().chain(0..graph.len());

    for root in roots {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, next outgoing link to explore)
        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::OnStack;

        while let Some((node, next)) = stack.last_mut() {
            let links = graph.outgoing(*node);
            if *next >= links.len() {
                marks[*node] = Mark::Done;
                stack.pop();
                continue;
            }
            let target = links[*next].target;
            *next += 1;
            match marks[target] {
                Mark::OnStack => return Some(target),
                Mark::Unvisited => {
                    marks[target] = Mark::OnStack;
                    stack.push((target, 0));
                }
                Mark::Done => {}
            }
        }
    }
    None
}
