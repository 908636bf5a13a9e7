use std::collections::HashMap;

use weft_core::workflow::{Workflow, WorkflowNode};

/// An outgoing link in the index graph.
#[derive(Debug, Clone)]
pub struct Link {
    pub target: usize,
    pub branch: Option<String>,
}

/// Arena view over a [`Workflow`]: nodes addressed by index, edges stored
/// as adjacency lists in both directions.
///
/// Edges whose endpoints do not exist are dropped here; the validator
/// reports them separately.
#[derive(Debug)]
pub struct WorkflowGraph<'w> {
    workflow: &'w Workflow,
    index: HashMap<&'w str, usize>,
    outgoing: Vec<Vec<Link>>,
    incoming: Vec<Vec<usize>>,
}

impl<'w> WorkflowGraph<'w> {
    pub fn new(workflow: &'w Workflow) -> Self {
        let n = workflow.nodes.len();
        let mut index = HashMap::with_capacity(n);
        for (i, node) in workflow.nodes.iter().enumerate() {
            // First occurrence wins; duplicates are a validation error.
            index.entry(node.id.as_str()).or_insert(i);
        }

        let mut outgoing = vec![Vec::new(); n];
        let mut incoming = vec![Vec::new(); n];
        for edge in &workflow.edges {
            let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                continue;
            };
            outgoing[s].push(Link {
                target: t,
                branch: edge.branch.clone(),
            });
            incoming[t].push(s);
        }

        Self {
            workflow,
            index,
            outgoing,
            incoming,
        }
    }

    pub fn len(&self) -> usize {
        self.workflow.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflow.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, idx: usize) -> &'w WorkflowNode {
        &self.workflow.nodes[idx]
    }

    pub fn outgoing(&self, idx: usize) -> &[Link] {
        &self.outgoing[idx]
    }

    pub fn incoming(&self, idx: usize) -> &[usize] {
        &self.incoming[idx]
    }

    /// Nodes with no incoming edges, in workflow order.
    pub fn start_nodes(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.incoming[i].is_empty() && self.index_of(&self.node(i).id) == Some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::workflow::WorkflowEdge;

    fn diamond() -> Workflow {
        Workflow::new("d", "Diamond")
            .with_node(WorkflowNode::new("a", "transform"))
            .with_node(WorkflowNode::new("b", "transform"))
            .with_node(WorkflowNode::new("c", "transform"))
            .with_node(WorkflowNode::new("d", "transform"))
            .with_edge(WorkflowEdge::new("a", "b"))
            .with_edge(WorkflowEdge::on_branch("a", "c", "true"))
            .with_edge(WorkflowEdge::new("b", "d"))
            .with_edge(WorkflowEdge::new("c", "d"))
    }

    #[test]
    fn test_adjacency() {
        let wf = diamond();
        let g = WorkflowGraph::new(&wf);
        assert_eq!(g.len(), 4);
        assert_eq!(g.start_nodes(), vec![0]);
        assert_eq!(g.incoming(3), &[1, 2]);
        let out: Vec<_> = g.outgoing(0).iter().map(|l| (l.target, l.branch.clone())).collect();
        assert_eq!(out, vec![(1, None), (2, Some("true".to_string()))]);
    }

    #[test]
    fn test_dangling_edges_skipped() {
        let wf = Workflow::new("x", "Dangling")
            .with_node(WorkflowNode::new("a", "transform"))
            .with_edge(WorkflowEdge::new("a", "ghost"));
        let g = WorkflowGraph::new(&wf);
        assert!(g.outgoing(0).is_empty());
        assert_eq!(g.start_nodes(), vec![0]);
    }
}
