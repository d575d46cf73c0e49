//! Graph Index
//!
//! Lookup tables built once per run: node id to node, and source id to its
//! outgoing edges in definition order.

use std::collections::HashMap;

use super::model::{Edge, Node, WorkflowDefinition};

/// Read-only view of a definition prepared for traversal.
#[derive(Debug, Clone)]
pub struct GraphIndex {
    definition: WorkflowDefinition,
    nodes: HashMap<String, usize>,
    adjacency: HashMap<String, Vec<usize>>,
}

impl GraphIndex {
    /// Builds the lookup tables. A later node with a duplicate id replaces
    /// the earlier one.
    pub fn build(definition: WorkflowDefinition) -> Self {
        let mut nodes = HashMap::with_capacity(definition.nodes.len());
        for (i, node) in definition.nodes.iter().enumerate() {
            nodes.insert(node.id.clone(), i);
        }

        let mut adjacency: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, edge) in definition.edges.iter().enumerate() {
            adjacency.entry(edge.source.clone()).or_default().push(i);
        }

        Self {
            definition,
            nodes,
            adjacency,
        }
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(|&i| &self.definition.nodes[i])
    }

    /// Outgoing edges of a node, in edge-list order.
    pub fn outgoing(&self, id: &str) -> Vec<&Edge> {
        self.adjacency
            .get(id)
            .map(|indices| indices.iter().map(|&i| &self.definition.edges[i]).collect())
            .unwrap_or_default()
    }

    /// First node in definition order whose own kind is `trigger`.
    pub fn entry(&self) -> Option<&Node> {
        self.definition.nodes.iter().find(|node| node.is_trigger())
    }

    pub fn len(&self) -> usize {
        self.definition.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definition.nodes.is_empty()
    }
}
