//! Workflow Graph Parser
//!
//! Decodes stored graph strings into [`WorkflowDefinition`]s. Only the shape
//! is checked here: cycles, dangling edges and duplicate ids are left for
//! the engine to trip over at run time.

use std::fs;

use log::debug;

use super::model::WorkflowDefinition;
use crate::error::GraphError;

/// Parses a serialized workflow graph.
///
/// # Example
///
/// ```
/// use flowrunner::graph::parse_definition;
///
/// let definition = parse_definition(r#"{"nodes": [{"id": "t1", "type": "trigger"}], "edges": []}"#)
///     .unwrap();
/// assert_eq!(definition.nodes.len(), 1);
/// ```
pub fn parse_definition(serialized: &str) -> Result<WorkflowDefinition, GraphError> {
    let definition: WorkflowDefinition = serde_json::from_str(serialized)?;

    debug!(
        "Parsed workflow graph: {} nodes, {} edges",
        definition.nodes.len(),
        definition.edges.len()
    );

    Ok(definition)
}

/// Reads a graph file from disk and returns its raw contents after checking
/// that it parses.
pub fn load_definition(path: &str) -> Result<(String, WorkflowDefinition), GraphError> {
    let content = fs::read_to_string(path).map_err(|source| GraphError::Io {
        path: path.to_string(),
        source,
    })?;
    let definition = parse_definition(&content)?;
    Ok((content, definition))
}
