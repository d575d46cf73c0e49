//! Workflow Graph Model
//!
//! Data structures for a stored workflow graph. The serialized form is the
//! node/edge JSON produced by the visual editor:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "t1", "type": "trigger", "data": { "type": "webhook" },
//!       "position": { "x": 0, "y": 0 } },
//!     { "id": "n1", "type": "action",
//!       "data": { "type": "http_request", "config": { "url": "https://example.test" } },
//!       "position": { "x": 200, "y": 0 } }
//!   ],
//!   "edges": [ { "id": "e1", "source": "t1", "target": "n1" } ]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Node kind that marks the entry point of a graph.
pub const TRIGGER_KIND: &str = "trigger";

/// Reads an explicit `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A complete workflow graph.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WorkflowDefinition {
    /// Nodes in definition order
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Node>,

    /// Edges in definition order
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<Edge>,
}

impl WorkflowDefinition {
    /// Creates an empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node.
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Appends an edge between two node ids.
    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        let id = format!("e{}", self.edges.len() + 1);
        self.edges.push(Edge::new(id, source, target));
        self
    }

    /// Appends a pre-built edge.
    pub fn with_tagged_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Serializes the definition back to its stored JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 2D editor position. Carried through unchanged; never read by execution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// One step of a workflow graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Node {
    /// Identifier, unique within a definition
    pub id: String,

    /// Editor-level kind ("trigger", "action", "logic", ...)
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,

    /// Free-form node data; `data.type` and `data.config` are interpreted
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub position: Position,
}

impl Node {
    /// Creates a node with the given kind and no data.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            data: Map::new(),
            position: Position::default(),
        }
    }

    /// Creates a trigger node whose step type is `webhook`.
    pub fn trigger(id: impl Into<String>) -> Self {
        Self::new(id, TRIGGER_KIND).with_step_type("webhook")
    }

    /// Creates an action node bound to the given step type.
    pub fn action(id: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self::new(id, "action").with_step_type(step_type)
    }

    /// Sets the `data.type` override.
    pub fn with_step_type(mut self, step_type: impl Into<String>) -> Self {
        self.data
            .insert("type".to_string(), Value::String(step_type.into()));
        self
    }

    /// Sets the `data.config` mapping.
    pub fn with_config(mut self, config: Value) -> Self {
        self.data.insert("config".to_string(), config);
        self
    }

    /// Whether this node is an entry point candidate.
    pub fn is_trigger(&self) -> bool {
        self.kind == TRIGGER_KIND
    }

    /// Resolves the step type used for dispatch.
    ///
    /// A non-empty string at `data.type` wins over the node's own kind.
    pub fn step_kind(&self) -> StepKind {
        match self.data.get("type").and_then(Value::as_str) {
            Some(ty) if !ty.is_empty() => StepKind::parse(ty),
            _ => StepKind::parse(&self.kind),
        }
    }

    /// Step configuration, or `None` when `data.config` is absent or not an object.
    pub fn config(&self) -> Option<&Map<String, Value>> {
        self.data.get("config").and_then(Value::as_object)
    }

    /// Looks up a single configuration value.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config().and_then(|config| config.get(key))
    }

    /// Looks up a configuration string, treating empty strings as absent.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config_value(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Directed link between two nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Edge {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    pub source: String,

    pub target: String,

    /// Output handle on the source node; used as the branch tag for `if` nodes
    #[serde(
        rename = "sourceHandle",
        alias = "source_handle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
        }
    }

    /// Tags the edge with a source handle.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Branch value this edge is tagged with, if it is a `true`/`false` edge.
    pub fn branch(&self) -> Option<bool> {
        match self.source_handle.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        }
    }
}

/// Resolved step type of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepKind {
    Trigger,
    Webhook,
    HttpRequest,
    Email,
    Delay,
    If,
    /// Any type without a built-in implementation
    Custom(String),
}

impl StepKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "trigger" => Self::Trigger,
            "webhook" => Self::Webhook,
            "http_request" => Self::HttpRequest,
            "email" => Self::Email,
            "delay" => Self::Delay,
            "if" => Self::If,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Registry key for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Trigger => "trigger",
            Self::Webhook => "webhook",
            Self::HttpRequest => "http_request",
            Self::Email => "email",
            Self::Delay => "delay",
            Self::If => "if",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
