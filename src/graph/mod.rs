//! Workflow Graph Module
//!
//! Data structures and decoding for stored workflow graphs.
//!
//! # Structure
//!
//! - [`model`]: Node, Edge and definition types
//! - [`parser`]: JSON decoding and file loading
//! - [`index`]: Lookup tables used during traversal

pub mod index;
pub mod model;
pub mod parser;

pub use index::GraphIndex;
pub use model::{Edge, Node, Position, StepKind, WorkflowDefinition, TRIGGER_KIND};
pub use parser::{load_definition, parse_definition};
