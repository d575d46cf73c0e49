//! Workflow Execution Module
//!
//! Runs stored workflows on background tasks and records their outcome.
//!
//! # Architecture
//!
//! - [`engine`]: Starts runs, owns their cancellation and drives the run lifecycle
//! - [`traversal`]: Depth-first walk over the graph with retries and branching

pub mod engine;
pub mod traversal;

pub use engine::Engine;
pub use traversal::{RetryPolicy, Traversal};
