//! FlowRunner - Workflow Execution Engine
//!
//! Executes user-defined automation workflows. A workflow is a directed graph
//! of nodes (a trigger plus actions such as HTTP requests, emails, delays and
//! conditionals) joined by edges. Each execution is recorded as a run with a
//! status, a timestamped log and a duration.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`graph`]: Graph model, JSON decoding and lookup index
//! - [`steps`]: The `Step` trait, registry and built-in step types
//! - [`run`]: Run records, run log and the lifecycle tracker
//! - [`store`]: Workflow and run persistence interfaces plus in-memory stores
//! - [`execution`]: The engine and the graph traversal
//! - [`config`]: Engine configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowrunner::{Engine, EngineConfig, WorkingContext};
//! use flowrunner::store::{MemoryRunStore, MemoryWorkflowStore, WorkflowRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflows = Arc::new(MemoryWorkflowStore::new());
//!     workflows
//!         .insert(WorkflowRecord::new("wf-1", "Signup", std::fs::read_to_string("signup.json")?))
//!         .await;
//!
//!     let engine = Engine::new(workflows, Arc::new(MemoryRunStore::new()), EngineConfig::default())?;
//!     let run_id = engine.start("wf-1", false, WorkingContext::new()).await?;
//!     engine.join(&run_id).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod graph;
pub mod run;
pub mod steps;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{EngineError, StepError};
pub use execution::Engine;
pub use graph::{load_definition, parse_definition, Edge, Node, WorkflowDefinition};
pub use run::{Run, RunStatus};
pub use steps::{Step, StepRegistry, WorkingContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FlowRunner";
