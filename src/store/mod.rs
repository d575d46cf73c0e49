//! Persistence Interfaces
//!
//! The engine reads workflows and writes runs through these traits; the
//! surrounding application supplies database-backed implementations.
//! [`memory`] provides in-process ones for the CLI and tests.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::run::Run;

pub use memory::{MemoryRunStore, MemoryWorkflowStore};

/// Stored workflow as the engine sees it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowRecord {
    pub id: String,
    pub name: String,

    /// Serialized node/edge graph
    pub json_graph: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Upper bound on one run's traversal; 0 disables it
    #[serde(default = "default_max_timeout")]
    pub max_timeout_secs: u64,

    /// Extra attempts for a failing step
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default)]
    pub total_executions: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
}

fn default_active() -> bool {
    true
}

fn default_max_timeout() -> u64 {
    300
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    60
}

impl WorkflowRecord {
    /// Creates a record with the stock timeout and retry settings.
    pub fn new(id: impl Into<String>, name: impl Into<String>, json_graph: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            json_graph: json_graph.into(),
            active: default_active(),
            max_timeout_secs: default_max_timeout(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay(),
            total_executions: 0,
            success_count: 0,
            error_count: 0,
        }
    }

    pub fn with_retries(mut self, retry_count: u32, retry_delay_secs: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_delay_secs = retry_delay_secs;
        self
    }

    pub fn with_max_timeout(mut self, max_timeout_secs: u64) -> Self {
        self.max_timeout_secs = max_timeout_secs;
        self
    }
}

/// Read access to workflows plus their execution counters.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<WorkflowRecord, StoreError>;

    /// Atomically bumps `total_executions` and either the success or the
    /// error counter.
    async fn increment_execution_count(&self, id: &str, success: bool) -> Result<(), StoreError>;
}

/// Persistence for run records.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create(&self, run: &Run) -> Result<(), StoreError>;

    async fn update(&self, run: &Run) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Run, StoreError>;
}
