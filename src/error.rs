//! Error Types
//!
//! Every failure the engine can observe, from graph decoding through step
//! execution to persistence. Only [`EngineError::NotFound`] is ever returned
//! to the caller of `Engine::start`; the rest end up as the message of a
//! failed run.

use thiserror::Error;

/// Failure to decode a stored workflow graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{0}")]
    MalformedDefinition(#[from] serde_json::Error),

    #[error("Failed to read workflow graph '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure raised by a single step implementation.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{0}")]
    MissingConfig(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("failed to send email: {0}")]
    Email(String),

    #[error("execution cancelled")]
    Cancelled,
}

impl StepError {
    /// Whether running the step again could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus { .. } | Self::Email(_)
        )
    }
}

/// Failure reported by a workflow or run store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("store error: {0}")]
    Backend(String),
}

/// Failure loading the engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Engine-level failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    MalformedDefinition(#[from] GraphError),

    #[error("No trigger node found")]
    NoEntryNode,

    #[error("unknown node type: {0}")]
    UnknownStepType(String),

    #[error("edge target not found: {0}")]
    UnknownNode(String),

    #[error("{source}")]
    StepExecutionFailure {
        node_id: String,
        #[source]
        source: StepError,
    },

    #[error("cycle detected at node {0}")]
    CycleDetected(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution timed out after {0}s")]
    Timeout(u64),

    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition {
        from: crate::run::RunStatus,
        to: crate::run::RunStatus,
    },

    #[error("failed to set up built-in steps: {0}")]
    Setup(#[source] StepError),

    #[error("run task for {run_id} ended abnormally: {reason}")]
    TaskAborted { run_id: String, reason: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}
