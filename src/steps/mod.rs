//! Step Implementations
//!
//! A step is the executable behaviour bound to a node type. The engine
//! resolves each node's type through a [`StepRegistry`] and hands the step
//! the node plus the run's working context; whatever the step returns is
//! merged back into that context.
//!
//! # Structure
//!
//! - [`registry`]: Type-name to step lookup
//! - [`interpolate`]: `{{name}}` placeholder substitution
//! - [`condition`]: `left==right` evaluation for `if` nodes
//! - [`trigger`], [`http`], [`email`], [`delay`]: built-in steps

pub mod condition;
pub mod delay;
pub mod email;
pub mod http;
pub mod interpolate;
pub mod registry;
pub mod trigger;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::graph::Node;

pub use condition::{evaluate_condition, IfStep, CONDITION_RESULT_KEY};
pub use delay::DelayStep;
pub use email::{EmailStep, Mailer, OutgoingEmail, SmtpMailer, SmtpSettings};
pub use http::HttpRequestStep;
pub use interpolate::interpolate;
pub use registry::StepRegistry;
pub use trigger::TriggerStep;

/// Variable name to value mapping shared by all nodes of one run.
pub type WorkingContext = Map<String, Value>;

/// Per-run information available to a step while it executes.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: String,
    pub cancel: CancellationToken,
}

impl StepContext {
    pub fn new(run_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            run_id: run_id.into(),
            cancel,
        }
    }

    /// Context with a fresh token, for running a step outside the engine.
    pub fn detached() -> Self {
        Self::new("detached", CancellationToken::new())
    }
}

/// Executable behaviour of a node type.
#[async_trait]
pub trait Step: Send + Sync {
    /// Runs the step and returns the fragment to merge into the working context.
    async fn execute(
        &self,
        ctx: &StepContext,
        node: &Node,
        input: &WorkingContext,
    ) -> Result<WorkingContext, StepError>;
}
