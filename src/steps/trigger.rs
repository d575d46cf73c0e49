//! Trigger / webhook passthrough.

use async_trait::async_trait;

use super::{Step, StepContext, WorkingContext};
use crate::error::StepError;
use crate::graph::Node;

/// Entry step: hands the seed input on unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TriggerStep;

#[async_trait]
impl Step for TriggerStep {
    async fn execute(
        &self,
        _ctx: &StepContext,
        _node: &Node,
        input: &WorkingContext,
    ) -> Result<WorkingContext, StepError> {
        Ok(input.clone())
    }
}
