//! Delay step: pauses the run, observing cancellation.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::{Step, StepContext, WorkingContext};
use crate::error::StepError;
use crate::graph::Node;

const DEFAULT_DELAY_SECS: f64 = 1.0;

/// Suspends the run for `seconds` (default 1).
#[derive(Debug, Default, Clone, Copy)]
pub struct DelayStep;

impl DelayStep {
    /// Delay configured on a node. Negative values clamp to zero; a missing
    /// or non-numeric value uses the default.
    pub fn duration_for(node: &Node) -> Duration {
        let seconds = node
            .config_value("seconds")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_DELAY_SECS);
        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }
}

#[async_trait]
impl Step for DelayStep {
    async fn execute(
        &self,
        ctx: &StepContext,
        node: &Node,
        _input: &WorkingContext,
    ) -> Result<WorkingContext, StepError> {
        let duration = Self::duration_for(node);
        debug!("Node '{}': sleeping for {:?}", node.id, duration);

        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(StepError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(WorkingContext::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_duration_parsing() {
        let node = |config| Node::action("d", "delay").with_config(config);

        assert_eq!(DelayStep::duration_for(&Node::action("d", "delay")), Duration::from_secs(1));
        assert_eq!(DelayStep::duration_for(&node(json!({}))), Duration::from_secs(1));
        assert_eq!(DelayStep::duration_for(&node(json!({"seconds": 0}))), Duration::ZERO);
        assert_eq!(DelayStep::duration_for(&node(json!({"seconds": 2}))), Duration::from_secs(2));
        assert_eq!(
            DelayStep::duration_for(&node(json!({"seconds": 0.25}))),
            Duration::from_millis(250)
        );
        assert_eq!(DelayStep::duration_for(&node(json!({"seconds": -3}))), Duration::ZERO);
        assert_eq!(DelayStep::duration_for(&node(json!({"seconds": "5"}))), Duration::from_secs(1));
        assert_eq!(DelayStep::duration_for(&node(json!({"seconds": null}))), Duration::from_secs(1));
        assert_eq!(DelayStep::duration_for(&node(json!({"seconds": true}))), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_delay_completes() {
        let node = Node::action("d", "delay").with_config(json!({"seconds": 0}));
        let output = DelayStep
            .execute(&StepContext::detached(), &node, &WorkingContext::new())
            .await
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_delay() {
        let token = CancellationToken::new();
        let ctx = StepContext::new("run-1", token.clone());
        let node = Node::action("d", "delay").with_config(json!({"seconds": 30}));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let started = Instant::now();
        let result = DelayStep.execute(&ctx, &node, &WorkingContext::new()).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(StepError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let node = Node::action("d", "delay").with_config(json!({"seconds": 10}));

        let result = DelayStep
            .execute(&StepContext::new("run-1", token), &node, &WorkingContext::new())
            .await;
        assert!(matches!(result, Err(StepError::Cancelled)));
    }
}
