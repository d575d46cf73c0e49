//! Condition Evaluation
//!
//! `if` nodes carry a `condition` of the form `left==right`. The left side
//! names a working-context variable; its string form is compared with the
//! trimmed right side. Anything that does not fit that shape is false.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::interpolate::value_to_string;
use super::{Step, StepContext, WorkingContext};
use crate::error::StepError;
use crate::graph::Node;

/// Output key holding the boolean result of an `if` node.
pub const CONDITION_RESULT_KEY: &str = "condition_result";

/// Evaluates a `left==right` condition against the working context.
pub fn evaluate_condition(condition: &str, context: &WorkingContext) -> bool {
    let parts: Vec<&str> = condition.split("==").collect();
    let [left, right] = parts.as_slice() else {
        return false;
    };

    match context.get(left.trim()) {
        Some(value) => value_to_string(value) == right.trim(),
        None => false,
    }
}

/// Computes a condition and reports it as `condition_result`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IfStep;

#[async_trait]
impl Step for IfStep {
    async fn execute(
        &self,
        _ctx: &StepContext,
        node: &Node,
        input: &WorkingContext,
    ) -> Result<WorkingContext, StepError> {
        let condition = node
            .config_value("condition")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let result = evaluate_condition(condition, input);

        debug!("Node '{}': condition '{}' -> {}", node.id, condition, result);

        let mut output = WorkingContext::new();
        output.insert(CONDITION_RESULT_KEY.to_string(), Value::Bool(result));
        Ok(output)
    }
}
