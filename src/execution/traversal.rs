//! Graph Traversal
//!
//! Walks a workflow graph depth-first from its entry node, pre-order, in
//! edge-list order. Each node's step runs against the shared working
//! context and its output is merged back before the node's successors are
//! visited. The first failure aborts the walk; side effects of steps that
//! already ran are not undone.
//!
//! The walk keeps an explicit stack instead of recursing, and tracks the
//! nodes on the current path so a cycle fails the run instead of looping.
//! A node reachable along two different paths runs once per path.

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;

use crate::config::BranchingMode;
use crate::error::{EngineError, StepError};
use crate::graph::{Edge, GraphIndex, Node, StepKind};
use crate::run::RunLog;
use crate::steps::{Step, StepContext, StepRegistry, WorkingContext, CONDITION_RESULT_KEY};

/// Per-step retry settings for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

enum Frame<'g> {
    Enter(&'g str),
    Exit(&'g str),
}

/// One depth-first walk over a graph.
pub struct Traversal<'a> {
    graph: &'a GraphIndex,
    registry: &'a StepRegistry,
    ctx: &'a StepContext,
    branching: BranchingMode,
    retry: RetryPolicy,
}

impl<'a> Traversal<'a> {
    pub fn new(graph: &'a GraphIndex, registry: &'a StepRegistry, ctx: &'a StepContext) -> Self {
        Self {
            graph,
            registry,
            ctx,
            branching: BranchingMode::default(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_branching(mut self, branching: BranchingMode) -> Self {
        self.branching = branching;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Walks every node reachable from `entry`.
    pub async fn run(
        &self,
        entry: &'a Node,
        context: &mut WorkingContext,
        log: &mut RunLog,
    ) -> Result<(), EngineError> {
        let mut stack = vec![Frame::Enter(entry.id.as_str())];
        let mut path: HashSet<&'a str> = HashSet::new();

        while let Some(frame) = stack.pop() {
            let id = match frame {
                Frame::Exit(id) => {
                    path.remove(id);
                    continue;
                }
                Frame::Enter(id) => id,
            };

            if self.ctx.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let node = self
                .graph
                .node(id)
                .ok_or_else(|| EngineError::UnknownNode(id.to_string()))?;

            if !path.insert(id) {
                return Err(EngineError::CycleDetected(id.to_string()));
            }

            let branch = self.visit(node, context, log).await?;

            // Exit sits below the successors so the node leaves the path
            // only once its whole subtree is done
            stack.push(Frame::Exit(id));
            for edge in self.next_edges(node, branch, log).into_iter().rev() {
                stack.push(Frame::Enter(edge.target.as_str()));
            }
        }

        Ok(())
    }

    /// Runs one node and merges its output. Returns the condition result
    /// for `if` nodes.
    async fn visit(
        &self,
        node: &Node,
        context: &mut WorkingContext,
        log: &mut RunLog,
    ) -> Result<Option<bool>, EngineError> {
        let kind = node.step_kind();
        log.node_started(&node.id);

        let step = self
            .registry
            .resolve(kind.as_str())
            .ok_or_else(|| EngineError::UnknownStepType(kind.to_string()))?;

        let output = self.execute_with_retry(step.as_ref(), node, context, log).await?;
        log.node_completed(&node.id);

        let branch = match kind {
            StepKind::If => output.get(CONDITION_RESULT_KEY).and_then(Value::as_bool),
            _ => None,
        };

        debug!("Node '{}' produced {} output keys", node.id, output.len());
        context.extend(output);
        Ok(branch)
    }

    async fn execute_with_retry(
        &self,
        step: &dyn Step,
        node: &Node,
        context: &WorkingContext,
        log: &mut RunLog,
    ) -> Result<WorkingContext, EngineError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;

        loop {
            let err = match step.execute(self.ctx, node, context).await {
                Ok(output) => return Ok(output),
                Err(err) => err,
            };

            log.node_failed(&node.id, &err);
            if attempt >= max_attempts || !err.is_retryable() {
                return Err(EngineError::StepExecutionFailure {
                    node_id: node.id.clone(),
                    source: err,
                });
            }

            warn!(
                "Node '{}' failed on attempt {}/{}: {}",
                node.id, attempt, max_attempts, err
            );
            self.wait_before_retry(node).await?;

            attempt += 1;
            log.node_retrying(&node.id, attempt, max_attempts);
        }
    }

    async fn wait_before_retry(&self, node: &Node) -> Result<(), EngineError> {
        if self.retry.delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.ctx.cancel.cancelled() => Err(EngineError::StepExecutionFailure {
                node_id: node.id.clone(),
                source: StepError::Cancelled,
            }),
            _ = tokio::time::sleep(self.retry.delay) => Ok(()),
        }
    }

    /// Outgoing edges to follow. In tagged mode an `if` node's `true`/`false`
    /// edges are kept only when they match its result; untagged edges always are.
    fn next_edges(&self, node: &Node, branch: Option<bool>, log: &mut RunLog) -> Vec<&'a Edge> {
        let edges = self.graph.outgoing(&node.id);

        let (BranchingMode::Tagged, Some(result)) = (self.branching, branch) else {
            return edges;
        };

        let (taken, skipped): (Vec<&Edge>, Vec<&Edge>) = edges
            .into_iter()
            .partition(|edge| edge.branch().map_or(true, |tag| tag == result));

        for edge in skipped {
            log.node_skipped(&edge.target, "branch not taken");
        }
        taken
    }
}
