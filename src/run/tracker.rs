//! Run Tracker
//!
//! Owns the [`Run`] record for one invocation and drives it through its
//! state machine. Every transition is written to the run store; reaching a
//! terminal state also bumps the workflow's execution counters.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error};

use super::log::RunLog;
use super::record::{Run, RunStatus};
use crate::error::EngineError;
use crate::store::{RunStore, WorkflowStore};

pub struct RunTracker {
    run: Run,
    runs: Arc<dyn RunStore>,
    workflows: Arc<dyn WorkflowStore>,
}

impl RunTracker {
    /// Creates and persists a pending run.
    pub async fn create(
        runs: Arc<dyn RunStore>,
        workflows: Arc<dyn WorkflowStore>,
        workflow_id: &str,
        is_test: bool,
    ) -> Result<Self, EngineError> {
        let run = Run::new(workflow_id, is_test);
        runs.create(&run).await.map_err(EngineError::Store)?;
        debug!("Created run {} for workflow {}", run.id, workflow_id);

        Ok(Self {
            run,
            runs,
            workflows,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run.id
    }

    /// Fails a run whose task ended without finalizing it. Runs that already
    /// reached a terminal state are left alone.
    pub async fn abandon(
        runs: &dyn RunStore,
        workflows: &dyn WorkflowStore,
        run_id: &str,
        message: impl Into<String>,
    ) -> Result<(), EngineError> {
        let mut run = runs.find_by_id(run_id).await.map_err(EngineError::Store)?;
        if run.status.is_terminal() {
            return Ok(());
        }

        run.status = RunStatus::Failed;
        run.ended_at = Some(Utc::now());
        run.duration_secs = run.compute_duration();
        run.error_message = Some(message.into());
        runs.update(&run).await.map_err(EngineError::Store)?;

        if let Err(e) = workflows
            .increment_execution_count(&run.workflow_id, false)
            .await
        {
            error!(
                "Failed to update execution counters for workflow {}: {}",
                run.workflow_id, e
            );
        }
        Ok(())
    }

    /// `pending -> running`, recording the start time.
    pub async fn begin(&mut self) -> Result<(), EngineError> {
        self.check(RunStatus::Running)?;
        self.run.status = RunStatus::Running;
        self.run.started_at = Some(Utc::now());
        self.persist().await;
        Ok(())
    }

    /// `running -> success`, recording end time, duration and log.
    pub async fn succeed(&mut self, log: &RunLog) -> Result<(), EngineError> {
        self.finish(RunStatus::Success, log, None).await
    }

    /// `running -> failed`, recording end time, duration, log and message.
    pub async fn fail(&mut self, log: &RunLog, message: impl Into<String>) -> Result<(), EngineError> {
        self.finish(RunStatus::Failed, log, Some(message.into()))
            .await
    }

    async fn finish(
        &mut self,
        status: RunStatus,
        log: &RunLog,
        message: Option<String>,
    ) -> Result<(), EngineError> {
        self.check(status)?;

        self.run.status = status;
        self.run.ended_at = Some(Utc::now());
        self.run.duration_secs = self.run.compute_duration();
        self.run.log = log.render();
        self.run.error_message = message;
        self.persist().await;

        let success = status == RunStatus::Success;
        if let Err(e) = self
            .workflows
            .increment_execution_count(&self.run.workflow_id, success)
            .await
        {
            error!(
                "Failed to update execution counters for workflow {}: {}",
                self.run.workflow_id, e
            );
        }
        Ok(())
    }

    fn check(&self, next: RunStatus) -> Result<(), EngineError> {
        if self.run.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: self.run.status,
                to: next,
            })
        }
    }

    async fn persist(&self) {
        debug!("Run {} -> {}", self.run.id, self.run.status);
        if let Err(e) = self.runs.update(&self.run).await {
            error!("Failed to persist run {}: {}", self.run.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRunStore, MemoryWorkflowStore, WorkflowRecord};

    async fn setup() -> (Arc<MemoryRunStore>, Arc<MemoryWorkflowStore>, RunTracker) {
        let runs = Arc::new(MemoryRunStore::new());
        let workflows = Arc::new(MemoryWorkflowStore::new());
        workflows.insert(WorkflowRecord::new("wf-1", "Demo", "{}")).await;

        let tracker = RunTracker::create(runs.clone(), workflows.clone(), "wf-1", false)
            .await
            .unwrap();
        (runs, workflows, tracker)
    }

    #[tokio::test]
    async fn test_created_pending_and_persisted() {
        let (runs, _, tracker) = setup().await;
        let stored = runs.find_by_id(tracker.run_id()).await.unwrap();
        assert_eq!(stored.status, RunStatus::Pending);
        assert!(stored.ended_at.is_none());
    }

    #[tokio::test]
    async fn test_success_path() {
        let (runs, workflows, mut tracker) = setup().await;
        let mut log = RunLog::new();
        log.node_started("t1");

        tracker.begin().await.unwrap();
        let stored = runs.find_by_id(tracker.run_id()).await.unwrap();
        assert_eq!(stored.status, RunStatus::Running);
        assert!(stored.started_at.is_some());
        assert!(stored.ended_at.is_none());

        tracker.succeed(&log).await.unwrap();
        let stored = runs.find_by_id(tracker.run_id()).await.unwrap();
        assert_eq!(stored.status, RunStatus::Success);
        assert!(stored.ended_at.is_some());
        assert!(stored.duration_secs.unwrap() >= 0);
        assert!(stored.log.contains("Node t1 started"));
        assert!(stored.error_message.is_none());

        let wf = workflows.find_by_id("wf-1").await.unwrap();
        assert_eq!((wf.total_executions, wf.success_count, wf.error_count), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_failure_path() {
        let (runs, workflows, mut tracker) = setup().await;

        tracker.begin().await.unwrap();
        tracker.fail(&RunLog::new(), "No trigger node found").await.unwrap();

        let stored = runs.find_by_id(tracker.run_id()).await.unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("No trigger node found"));
        assert!(stored.ended_at.is_some());

        let wf = workflows.find_by_id("wf-1").await.unwrap();
        assert_eq!((wf.total_executions, wf.success_count, wf.error_count), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_cannot_finish_before_running() {
        let (_, workflows, mut tracker) = setup().await;

        let err = tracker.succeed(&RunLog::new()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: RunStatus::Pending,
                to: RunStatus::Success
            }
        ));
        assert_eq!(workflows.find_by_id("wf-1").await.unwrap().total_executions, 0);
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let (runs, workflows, mut tracker) = setup().await;
        tracker.begin().await.unwrap();
        tracker.succeed(&RunLog::new()).await.unwrap();

        assert!(tracker.fail(&RunLog::new(), "late").await.is_err());
        assert!(tracker.begin().await.is_err());

        let stored = runs.find_by_id(tracker.run_id()).await.unwrap();
        assert_eq!(stored.status, RunStatus::Success);
        assert_eq!(workflows.find_by_id("wf-1").await.unwrap().total_executions, 1);
    }

    #[tokio::test]
    async fn test_abandon_fails_unfinished_run() {
        let (runs, workflows, mut tracker) = setup().await;
        tracker.begin().await.unwrap();

        RunTracker::abandon(runs.as_ref(), workflows.as_ref(), tracker.run_id(), "task died")
            .await
            .unwrap();

        let stored = runs.find_by_id(tracker.run_id()).await.unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("task died"));
        assert!(stored.ended_at.is_some());

        let wf = workflows.find_by_id("wf-1").await.unwrap();
        assert_eq!((wf.total_executions, wf.success_count, wf.error_count), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_abandon_keeps_finished_run() {
        let (runs, workflows, mut tracker) = setup().await;
        tracker.begin().await.unwrap();
        tracker.succeed(&RunLog::new()).await.unwrap();

        RunTracker::abandon(runs.as_ref(), workflows.as_ref(), tracker.run_id(), "late")
            .await
            .unwrap();

        let stored = runs.find_by_id(tracker.run_id()).await.unwrap();
        assert_eq!(stored.status, RunStatus::Success);
        assert_eq!(workflows.find_by_id("wf-1").await.unwrap().total_executions, 1);
    }
}
