//! In-memory stores.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RunStore, WorkflowRecord, WorkflowStore};
use crate::error::StoreError;
use crate::run::Run;

#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: RwLock<HashMap<String, WorkflowRecord>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a workflow.
    pub async fn insert(&self, workflow: WorkflowRecord) {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow);
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn find_by_id(&self, id: &str) -> Result<WorkflowRecord, StoreError> {
        self.workflows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "workflow",
                id: id.to_string(),
            })
    }

    async fn increment_execution_count(&self, id: &str, success: bool) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "workflow",
            id: id.to_string(),
        })?;

        workflow.total_executions += 1;
        if success {
            workflow.success_count += 1;
        } else {
            workflow.error_count += 1;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<String, Run>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All runs of one workflow, oldest first.
    pub async fn list_for_workflow(&self, workflow_id: &str) -> Vec<Run> {
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .await
            .values()
            .filter(|run| run.workflow_id == workflow_id)
            .cloned()
            .collect();
        runs.sort_by_key(|run| run.created_at);
        runs
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(StoreError::Backend(format!("run '{}' already exists", run.id)));
        }
        runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn update(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "run",
                id: run.id.clone(),
            }),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Run, StoreError> {
        self.runs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "run",
                id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_find_workflow() {
        let store = MemoryWorkflowStore::new();
        store.insert(WorkflowRecord::new("wf-1", "Demo", "{}")).await;

        let found = store.find_by_id("wf-1").await.unwrap();
        assert_eq!(found.name, "Demo");
        assert_eq!(found.retry_count, 3);
        assert_eq!(found.max_timeout_secs, 300);

        assert!(matches!(
            store.find_by_id("nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_counter_increments() {
        let store = Arc::new(MemoryWorkflowStore::new());
        store.insert(WorkflowRecord::new("wf-1", "Demo", "{}")).await;

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment_execution_count("wf-1", i % 5 != 0).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let wf = store.find_by_id("wf-1").await.unwrap();
        assert_eq!(wf.total_executions, 50);
        assert_eq!(wf.success_count, 40);
        assert_eq!(wf.error_count, 10);
    }

    #[tokio::test]
    async fn test_increment_unknown_workflow() {
        let store = MemoryWorkflowStore::new();
        assert!(store.increment_execution_count("ghost", true).await.is_err());
    }

    #[tokio::test]
    async fn test_run_create_update_find() {
        let store = MemoryRunStore::new();
        let mut run = Run::new("wf-1", false);

        store.create(&run).await.unwrap();
        assert!(store.create(&run).await.is_err(), "duplicate create");

        run.status = RunStatus::Running;
        store.update(&run).await.unwrap();
        assert_eq!(store.find_by_id(&run.id).await.unwrap().status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_update_unknown_run() {
        let store = MemoryRunStore::new();
        let run = Run::new("wf-1", false);
        assert!(matches!(
            store.update(&run).await,
            Err(StoreError::NotFound { entity: "run", .. })
        ));
    }

    #[tokio::test]
    async fn test_list_for_workflow() {
        let store = MemoryRunStore::new();
        store.create(&Run::new("wf-1", false)).await.unwrap();
        store.create(&Run::new("wf-2", false)).await.unwrap();
        store.create(&Run::new("wf-1", true)).await.unwrap();

        assert_eq!(store.list_for_workflow("wf-1").await.len(), 2);
        assert!(store.list_for_workflow("wf-3").await.is_empty());
    }
}
