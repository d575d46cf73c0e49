//! Workflow Execution Engine
//!
//! Entry point for running stored workflows. [`Engine::start`] loads the
//! workflow, records a pending run and returns its id right away; the run
//! itself executes on a background task that:
//!
//! 1. Moves the run to `running`
//! 2. Parses the stored graph and finds the first trigger node
//! 3. Walks the graph, dispatching each node to its step
//! 4. Finalizes the run as `success` or `failed` with log and duration
//!
//! Only an unknown workflow id is reported back to the caller. Every other
//! failure is recorded on the run, which callers read through the run store.
//!
//! Each run gets its own cancellation token, independent of the caller, so
//! dropping the caller does not stop a started run but [`Engine::cancel`] does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::traversal::{RetryPolicy, Traversal};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::{parse_definition, GraphIndex};
use crate::run::{Run, RunLog, RunTracker};
use crate::steps::{StepContext, StepRegistry, WorkingContext};
use crate::store::{RunStore, WorkflowRecord, WorkflowStore};

/// Cancellation tokens of runs that are still executing.
#[derive(Clone, Default)]
struct ActiveRuns {
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ActiveRuns {
    async fn register(&self, run_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .await
            .insert(run_id.to_string(), token.clone());
        token
    }

    async fn cancel(&self, run_id: &str) -> bool {
        match self.tokens.lock().await.get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn contains(&self, run_id: &str) -> bool {
        self.tokens.lock().await.contains_key(run_id)
    }

    async fn unregister(&self, run_id: &str) {
        self.tokens.lock().await.remove(run_id);
    }
}

/// Workflow execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use flowrunner::config::EngineConfig;
/// use flowrunner::execution::Engine;
/// use flowrunner::steps::WorkingContext;
/// use flowrunner::store::{MemoryRunStore, MemoryWorkflowStore, WorkflowRecord};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflows = Arc::new(MemoryWorkflowStore::new());
///     let runs = Arc::new(MemoryRunStore::new());
///     workflows
///         .insert(WorkflowRecord::new("wf-1", "Demo", std::fs::read_to_string("graph.json")?))
///         .await;
///
///     let engine = Engine::new(workflows, runs, EngineConfig::default())?;
///     let run_id = engine.start("wf-1", true, WorkingContext::new()).await?;
///     engine.join(&run_id).await?;
///
///     let run = engine.run_record(&run_id).await?;
///     println!("{}: {}", run.status, run.log);
///     Ok(())
/// }
/// ```
pub struct Engine {
    workflows: Arc<dyn WorkflowStore>,
    runs: Arc<dyn RunStore>,
    registry: Arc<StepRegistry>,
    config: EngineConfig,
    active: ActiveRuns,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Engine {
    /// Creates an engine with the built-in steps.
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        runs: Arc<dyn RunStore>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let registry = StepRegistry::with_builtins(&config).map_err(EngineError::Setup)?;
        Ok(Self::with_registry(workflows, runs, registry, config))
    }

    /// Creates an engine that dispatches through `registry`.
    pub fn with_registry(
        workflows: Arc<dyn WorkflowStore>,
        runs: Arc<dyn RunStore>,
        registry: StepRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            workflows,
            runs,
            registry: Arc::new(registry),
            config,
            active: ActiveRuns::default(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Starts a run of `workflow_id` and returns its id without waiting for it.
    ///
    /// # Returns
    ///
    /// * `Ok(run_id)` - The run was recorded as pending and scheduled
    /// * `Err(EngineError::NotFound)` - No such workflow
    pub async fn start(
        &self,
        workflow_id: &str,
        is_test: bool,
        seed: WorkingContext,
    ) -> Result<String, EngineError> {
        let workflow = self.workflows.find_by_id(workflow_id).await?;
        let tracker = RunTracker::create(
            Arc::clone(&self.runs),
            Arc::clone(&self.workflows),
            &workflow.id,
            is_test,
        )
        .await?;

        let run_id = tracker.run_id().to_string();
        let cancel = self.active.register(&run_id).await;

        info!(
            "Starting run {} of workflow '{}' ({})",
            run_id,
            workflow.name,
            if is_test { "test" } else { "live" }
        );

        let job = RunJob {
            policy: RunPolicy::for_workflow(&workflow, &self.config),
            workflow,
            tracker,
            seed,
            cancel,
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        };

        let active = self.active.clone();
        let runs = Arc::clone(&self.runs);
        let workflows = Arc::clone(&self.workflows);
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            // A job that panics still gets its run failed and unregistered
            if let Err(e) = tokio::spawn(job.execute()).await {
                let err = EngineError::TaskAborted {
                    run_id: task_run_id.clone(),
                    reason: e.to_string(),
                };
                error!("{}", err);
                if let Err(e) = RunTracker::abandon(
                    runs.as_ref(),
                    workflows.as_ref(),
                    &task_run_id,
                    failure_message(&err),
                )
                .await
                {
                    error!("Run {} could not be marked failed: {}", task_run_id, e);
                }
            }
            active.unregister(&task_run_id).await;
        });

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(run_id.clone(), handle);

        Ok(run_id)
    }

    /// Requests cancellation of an in-flight run. Returns false when the run
    /// is unknown or already finished.
    pub async fn cancel(&self, run_id: &str) -> bool {
        let cancelled = self.active.cancel(run_id).await;
        if cancelled {
            info!("Cancellation requested for run {}", run_id);
        }
        cancelled
    }

    /// Whether the run's background task is still executing.
    pub async fn is_active(&self, run_id: &str) -> bool {
        self.active.contains(run_id).await
    }

    /// Waits for a run's background task to finish. Returns immediately for
    /// runs that already finished or were joined before.
    pub async fn join(&self, run_id: &str) -> Result<(), EngineError> {
        let handle = self.tasks.lock().await.remove(run_id);
        match handle {
            Some(handle) => handle.await.map_err(|e| EngineError::TaskAborted {
                run_id: run_id.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Reads the current run record.
    pub async fn run_record(&self, run_id: &str) -> Result<Run, EngineError> {
        self.runs.find_by_id(run_id).await.map_err(EngineError::Store)
    }
}

/// Limits derived from the workflow's stored settings.
#[derive(Debug, Clone, Copy)]
struct RunPolicy {
    retry: RetryPolicy,
    timeout: Option<Duration>,
}

impl RunPolicy {
    fn for_workflow(workflow: &WorkflowRecord, config: &EngineConfig) -> Self {
        let retry = if config.honor_retries {
            RetryPolicy::new(
                workflow.retry_count,
                Duration::from_secs(workflow.retry_delay_secs),
            )
        } else {
            RetryPolicy::none()
        };

        let timeout = (config.honor_run_timeout && workflow.max_timeout_secs > 0)
            .then(|| Duration::from_secs(workflow.max_timeout_secs));

        Self { retry, timeout }
    }
}

/// Everything one background run needs, owned by its task.
struct RunJob {
    workflow: WorkflowRecord,
    tracker: RunTracker,
    seed: WorkingContext,
    cancel: CancellationToken,
    registry: Arc<StepRegistry>,
    config: EngineConfig,
    policy: RunPolicy,
}

impl RunJob {
    async fn execute(mut self) {
        if let Err(e) = self.tracker.begin().await {
            error!("Run {} could not start: {}", self.tracker.run_id(), e);
            return;
        }

        let mut log = RunLog::new();
        let outcome = self.traverse(&mut log).await;
        let run_id = self.tracker.run_id().to_string();

        let finalized = match outcome {
            Ok(()) => {
                info!("Run {} completed successfully", run_id);
                self.tracker.succeed(&log).await
            }
            Err(err) => {
                let message = failure_message(&err);
                warn!("Run {} failed: {}", run_id, message);
                self.tracker.fail(&log, message).await
            }
        };

        if let Err(e) = finalized {
            error!("Run {} could not be finalized: {}", run_id, e);
        }
    }

    async fn traverse(&mut self, log: &mut RunLog) -> Result<(), EngineError> {
        let definition = parse_definition(&self.workflow.json_graph)?;
        let graph = GraphIndex::build(definition);
        let entry = graph.entry().ok_or(EngineError::NoEntryNode)?;
        debug!(
            "Run {}: walking {} nodes from '{}'",
            self.tracker.run_id(),
            graph.len(),
            entry.id
        );

        let ctx = StepContext::new(self.tracker.run_id(), self.cancel.clone());
        let traversal = Traversal::new(&graph, &self.registry, &ctx)
            .with_branching(self.config.branching)
            .with_retry(self.policy.retry);

        let mut context = std::mem::take(&mut self.seed);
        let timeout = self.policy.timeout;

        let walk = async {
            let run = traversal.run(entry, &mut context, log);
            match timeout {
                Some(limit) => tokio::time::timeout(limit, run)
                    .await
                    .unwrap_or_else(|_| Err(EngineError::Timeout(limit.as_secs()))),
                None => run.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            result = walk => result,
        }
    }
}

/// Message stored on a failed run.
fn failure_message(err: &EngineError) -> String {
    match err {
        EngineError::MalformedDefinition(e) => format!("Failed to parse workflow: {}", e),
        EngineError::NoEntryNode => err.to_string(),
        other => format!("Execution failed: {}", other),
    }
}
