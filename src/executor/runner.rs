//! Background task manager
//!
//! Tasks are admitted in schedule order by a single dispatcher loop. Each
//! admitted task holds one semaphore permit from `Running` until it reaches
//! a terminal status, so at most `max_concurrent` tasks run at once.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ReasonerConfig;
use crate::error::{Error, Result};
use crate::types::{TaskId, TaskParameters, TaskStatus, TaskType, ValidationMode};

use super::dispatch::{self, DispatchContext, DispatchError, TaskResult};
use super::state::{Task, TaskRegistry, TaskStats};

// ─────────────────────────────────────────────────────────────────
// Manager Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the task manager
#[derive(Debug, Clone)]
pub struct TaskManagerConfig {
    /// Worker slots
    pub max_concurrent: usize,

    /// Upper bound on a single task run
    pub task_timeout: Duration,

    /// Terminal tasks retained after each completion
    pub keep_finished: usize,

    /// Ensemble disagreement above which a validation follow-up is scheduled
    pub disagreement_threshold: f64,

    /// Schedule validation follow-ups for disagreeing ensembles
    pub auto_validate: bool,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            task_timeout: Duration::from_secs(300),
            keep_finished: 1000,
            disagreement_threshold: 0.3,
            auto_validate: true,
        }
    }
}

impl TaskManagerConfig {
    pub fn from_config(config: &ReasonerConfig) -> Self {
        Self {
            max_concurrent: config.tasks.max_concurrent.max(1),
            task_timeout: Duration::from_secs(config.tasks.task_timeout_secs.max(1)),
            keep_finished: config.tasks.keep_finished,
            disagreement_threshold: config.tasks.disagreement_threshold,
            auto_validate: config.tasks.auto_validate,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_auto_validate(mut self, enabled: bool) -> Self {
        self.auto_validate = enabled;
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Manager
// ─────────────────────────────────────────────────────────────────

struct Inner {
    config: TaskManagerConfig,
    dispatch: DispatchContext,
    registry: TaskRegistry,
    slots: Arc<Semaphore>,
    queue_tx: mpsc::UnboundedSender<TaskId>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<TaskId>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    cancels: Mutex<HashMap<TaskId, oneshot::Sender<()>>>,
}

/// Schedules and runs tasks over a fixed pool of worker slots
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    /// Create a manager; call [`TaskManager::start`] to begin admitting tasks
    pub fn new(config: TaskManagerConfig, dispatch: DispatchContext) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let slots = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

        Self {
            inner: Arc::new(Inner {
                config,
                dispatch,
                registry: TaskRegistry::new(),
                slots,
                queue_tx,
                queue_rx: Mutex::new(Some(queue_rx)),
                dispatcher: Mutex::new(None),
                cancels: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &TaskManagerConfig {
        &self.inner.config
    }

    pub fn dispatch_context(&self) -> &DispatchContext {
        &self.inner.dispatch
    }

    /// Spawn the dispatcher loop
    pub fn start(&self) -> Result<()> {
        let mut queue = self
            .inner
            .queue_rx
            .lock()
            .take()
            .ok_or_else(|| Error::Internal("Task manager already started".to_string()))?;

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(task_id) = queue.recv().await {
                let permit = match manager.inner.slots.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                if manager.status(task_id) != Some(TaskStatus::Pending) {
                    debug!(task_id = %task_id, "Skipping task that is no longer pending");
                    continue;
                }

                let worker = manager.clone();
                tokio::spawn(async move {
                    worker.execute(task_id, permit).await;
                });
            }
            debug!("Dispatcher loop stopped");
        });

        *self.inner.dispatcher.lock() = Some(handle);
        info!(max_concurrent = self.inner.config.max_concurrent, "Task manager started");
        Ok(())
    }

    /// Stop admitting tasks; running tasks finish on their own
    pub fn shutdown(&self) {
        self.inner.slots.close();
        if let Some(handle) = self.inner.dispatcher.lock().take() {
            handle.abort();
        }
        info!("Task manager stopped");
    }

    // ─────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────

    /// Validate and enqueue a task; returns immediately
    pub fn schedule(&self, task_type: TaskType, item_ref: &str, parameters: TaskParameters) -> Result<TaskId> {
        self.validate_request(task_type, item_ref, &parameters)?;

        let task = self.inner.registry.insert(task_type, item_ref, parameters);
        self.inner
            .queue_tx
            .send(task.id)
            .map_err(|_| Error::Internal("Task queue closed".to_string()))?;

        info!(task_id = %task.id, task_type = %task_type, item = %item_ref, "Task scheduled");
        Ok(task.id)
    }

    /// Schedule with a task type given by name
    pub fn schedule_named(&self, task_type: &str, item_ref: &str, parameters: TaskParameters) -> Result<TaskId> {
        self.schedule(task_type.parse()?, item_ref, parameters)
    }

    fn validate_request(&self, task_type: TaskType, item_ref: &str, parameters: &TaskParameters) -> Result<()> {
        if item_ref.trim().is_empty() {
            return Err(Error::invalid_parameters("item_ref must not be empty"));
        }
        parameters.validate(task_type)?;

        let ctx = &self.inner.dispatch;
        if task_type != TaskType::Research && !ctx.algorithms.contains(&parameters.algorithm_id) {
            return Err(Error::invalid_parameters(format!(
                "unknown algorithm '{}'",
                parameters.algorithm_id
            )));
        }
        if let Some(name) = &parameters.agent {
            if ctx.agent(name).is_none() {
                return Err(Error::invalid_parameters(format!("unknown agent '{}'", name)));
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Running
    // ─────────────────────────────────────────────────────────────

    /// Run a pending task now, waiting for a free slot
    pub async fn run(&self, task_id: TaskId) -> Result<Task> {
        match self.status(task_id) {
            None => return Err(Error::task_not_found(task_id)),
            Some(TaskStatus::Pending) => {}
            Some(status) => {
                return Err(Error::TaskNotPending {
                    task_id: task_id.to_string(),
                    status: status.to_string(),
                })
            }
        }

        let permit = self
            .inner
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("Task manager is shut down".to_string()))?;

        self.execute(task_id, permit).await.ok_or_else(|| Error::TaskNotPending {
            task_id: task_id.to_string(),
            status: self.status(task_id).map(|s| s.to_string()).unwrap_or_default(),
        })
    }

    /// Drive one task to a terminal status while holding `permit`
    async fn execute(&self, task_id: TaskId, permit: OwnedSemaphorePermit) -> Option<Task> {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.inner.cancels.lock().insert(task_id, cancel_tx);

        let task = match self.inner.registry.mark_running(task_id) {
            Ok(task) => task,
            Err(e) => {
                self.inner.cancels.lock().remove(&task_id);
                debug!(task_id = %task_id, error = %e, "Task not started");
                return None;
            }
        };

        let span = info_span!("task", task_id = %task_id, task_type = %task.task_type);
        let finished = self.drive(task, cancel_rx).instrument(span).await;

        self.inner.cancels.lock().remove(&task_id);
        drop(permit);
        self.inner.registry.cleanup_finished(self.inner.config.keep_finished);
        finished
    }

    async fn drive(&self, task: Task, cancel_rx: oneshot::Receiver<()>) -> Option<Task> {
        info!("Starting task execution");
        let timeout = self.inner.config.task_timeout;

        // A panicking dispatch must still leave the task terminal
        let work = AssertUnwindSafe(dispatch::execute(&self.inner.dispatch, &task)).catch_unwind();

        let outcome = tokio::select! {
            res = tokio::time::timeout(timeout, work) => match res {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(DispatchError::from(Error::Internal(format!(
                    "Task {} panicked during execution",
                    task.id
                )))),
                Err(_) => Err(DispatchError::from(Error::TaskTimeout {
                    task_id: task.id.to_string(),
                    timeout_secs: timeout.as_secs(),
                })),
            },
            Ok(()) = cancel_rx => Err(DispatchError::from(Error::TaskCancelled {
                task_id: task.id.to_string(),
            })),
        };

        let recorded = match outcome {
            Ok(mut result) => {
                self.schedule_follow_up(&task, &mut result);
                self.inner
                    .registry
                    .mark_completed(task.id, result)
                    .map(|t| {
                        info!(execution_time_ms = t.execution_time_ms().unwrap_or(0), "Task completed");
                    })
            }
            Err(failure) => {
                let message = failure.error.format_for_log();
                match &failure.error {
                    Error::TaskTimeout { timeout_secs, .. } => error!(timeout_secs, "Task timed out"),
                    Error::TaskCancelled { .. } => info!("Task cancelled"),
                    e => warn!(error = %e, "Task failed"),
                }
                self.inner
                    .registry
                    .mark_failed(task.id, message, failure.partial)
                    .map(|_| ())
            }
        };

        if let Err(e) = recorded {
            // Already terminal, e.g. cancelled while the run was finishing
            debug!(error = %e, "Task outcome discarded");
        }
        self.inner.registry.get(task.id)
    }

    /// Queue a hybrid validation for an ensemble whose members disagreed
    fn schedule_follow_up(&self, task: &Task, result: &mut TaskResult) {
        let TaskResult::Ensemble(ensemble) = result else {
            return;
        };
        let config = &self.inner.config;
        if !config.auto_validate || ensemble.metrics.disagreement_level <= config.disagreement_threshold {
            return;
        }

        let params = TaskParameters {
            validation_mode: ValidationMode::Hybrid,
            ensemble_size: None,
            ..task.parameters.clone()
        };
        match self.schedule(TaskType::Validation, &task.item_ref, params) {
            Ok(id) => {
                info!(
                    follow_up = %id,
                    disagreement = ensemble.metrics.disagreement_level,
                    "Ensemble disagreement, validation scheduled"
                );
                ensemble.follow_up_task = Some(id);
            }
            Err(e) => warn!(error = %e, "Could not schedule validation follow-up"),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Control & Observation
    // ─────────────────────────────────────────────────────────────

    /// Fail a pending or running task with a cancellation error.
    ///
    /// Returns `false` if the task already finished.
    pub fn cancel(&self, task_id: TaskId) -> Result<bool> {
        let error = Error::TaskCancelled {
            task_id: task_id.to_string(),
        };
        match self.inner.registry.mark_failed(task_id, error.format_for_log(), None) {
            Ok(previous) => {
                if previous == TaskStatus::Running {
                    if let Some(tx) = self.inner.cancels.lock().remove(&task_id) {
                        let _ = tx.send(());
                    }
                }
                info!(task_id = %task_id, previous = %previous, "Task cancelled");
                Ok(true)
            }
            Err(Error::TaskNotPending { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Snapshot of a task
    pub fn get(&self, task_id: TaskId) -> Option<Task> {
        self.inner.registry.get(task_id)
    }

    pub fn status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.get(task_id).map(|t| t.status)
    }

    /// Every known task in schedule order
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.registry.all()
    }

    /// Wait for a task to reach a terminal status
    pub async fn wait(&self, task_id: TaskId) -> Result<Task> {
        self.inner.registry.wait(task_id).await
    }

    /// Wait until nothing is pending or running; returns every task
    pub async fn wait_all(&self) -> Vec<Task> {
        self.inner.registry.wait_idle().await;
        self.tasks()
    }

    pub fn running_count(&self) -> usize {
        self.inner.registry.running_count()
    }

    pub fn stats(&self) -> TaskStats {
        self.inner.registry.stats()
    }

    /// Drop the oldest terminal tasks beyond `keep`
    pub fn cleanup_finished(&self, keep: usize) -> usize {
        self.inner.registry.cleanup_finished(keep)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
