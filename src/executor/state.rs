//! Task lifecycle state
//!
//! The registry owns every [`Task`] record. Each transition builds the next
//! snapshot from the current one and swaps it in under a single write lock,
//! so readers only ever see whole values. Terminal snapshots are never
//! replaced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{TaskId, TaskParameters, TaskStatus, TaskType};

use super::dispatch::TaskResult;

// ─────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────

/// Snapshot of a scheduled unit of work
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub item_ref: String,
    pub parameters: TaskParameters,

    /// Schedule order, starting at 1
    pub sequence: u64,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Type-dependent payload; may be present on failure as partial detail
    pub result: Option<TaskResult>,

    /// Present iff `status == Failed`
    pub error: Option<String>,
}

impl Task {
    /// Create a new pending task
    pub fn new(task_type: TaskType, item_ref: impl Into<String>, parameters: TaskParameters, sequence: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            status: TaskStatus::Pending,
            item_ref: item_ref.into(),
            parameters,
            sequence,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    fn running(&self) -> Self {
        Self {
            status: TaskStatus::Running,
            started_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    fn completed(&self, result: TaskResult) -> Self {
        Self {
            status: TaskStatus::Completed,
            completed_at: Some(Utc::now()),
            result: Some(result),
            error: None,
            ..self.clone()
        }
    }

    fn failed(&self, error: String, partial: Option<TaskResult>) -> Self {
        Self {
            status: TaskStatus::Failed,
            completed_at: Some(Utc::now()),
            result: partial,
            error: Some(error),
            ..self.clone()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time spent waiting for a slot in milliseconds
    pub fn queue_time_ms(&self) -> Option<i64> {
        self.started_at.map(|s| (s - self.created_at).num_milliseconds())
    }

    /// Execution time in milliseconds
    pub fn execution_time_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Stats
// ─────────────────────────────────────────────────────────────────

/// Task counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,

    /// Completed since startup, including cleaned-up tasks
    pub total_completed: u64,

    /// Failed since startup, including cleaned-up tasks
    pub total_failed: u64,
}

impl TaskStats {
    pub fn in_flight(&self) -> usize {
        self.pending + self.running
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Registry
// ─────────────────────────────────────────────────────────────────

/// Concurrency-safe task store
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Task>>,
    next_sequence: AtomicU64,
    completed_count: AtomicU64,
    failed_count: AtomicU64,
    finished: Notify,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(1),
            completed_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
            finished: Notify::new(),
        }
    }

    /// Create and store a pending task
    pub fn insert(&self, task_type: TaskType, item_ref: impl Into<String>, parameters: TaskParameters) -> Task {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let task = Task::new(task_type, item_ref, parameters, sequence);
        self.tasks.write().insert(task.id, task.clone());
        task
    }

    /// Snapshot of one task
    pub fn get(&self, task_id: TaskId) -> Option<Task> {
        self.tasks.read().get(&task_id).cloned()
    }

    /// Snapshots of every task in schedule order
    pub fn all(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by_key(|t| t.sequence);
        tasks
    }

    /// Replace a task with the snapshot built by `next`
    fn transition<F>(&self, task_id: TaskId, next: F) -> Result<Task>
    where
        F: FnOnce(&Task) -> Result<Task>,
    {
        let mut tasks = self.tasks.write();
        let current = tasks.get(&task_id).ok_or_else(|| Error::task_not_found(task_id))?;
        let updated = next(current)?;
        tasks.insert(task_id, updated.clone());
        Ok(updated)
    }

    /// Pending -> Running
    pub fn mark_running(&self, task_id: TaskId) -> Result<Task> {
        self.transition(task_id, |task| match task.status {
            TaskStatus::Pending => Ok(task.running()),
            status => Err(not_pending(task_id, status)),
        })
    }

    /// Any live status -> Completed
    pub fn mark_completed(&self, task_id: TaskId, result: TaskResult) -> Result<Task> {
        let task = self.transition(task_id, |task| {
            if task.is_terminal() {
                return Err(not_pending(task_id, task.status));
            }
            Ok(task.completed(result))
        })?;
        self.completed_count.fetch_add(1, Ordering::SeqCst);
        self.finished.notify_waiters();
        Ok(task)
    }

    /// Any live status -> Failed; returns the status it failed from
    pub fn mark_failed(&self, task_id: TaskId, error: String, partial: Option<TaskResult>) -> Result<TaskStatus> {
        let mut previous = TaskStatus::Pending;
        self.transition(task_id, |task| {
            if task.is_terminal() {
                return Err(not_pending(task_id, task.status));
            }
            previous = task.status;
            Ok(task.failed(error, partial))
        })?;
        self.failed_count.fetch_add(1, Ordering::SeqCst);
        self.finished.notify_waiters();
        Ok(previous)
    }

    /// Count of tasks holding a worker slot
    pub fn running_count(&self) -> usize {
        self.count(TaskStatus::Running)
    }

    pub fn pending_count(&self) -> usize {
        self.count(TaskStatus::Pending)
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.read().values().filter(|t| t.status == status).count()
    }

    pub fn stats(&self) -> TaskStats {
        let tasks = self.tasks.read();
        let mut stats = TaskStats {
            total_completed: self.completed_count.load(Ordering::SeqCst),
            total_failed: self.failed_count.load(Ordering::SeqCst),
            ..Default::default()
        };
        for task in tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Drop the oldest terminal tasks beyond `keep`; returns how many were removed
    pub fn cleanup_finished(&self, keep: usize) -> usize {
        let mut tasks = self.tasks.write();

        let mut finished: Vec<_> = tasks
            .values()
            .filter(|t| t.is_terminal())
            .map(|t| (t.id, t.completed_at, t.sequence))
            .collect();
        finished.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        let to_remove = finished.len().saturating_sub(keep);
        for (id, _, _) in finished.into_iter().take(to_remove) {
            tasks.remove(&id);
        }
        to_remove
    }

    /// Wait until the task reaches a terminal status
    pub async fn wait(&self, task_id: TaskId) -> Result<Task> {
        loop {
            let notified = self.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let task = self.get(task_id).ok_or_else(|| Error::task_not_found(task_id))?;
            if task.is_terminal() {
                return Ok(task);
            }
            notified.await;
        }
    }

    /// Wait until no task is pending or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.stats().in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_pending(task_id: TaskId, status: TaskStatus) -> Error {
    Error::TaskNotPending {
        task_id: task_id.to_string(),
        status: status.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
