//! Reminders service
//!
//! Coordinates the task lifecycle so that registered triggers always match
//! the stored task. Every mutation of one task runs as a single
//! cancel → write → compile → schedule sequence under that task's lock;
//! different tasks proceed independently.

use crate::config::COMPLETION_MESSAGE;
use crate::database::{Task, TaskFields, TaskFilter};
use crate::error::{AppError, Result};
use crate::services::gateway::NotificationGateway;
use crate::services::settings::{AcknowledgementSettings, SchedulingSettings};
use crate::services::triggers::{compile, Trigger};
use crate::storage::TaskStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, OwnedMutexGuard};

/// How often trigger registration is attempted before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, failures surface immediately
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&SchedulingSettings> for RetryPolicy {
    fn from(settings: &SchedulingSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: Duration::from_millis(settings.backoff_ms),
        }
    }
}

/// Lifecycle change broadcast to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskChange {
    Added { task: Task },
    Updated { task: Task },
    Completed { task: Task },
    Deleted { id: String },
}

/// Gateway call that failed after the task write stood
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulingFailure {
    /// Trigger tag for schedule failures, task id for cancel failures
    pub target: String,
    pub operation: GatewayOperation,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayOperation {
    Schedule,
    Cancel,
}

/// Result of a task write plus what happened to its triggers
#[derive(Debug, Clone, Serialize)]
pub struct SavedTask {
    pub task: Task,
    /// Tags registered with the gateway
    pub scheduled: Vec<String>,
    pub failures: Vec<SchedulingFailure>,
}

impl SavedTask {
    pub fn is_fully_scheduled(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Task lifecycle coordinator
#[derive(Clone)]
pub struct RemindersService {
    store: Arc<dyn TaskStore>,
    gateway: Arc<dyn NotificationGateway>,
    retry: RetryPolicy,
    acknowledgement_delay: Duration,
    task_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    /// Task id to the `updated_at` its registered triggers were compiled from
    armed: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    changes: broadcast::Sender<TaskChange>,
    acknowledgement: Arc<watch::Sender<Option<String>>>,
    acknowledgement_generation: Arc<Mutex<u64>>,
}

impl RemindersService {
    pub fn new(store: Arc<dyn TaskStore>, gateway: Arc<dyn NotificationGateway>) -> Self {
        let (changes, _) = broadcast::channel(64);
        let (acknowledgement, _) = watch::channel(None);

        Self {
            store,
            gateway,
            retry: RetryPolicy::none(),
            acknowledgement_delay: AcknowledgementSettings::default().delay(),
            task_locks: Arc::new(Mutex::new(HashMap::new())),
            armed: Arc::new(Mutex::new(HashMap::new())),
            changes,
            acknowledgement: Arc::new(acknowledgement),
            acknowledgement_generation: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_acknowledgement_delay(mut self, delay: Duration) -> Self {
        self.acknowledgement_delay = delay;
        self
    }

    /// Receive lifecycle changes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TaskChange> {
        self.changes.subscribe()
    }

    /// Watch the transient completion message
    pub fn acknowledgements(&self) -> watch::Receiver<Option<String>> {
        self.acknowledgement.subscribe()
    }

    /// Completion message currently shown, if any
    pub fn current_acknowledgement(&self) -> Option<String> {
        self.acknowledgement.borrow().clone()
    }

    /// Validate, store and schedule a new task
    pub async fn add(&self, fields: TaskFields) -> Result<SavedTask> {
        fields.validate()?;

        tracing::info!("Creating task: {}", fields.title);
        let task = self.store.create(&fields).await?;

        let _guard = self.lock_task(&task.id).await;
        let (scheduled, failures) = self.arm(&task).await;

        tracing::info!("Task created: {} ({} triggers)", task.id, scheduled.len());
        self.publish(TaskChange::Added { task: task.clone() });

        Ok(SavedTask {
            task,
            scheduled,
            failures,
        })
    }

    /// Replace a task's fields and recompile its triggers
    pub async fn update(&self, id: &str, fields: TaskFields) -> Result<SavedTask> {
        fields.validate()?;

        let _guard = self.lock_task(id).await;

        let current = self.store.get(id).await?;
        if current.is_completed() {
            return Err(AppError::Validation(format!(
                "task {} is completed and cannot be edited",
                id
            )));
        }

        tracing::info!("Updating task: {}", id);
        let mut failures: Vec<SchedulingFailure> = self.disarm(id).await.into_iter().collect();

        let task = self.store.update(id, &fields).await?;
        let (scheduled, schedule_failures) = self.arm(&task).await;
        failures.extend(schedule_failures);

        tracing::info!("Task updated: {} ({} triggers)", id, scheduled.len());
        self.publish(TaskChange::Updated { task: task.clone() });

        Ok(SavedTask {
            task,
            scheduled,
            failures,
        })
    }

    /// Complete a task; it never fires again
    pub async fn complete(&self, id: &str) -> Result<SavedTask> {
        let guard = self.lock_task(id).await;

        tracing::info!("Completing task: {}", id);
        let failures = self.disarm(id).await.into_iter().collect();

        let task = self.store.complete(id).await?;
        self.release_task(id, guard).await;

        self.acknowledge().await;
        self.publish(TaskChange::Completed { task: task.clone() });

        Ok(SavedTask {
            task,
            scheduled: Vec::new(),
            failures,
        })
    }

    /// Remove a task and its triggers permanently
    pub async fn delete(&self, id: &str) -> Result<Vec<SchedulingFailure>> {
        let guard = self.lock_task(id).await;

        tracing::info!("Deleting task: {}", id);
        let failures = self.disarm(id).await.into_iter().collect();

        self.store.delete(id).await?;
        self.release_task(id, guard).await;

        self.publish(TaskChange::Deleted { id: id.to_string() });
        Ok(failures)
    }

    /// Get a task by ID
    pub async fn get(&self, id: &str) -> Result<Task> {
        self.store.get(id).await
    }

    /// The stored task if it exists and is not completed
    pub async fn active_task(&self, id: &str) -> Result<Option<Task>> {
        match self.store.get(id).await {
            Ok(task) if task.is_completed() => Ok(None),
            Ok(task) => Ok(Some(task)),
            Err(AppError::TaskNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List tasks in a named view
    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.store.query(filter).await
    }

    /// Re-register triggers for every active task
    ///
    /// Used at startup, when the gateway holds no jobs yet. Each task is
    /// re-read under its lock, so one completed or deleted meanwhile is
    /// skipped.
    pub async fn restore_triggers(&self) -> Result<Vec<SavedTask>> {
        let listed = self.store.query(TaskFilter::Active).await?;
        tracing::info!("Restoring triggers for {} active tasks", listed.len());

        let mut restored = Vec::with_capacity(listed.len());
        for listed_task in listed {
            if let Some(saved) = self.rearm(&listed_task.id).await? {
                restored.push(saved);
            }
        }

        Ok(restored)
    }

    /// Bring registered triggers in line with the store
    ///
    /// Tasks changed by another process since they were armed here are
    /// recompiled, tasks that left the active set lose their triggers and
    /// unchanged tasks keep their running jobs. Returns the re-armed tasks.
    pub async fn reconcile(&self) -> Result<Vec<SavedTask>> {
        let active = self.store.query(TaskFilter::Active).await?;
        let active_ids: HashSet<&str> = active.iter().map(|t| t.id.as_str()).collect();

        let stale: Vec<String> = {
            let armed = self.armed.lock().await;
            armed
                .keys()
                .filter(|id| !active_ids.contains(id.as_str()))
                .cloned()
                .collect()
        };

        for id in stale {
            let guard = self.lock_task(&id).await;
            if self.active_task(&id).await?.is_none() {
                tracing::info!("Task {} is no longer active, removing its triggers", id);
                self.disarm(&id).await;
            }
            self.release_task(&id, guard).await;
        }

        let mut rearmed = Vec::new();
        for task in &active {
            if self.is_armed(task).await {
                continue;
            }
            if let Some(saved) = self.rearm(&task.id).await? {
                rearmed.push(saved);
            }
        }

        if !rearmed.is_empty() {
            tracing::info!("Re-armed {} changed tasks", rearmed.len());
        }
        Ok(rearmed)
    }

    async fn is_armed(&self, task: &Task) -> bool {
        self.armed.lock().await.get(&task.id) == Some(&task.updated_at)
    }

    /// Cancel and recompile one task from its current stored state
    async fn rearm(&self, id: &str) -> Result<Option<SavedTask>> {
        let guard = self.lock_task(id).await;

        let Some(task) = self.active_task(id).await? else {
            self.release_task(id, guard).await;
            return Ok(None);
        };

        let mut failures: Vec<SchedulingFailure> = self.disarm(id).await.into_iter().collect();
        let (scheduled, schedule_failures) = self.arm(&task).await;
        failures.extend(schedule_failures);

        Ok(Some(SavedTask {
            task,
            scheduled,
            failures,
        }))
    }

    async fn lock_task(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.task_locks.lock().await;
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Unlock a task and forget its lock when nobody else is waiting on it
    async fn release_task(&self, id: &str, guard: OwnedMutexGuard<()>) {
        let mut locks = self.task_locks.lock().await;
        // One reference in the map, one held by the guard
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) <= 2) {
            locks.remove(id);
        }
        drop(guard);
    }

    async fn disarm(&self, id: &str) -> Option<SchedulingFailure> {
        self.armed.lock().await.remove(id);

        match self.gateway.cancel(id).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to cancel triggers for task {}: {}", id, e);
                Some(SchedulingFailure {
                    target: id.to_string(),
                    operation: GatewayOperation::Cancel,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn arm(&self, task: &Task) -> (Vec<String>, Vec<SchedulingFailure>) {
        let mut scheduled = Vec::new();
        let mut failures = Vec::new();

        for trigger in compile(task, Utc::now()) {
            match self.schedule_with_retry(&trigger).await {
                Ok(()) => scheduled.push(trigger.tag),
                Err(e) => {
                    tracing::error!("Failed to schedule trigger {}: {}", trigger.tag, e);
                    failures.push(SchedulingFailure {
                        target: trigger.tag,
                        operation: GatewayOperation::Schedule,
                        message: e.to_string(),
                    });
                }
            }
        }

        // Partially scheduled tasks stay unarmed so the next reconcile retries them
        if failures.is_empty() {
            self.armed
                .lock()
                .await
                .insert(task.id.clone(), task.updated_at);
        }

        (scheduled, failures)
    }

    async fn schedule_with_retry(&self, trigger: &Trigger) -> Result<()> {
        let mut attempt = 1;

        loop {
            match self.gateway.schedule(trigger).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        "Scheduling {} failed (attempt {}/{}): {}",
                        trigger.tag,
                        attempt,
                        self.retry.max_attempts,
                        e
                    );
                    attempt += 1;
                    if !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Show the completion message and clear it after the delay unless a
    /// newer message replaced it
    async fn acknowledge(&self) {
        let generation = {
            let mut current = self.acknowledgement_generation.lock().await;
            *current += 1;
            self.acknowledgement
                .send_replace(Some(COMPLETION_MESSAGE.to_string()));
            *current
        };

        let sender = Arc::clone(&self.acknowledgement);
        let latest = Arc::clone(&self.acknowledgement_generation);
        let delay = self.acknowledgement_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let current = latest.lock().await;
            if *current == generation {
                sender.send_replace(None);
            }
        });
    }

    fn publish(&self, change: TaskChange) {
        if self.changes.send(change).is_err() {
            tracing::debug!("No subscribers for task change");
        }
    }
}
