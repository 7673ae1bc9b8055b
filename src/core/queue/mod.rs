//! Persisted task queue and retry coordinator.
//!
//! Units of work are rows in the `tasks` table; a worker loop claims due
//! tasks, runs them concurrently through a [TaskRunner], and settles the
//! results. Failures retry with exponential backoff up to a fixed attempt
//! ceiling unless marked fatal; exhausted tasks are recorded as failed with
//! their last error, never dropped. A sliding per-kind window caps executions
//! per minute so aggregate calls to any third-party API stay under its
//! ceiling.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::core::store::RecordStore;
use crate::core::store::types::{TaskKind, TaskRecord, TaskStatus};

/// Error marker for failures that must not be retried: missing credentials,
/// upstream jobs that report terminal failure, OAuth state mismatches.
#[derive(Debug)]
pub struct FatalError(pub String);

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FatalError {}

pub fn fatal(msg: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(FatalError(msg.into()))
}

pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<FatalError>().is_some())
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_secs: 30,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, doubling per completed attempt.
    pub fn backoff_secs(&self, attempts_used: u32) -> u64 {
        self.base_backoff_secs << attempts_used.saturating_sub(1).min(16)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Maximum task executions per sliding 60s window, per task kind.
    pub per_minute: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self { per_minute: 7 }
    }
}

/// How a task body finished. Skipped is a success: missing per-user
/// configuration is an expected steady state, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(String),
    Skipped(String),
}

#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &TaskRecord) -> Result<TaskOutcome>;
}

pub struct TaskQueue {
    store: Arc<RecordStore>,
    retry: RetryPolicy,
    rate: RateLimit,
    poll_interval: Duration,
    /// Dispatch timestamps (epoch secs) per task kind, pruned to the window.
    windows: Mutex<HashMap<&'static str, VecDeque<i64>>>,
}

const DISPATCH_BATCH: usize = 32;

impl TaskQueue {
    pub fn new(store: Arc<RecordStore>, retry: RetryPolicy, rate: RateLimit) -> Self {
        Self {
            store,
            retry,
            rate,
            poll_interval: Duration::from_secs(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule a task to run no earlier than `delay` from now. Returns the
    /// task id. The caller does not wait for execution.
    pub async fn enqueue(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<String> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let run_at = Utc::now().timestamp() + delay.as_secs() as i64;
        self.store
            .insert_task(&task_id, kind, &payload, run_at)
            .await?;
        info!("Queued {} task {}", kind.as_str(), task_id);
        Ok(task_id)
    }

    async fn try_acquire(&self, kind: TaskKind, now: i64) -> bool {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(kind.as_str()).or_default();
        while window.front().is_some_and(|t| *t <= now - 60) {
            window.pop_front();
        }
        if window.len() < self.rate.per_minute {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// One scheduling pass: claim due tasks within the rate budget, run them
    /// concurrently, settle every result. Returns how many were dispatched.
    /// Tasks are independent; one failing never cancels another.
    pub async fn tick(&self, runner: &Arc<dyn TaskRunner>) -> Result<usize> {
        let now = Utc::now().timestamp();
        let due = self.store.due_tasks(now, DISPATCH_BATCH).await?;

        let mut set = JoinSet::new();
        let mut dispatched = 0;
        for task in due {
            if !self.try_acquire(task.kind, now).await {
                // Over budget for this kind; the task stays queued and keeps
                // its place in run_at order for the next pass.
                continue;
            }
            self.store.mark_task_running(&task.task_id).await?;
            let runner = runner.clone();
            set.spawn(async move {
                let result = runner.run(&task).await;
                (task, result)
            });
            dispatched += 1;
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((task, result)) => self.settle(task, result).await?,
                // A panicked task body must not leave the rest of the batch
                // unsettled; its own row is requeued on the next recovery.
                Err(e) => error!("Task execution aborted before settling: {:#}", e),
            }
        }
        Ok(dispatched)
    }

    /// Requeue tasks a previous worker claimed but never settled. Runs once
    /// before the loop; with a single worker per store, any row still
    /// running at startup is stranded.
    pub async fn recover_abandoned(&self) -> Result<usize> {
        let recovered = self.store.requeue_running_tasks().await?;
        if recovered > 0 {
            warn!(
                "Requeued {} tasks left running by a previous worker",
                recovered
            );
        }
        Ok(recovered)
    }

    async fn settle(&self, task: TaskRecord, result: Result<TaskOutcome>) -> Result<()> {
        let attempts_used = task.attempts + 1;
        match result {
            Ok(TaskOutcome::Completed(summary)) => {
                info!("Task {} completed: {}", task.task_id, summary);
                self.store
                    .finish_task(&task.task_id, TaskStatus::Succeeded, Some(&summary), None)
                    .await
            }
            Ok(TaskOutcome::Skipped(reason)) => {
                info!("Task {} skipped: {}", task.task_id, reason);
                let summary = format!("skipped: {}", reason);
                self.store
                    .finish_task(&task.task_id, TaskStatus::Succeeded, Some(&summary), None)
                    .await
            }
            Err(err) if is_fatal(&err) => {
                error!("Task {} failed fatally: {:#}", task.task_id, err);
                self.store
                    .finish_task(
                        &task.task_id,
                        TaskStatus::Failed,
                        None,
                        Some(&format!("{:#}", err)),
                    )
                    .await
            }
            Err(err) if attempts_used >= self.retry.max_attempts => {
                error!(
                    "Task {} failed after {} attempts: {:#}",
                    task.task_id, attempts_used, err
                );
                self.store
                    .finish_task(
                        &task.task_id,
                        TaskStatus::Failed,
                        None,
                        Some(&format!("{:#}", err)),
                    )
                    .await
            }
            Err(err) => {
                let backoff = self.retry.backoff_secs(attempts_used);
                warn!(
                    "Task {} attempt {} failed, retrying in {}s: {:#}",
                    task.task_id, attempts_used, backoff, err
                );
                let run_at = Utc::now().timestamp() + backoff as i64;
                self.store
                    .reschedule_task(&task.task_id, run_at, &format!("{:#}", err))
                    .await
            }
        }
    }

    /// Worker loop. Never returns; scheduling errors are logged and the loop
    /// continues so one bad pass cannot stall the queue.
    pub async fn run_worker(self: Arc<Self>, runner: Arc<dyn TaskRunner>) {
        info!("Task worker started");
        if let Err(e) = self.recover_abandoned().await {
            error!("Failed to requeue abandoned tasks: {:#}", e);
        }
        loop {
            if let Err(e) = self.tick(&runner).await {
                error!("Task scheduling pass failed: {:#}", e);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
