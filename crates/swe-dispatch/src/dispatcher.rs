//! The bounded queue and worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use swe_github::Task;

use crate::keyed_locks::KeyedLocks;
use crate::retry::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
/// Enumerates supported `EnqueueError` values.
pub enum EnqueueError {
    #[error("task queue is full")]
    QueueFull,
    #[error("task queue is closed")]
    QueueClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of one execution attempt.
pub enum RunDisposition {
    Completed,
    /// Permanent failure; the runner has already surfaced it.
    Failed { reason: String },
    /// Transient failure; the dispatcher may try again.
    Retry { reason: String },
}

#[async_trait]
/// Trait contract for task execution behavior.
pub trait TaskRunner: Send + Sync {
    /// Execute one attempt. `task.attempt` is current and 1-based.
    async fn run(&self, task: &Task) -> RunDisposition;

    /// Record a terminal failure for a task whose retries ran out or whose
    /// retry could not be scheduled.
    async fn abandon(&self, task: &Task, reason: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Worker-pool and queue sizing plus the retry schedule.
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 16,
            retry: RetryPolicy::default(),
        }
    }
}

/// A queue slot held before the task is fully assembled, so a saturated
/// queue is rejected before any state is mutated.
pub struct TaskSlot {
    permit: mpsc::OwnedPermit<Task>,
}

impl TaskSlot {
    pub fn submit(self, task: Task) {
        self.permit.send(task);
    }
}

#[derive(Clone)]
/// Cheap enqueue-side handle, shared with the webhook pipeline.
pub struct DispatchHandle {
    tx: mpsc::Sender<Task>,
    shutting_down: Arc<AtomicBool>,
}

impl DispatchHandle {
    /// Reserve a slot without sending; rejection leaves no trace.
    pub fn reserve(&self) -> Result<TaskSlot, EnqueueError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(EnqueueError::QueueClosed);
        }
        match self.tx.clone().try_reserve_owned() {
            Ok(permit) => Ok(TaskSlot { permit }),
            Err(mpsc::error::TrySendError::Full(_)) => Err(EnqueueError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EnqueueError::QueueClosed),
        }
    }

    /// Non-blocking enqueue of a finished task.
    pub fn enqueue(&self, task: Task) -> Result<(), EnqueueError> {
        let slot = self.reserve()?;
        slot.submit(task);
        Ok(())
    }
}

/// Bounded FIFO dispatcher with per-key serial execution.
pub struct Dispatcher {
    handle: DispatchHandle,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, runner: Arc<dyn TaskRunner>) -> Self {
        let (tx, rx) = mpsc::channel::<Task>(config.queue_capacity.max(1));
        let rx = Arc::new(AsyncMutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutting_down = Arc::new(AtomicBool::new(false));
        let locks = KeyedLocks::new();

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(WorkerContext {
                    worker_id,
                    rx: Arc::clone(&rx),
                    retry_tx: tx.clone(),
                    runner: Arc::clone(&runner),
                    locks: locks.clone(),
                    retry: config.retry.clone(),
                    shutting_down: Arc::clone(&shutting_down),
                    shutdown_rx: shutdown_rx.clone(),
                }))
            })
            .collect();

        Self {
            handle: DispatchHandle { tx, shutting_down },
            shutdown_tx,
            workers,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Close the queue, suppress pending retries, and wait for in-flight
    /// tasks to finish at their next boundary.
    pub async fn shutdown(mut self) {
        self.handle.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
        tracing::info!("dispatcher shut down");
    }
}

struct WorkerContext {
    worker_id: usize,
    rx: Arc<AsyncMutex<mpsc::Receiver<Task>>>,
    retry_tx: mpsc::Sender<Task>,
    runner: Arc<dyn TaskRunner>,
    locks: KeyedLocks,
    retry: RetryPolicy,
    shutting_down: Arc<AtomicBool>,
    shutdown_rx: watch::Receiver<bool>,
}

async fn worker_loop(mut context: WorkerContext) {
    loop {
        if *context.shutdown_rx.borrow() {
            break;
        }
        let task = {
            let mut rx = context.rx.lock().await;
            tokio::select! {
                _ = context.shutdown_rx.changed() => None,
                task = rx.recv() => task,
            }
        };
        let Some(task) = task else {
            break;
        };
        process_task(&context, task).await;
    }
    tracing::debug!(worker_id = context.worker_id, "dispatch worker exited");
}

async fn process_task(context: &WorkerContext, task: Task) {
    let key = task.serialization_key();
    let _guard = context.locks.acquire(&key).await;
    tracing::info!(
        task_id = %task.id,
        key = %key,
        attempt = task.attempt,
        worker_id = context.worker_id,
        "task execution started"
    );
    let disposition = context.runner.run(&task).await;
    match disposition {
        RunDisposition::Completed => {
            tracing::info!(task_id = %task.id, attempt = task.attempt, "task completed");
        }
        RunDisposition::Failed { reason } => {
            tracing::warn!(task_id = %task.id, attempt = task.attempt, "task failed: {reason}");
        }
        RunDisposition::Retry { reason } => {
            schedule_retry(context, task, &reason).await;
        }
    }
}

async fn schedule_retry(context: &WorkerContext, task: Task, reason: &str) {
    if context.shutting_down.load(Ordering::SeqCst) {
        context
            .runner
            .abandon(&task, "dispatcher shutting down; retry suppressed")
            .await;
        return;
    }
    if !context.retry.allows_retry(task.attempt) {
        context
            .runner
            .abandon(
                &task,
                &format!(
                    "retries exhausted after attempt {}/{}: {reason}",
                    task.attempt, context.retry.max_attempts
                ),
            )
            .await;
        return;
    }

    // The scheduled retry holds a reserved slot so it counts against queue
    // capacity for its whole delay.
    match context.retry_tx.clone().try_reserve_owned() {
        Ok(permit) => {
            let delay = context.retry.delay_after_attempt(task.attempt);
            let mut retry_task = task.clone();
            retry_task.attempt = retry_task.attempt.saturating_add(1);
            let shutting_down = Arc::clone(&context.shutting_down);
            tracing::info!(
                task_id = %task.id,
                attempt = task.attempt,
                delay_ms = delay.as_millis() as u64,
                "task rescheduled: {reason}"
            );
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if shutting_down.load(Ordering::SeqCst) {
                    tracing::info!(task_id = %retry_task.id, "retry dropped at shutdown");
                    return;
                }
                permit.send(retry_task);
            });
        }
        Err(_) => {
            context
                .runner
                .abandon(&task, &format!("retry dropped, queue saturated: {reason}"))
                .await;
        }
    }
}
