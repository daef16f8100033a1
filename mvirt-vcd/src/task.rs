//! Task tracking - submits a mutating call and waits for the remote task.
//!
//! Submission errors (nothing was created remotely) are kept apart from
//! task failures (the request was accepted but did not succeed). A failed
//! task is never resubmitted here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::VcdApi;
use crate::error::{ApiError, Error, Result};
use crate::retry::Backoff;
use crate::types::{Locator, Task, TaskStatus};

/// How long and how often to poll a task.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Give up after this long and return `Error::Timeout`.
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Consecutive failed polls tolerated before `Error::Unconfirmed` is returned.
    pub max_poll_failures: u32,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            max_poll_failures: 3,
        }
    }
}

/// Waits for remote tasks through a [`VcdApi`].
#[derive(Clone)]
pub struct TaskTracker {
    api: Arc<dyn VcdApi>,
    options: WaitOptions,
}

impl TaskTracker {
    pub fn new(api: Arc<dyn VcdApi>, options: WaitOptions) -> Self {
        Self { api, options }
    }

    /// Submit `submit` and wait for its task. Returns the task owner's locator.
    pub async fn submit_and_await<F>(&self, operation: &str, submit: F) -> Result<Locator>
    where
        F: Future<Output = std::result::Result<Task, ApiError>> + Send,
    {
        self.submit_and_await_until(operation, submit, std::future::pending())
            .await
    }

    /// Like [`submit_and_await`](Self::submit_and_await), but stops waiting
    /// with `Error::Cancelled` when `cancel` completes.
    pub async fn submit_and_await_until<F, C>(
        &self,
        operation: &str,
        submit: F,
        cancel: C,
    ) -> Result<Locator>
    where
        F: Future<Output = std::result::Result<Task, ApiError>> + Send,
        C: Future<Output = ()> + Send,
    {
        let task = submit.await.map_err(|source| {
            warn!(operation = %operation, error = %source, "Request rejected");
            Error::Submission {
                operation: operation.to_string(),
                source,
            }
        })?;

        debug!(operation = %operation, task = %task.href, "Task submitted");
        let done = self.await_task(operation, task, cancel).await?;

        done.owner_locator().ok_or_else(|| Error::TaskFailed {
            operation: operation.to_string(),
            task: done.href.clone(),
            message: "task finished without an owner reference".to_string(),
        })
    }

    /// Wait for a submitted task to reach a terminal state.
    async fn await_task<C>(&self, operation: &str, task: Task, cancel: C) -> Result<Task>
    where
        C: Future<Output = ()> + Send,
    {
        let task_href = task.href.clone();
        let started = Instant::now();
        let polling = tokio::time::timeout(self.options.timeout, self.poll(operation, task));

        tokio::select! {
            result = polling => {
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(operation = %operation, task = %task_href, "Gave up waiting for task");
                        Err(Error::Timeout {
                            operation: operation.to_string(),
                            task: task_href,
                            elapsed: started.elapsed(),
                        })
                    }
                }
            }
            _ = cancel => {
                info!(operation = %operation, task = %task_href, "Stopped waiting for task");
                Err(Error::Cancelled {
                    operation: operation.to_string(),
                    task: task_href,
                })
            }
        }
    }

    async fn poll(&self, operation: &str, mut task: Task) -> Result<Task> {
        let locator = task.locator();
        let mut backoff = Backoff::new(
            self.options.initial_interval,
            self.options.max_interval,
            self.options.multiplier,
        );
        let mut failures = 0u32;

        loop {
            match task.status {
                TaskStatus::Success => {
                    debug!(operation = %operation, task = %task.href, "Task succeeded");
                    return Ok(task);
                }
                TaskStatus::Error | TaskStatus::Aborted => {
                    let message = task
                        .error
                        .as_ref()
                        .map(|e| e.message.clone())
                        .unwrap_or_else(|| format!("task {:?}", task.status).to_lowercase());
                    warn!(
                        operation = %operation,
                        task = %task.href,
                        error = %message,
                        "Task failed"
                    );
                    return Err(Error::TaskFailed {
                        operation: operation.to_string(),
                        task: task.href,
                        message,
                    });
                }
                TaskStatus::Queued | TaskStatus::PreRunning | TaskStatus::Running => {}
            }

            backoff.wait().await;

            match self.api.get_task(&locator).await {
                Ok(next) => {
                    failures = 0;
                    task = next;
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.options.max_poll_failures {
                        warn!(
                            operation = %operation,
                            task = %locator,
                            error = %e,
                            "Lost track of task"
                        );
                        return Err(Error::Unconfirmed {
                            operation: operation.to_string(),
                            task: task.href,
                            source: e,
                        });
                    }
                    warn!(
                        operation = %operation,
                        task = %locator,
                        attempt = failures,
                        error = %e,
                        "Task poll failed, retrying"
                    );
                }
            }
        }
    }
}
