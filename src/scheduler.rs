//! Bounded-concurrency batch runner.
//!
//! Every task runs on its own tokio task behind a shared semaphore. A task
//! that errors or panics is logged with its label and yields `None`; it never
//! affects its siblings. Results come back in submission order.

use crate::config::DEFAULT_MAX_CONCURRENCY;
use crate::error::{Result, SpriteError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct Task<T> {
    pub label: String,
    future: BoxFuture<'static, Result<T>>,
}

impl<T> Task<T> {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: future.boxed(),
        }
    }
}

/// Per-batch tally, for the end-of-phase report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// Folds a follow-up batch into this one.
    pub fn absorb(&mut self, other: BatchSummary) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Clone)]
pub struct TaskScheduler {
    max_concurrency: usize,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl TaskScheduler {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs every task, at most `max_concurrency` at a time.
    pub async fn run_all<T>(&self, tasks: Vec<Task<T>>) -> Vec<Option<T>>
    where
        T: Send + 'static,
    {
        let (results, summary) = self.run_with_summary(tasks).await;
        if !summary.failed.is_empty() {
            log::warn!(
                "{} of {} tasks failed: {}",
                summary.failed.len(),
                summary.total(),
                summary.failed.join(", ")
            );
        }
        results
    }

    pub async fn run_with_summary<T>(&self, tasks: Vec<Task<T>>) -> (Vec<Option<T>>, BatchSummary)
    where
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = semaphore.clone();
            let label = task.label;
            let future = task.future;
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| SpriteError::TaskPanicked(format!("Semaphore closed: {}", e)))?;
                future.await
            });
            handles.push((label, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut summary = BatchSummary::default();
        for (label, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(SpriteError::TaskPanicked(join_error.to_string())),
            };
            match outcome {
                Ok(value) => {
                    summary.succeeded += 1;
                    results.push(Some(value));
                }
                Err(e) => {
                    log::error!("FAILED [{}]: {}", label, e);
                    summary.failed.push(label);
                    results.push(None);
                }
            }
        }

        (results, summary)
    }
}
