//! # Wave Scheduler
//!
//! Runs one sub-agent task per work unit concurrently and waits for all of them.
//! A task that fails or panics never cancels its siblings.

use std::future::Future;
use tokio::task::JoinSet;

/// Outcome of one task in a wave
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Failed(String),
}

impl<T> TaskOutcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }
}

/// Spawn every future and collect one outcome per input, in input order.
///
/// `Err` results and panics both become [`TaskOutcome::Failed`].
pub async fn join_all_isolated<T, E, F>(tasks: Vec<F>) -> Vec<TaskOutcome<T>>
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    let count = tasks.len();
    let mut set = JoinSet::new();
    for (index, task) in tasks.into_iter().enumerate() {
        set.spawn(async move { (index, task.await) });
    }

    let mut outcomes: Vec<Option<TaskOutcome<T>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(value))) => outcomes[index] = Some(TaskOutcome::Completed(value)),
            Ok((index, Err(e))) => outcomes[index] = Some(TaskOutcome::Failed(e.to_string())),
            // A panicked task loses its index; its slot stays empty and is filled below
            Err(join_error) => tracing::error!(error = %join_error, "Wave task panicked"),
        }
    }

    outcomes
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| TaskOutcome::Failed("task panicked".to_string())))
        .collect()
}

/// Log and drop failures, concatenate the rest
pub fn flatten_outcomes<T>(wave: &str, outcomes: Vec<TaskOutcome<Vec<T>>>) -> Vec<T> {
    let total = outcomes.len();
    let mut failed = 0;
    let mut combined = Vec::new();
    for outcome in outcomes {
        match outcome {
            TaskOutcome::Completed(items) => combined.extend(items),
            TaskOutcome::Failed(reason) => {
                failed += 1;
                tracing::error!(wave, error = %reason, "Sub-agent failed, excluding its results");
            }
        }
    }
    tracing::info!(wave, total, failed, candidates = combined.len(), "Wave finished");
    combined
}
