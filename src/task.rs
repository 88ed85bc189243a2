//! task
//!
//! Waiting for server-side sharded tasks.
//!
//! # Design
//!
//! A sharded task is polled by id until it reports `is_done`. The loop has
//! two states, polling and done: every non-done response feeds its
//! percentage to a callback and sleeps one interval; the done response ends
//! the loop, after which the callback receives exactly `100.0` once.
//!
//! Request errors propagate immediately. The only additions over a bare loop
//! are an optional overall timeout and a cancellation token, both checked
//! while a request or a sleep is in flight.
//!
//! # Example
//!
//! ```ignore
//! let task = wait_for_task(&platform, &shop, &id, &PollOptions::default(), &cancel, |pct| {
//!     println!("{pct:.0}%");
//! })
//! .await?;
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, Platform, ShardedTask};
use crate::core::config::DEFAULT_POLL_INTERVAL;
use crate::core::context::ShopContext;
use crate::core::types::{ShopId, TaskId};
use crate::ui::progress::{percent_format, DrawTarget, ProgressBar};

/// Errors from waiting on a task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("timed out after {elapsed:?} waiting for task {id}")]
    TimedOut { id: TaskId, elapsed: Duration },

    #[error("cancelled while waiting for task {id}")]
    Cancelled { id: TaskId },
}

/// Polling behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between lookups
    pub interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl From<&ShopContext> for PollOptions {
    fn from(ctx: &ShopContext) -> Self {
        Self {
            interval: ctx.poll_interval,
            timeout: ctx.task_timeout,
        }
    }
}

/// Resolves when `deadline` passes, never when there is none.
async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Poll a task until it is done.
///
/// `on_progress` is called once per non-done response with the reported
/// percentage, in order, and then once with `100.0` after the task is done.
/// Returns the done response.
///
/// # Errors
///
/// - `TaskError::Api` for any failed lookup, without retrying
/// - `TaskError::TimedOut` once `options.timeout` has elapsed
/// - `TaskError::Cancelled` if `cancel` fires
pub async fn wait_for_task<F>(
    platform: &dyn Platform,
    shop: &ShopId,
    id: &TaskId,
    options: &PollOptions,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<ShardedTask, TaskError>
where
    F: FnMut(f64),
{
    let started = Instant::now();
    let deadline = options.timeout.map(|timeout| started + timeout);
    let timed_out = || TaskError::TimedOut {
        id: id.clone(),
        elapsed: started.elapsed(),
    };

    let task = loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TaskError::Cancelled { id: id.clone() }),
            _ = deadline_reached(deadline) => return Err(timed_out()),
            result = platform.get_task(shop, id) => result?,
        };

        if task.is_done {
            break task;
        }

        tracing::debug!(task = %id, percentage = task.progress.percentage, "task pending");
        on_progress(task.progress.percentage);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TaskError::Cancelled { id: id.clone() }),
            _ = deadline_reached(deadline) => return Err(timed_out()),
            _ = tokio::time::sleep(options.interval) => {}
        }
    };

    on_progress(100.0);
    tracing::info!(task = %id, errors = task.errors.len(), "task done");
    Ok(task)
}

/// Poll a task while rendering a percentage bar on stderr.
///
/// The bar is finished on success. On failure it is finalized when dropped.
pub async fn wait_for_task_with_progress_bar(
    platform: &dyn Platform,
    ctx: &ShopContext,
    id: &TaskId,
    description: &str,
    cancel: &CancellationToken,
) -> Result<ShardedTask, TaskError> {
    let target = DrawTarget::stderr_if(ctx.show_progress);
    wait_with_target(platform, ctx, id, description, target, cancel).await
}

pub(crate) async fn wait_with_target(
    platform: &dyn Platform,
    ctx: &ShopContext,
    id: &TaskId,
    description: &str,
    target: DrawTarget,
    cancel: &CancellationToken,
) -> Result<ShardedTask, TaskError> {
    let bar = ProgressBar::new(100, target, percent_format(description));
    let task = wait_for_task(
        platform,
        &ctx.shop_id,
        id,
        &PollOptions::from(ctx),
        cancel,
        |percentage| bar.set_position(percent_position(percentage)),
    )
    .await?;
    bar.finish();
    Ok(task)
}

/// Map a reported percentage onto a bar of length 100.
fn percent_position(percentage: f64) -> u64 {
    if percentage.is_nan() {
        return 0;
    }
    percentage.clamp(0.0, 100.0).round() as u64
}
