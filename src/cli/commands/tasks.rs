//! tasks command - Wait for a background task

use std::io;

use anyhow::{Context as _, Result};

use super::{report_task_errors, Session};
use crate::core::types::TaskId;
use crate::task;
use crate::ui::output;

/// Wait for a task to finish, then list its messages and result file.
pub async fn wait(session: &Session, task_id: &str) -> Result<()> {
    let id = TaskId::new(task_id).context("Invalid task id")?;

    let task = task::wait_for_task_with_progress_bar(
        session.platform(),
        &session.ctx,
        &id,
        &format!("Task {}", id),
        &session.cancel,
    )
    .await?;

    report_task_errors(&task, &mut io::stdout())?;
    let message = match &task.result_file {
        Some(file) => format!("Task {} done, result file {}", id, file.id),
        None => format!("Task {} done", id),
    };
    output::print(message, session.verbosity);
    Ok(())
}
