//! export command - Export an entity to a local file
//!
//! Starts the export, waits for its task with a percentage bar, lists any
//! row-level messages, then downloads the result file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use tokio_util::sync::CancellationToken;

use super::{report_task_errors, Session};
use crate::api::Platform;
use crate::core::context::ShopContext;
use crate::core::types::{Entity, ExportFormat};
use crate::task;
use crate::transfer::{self, DownloadSummary};
use crate::ui::output::{self, format_bytes};

/// Run the export command.
pub async fn export(
    session: &Session,
    entity: Entity,
    format: ExportFormat,
    out: Option<&Path>,
) -> Result<()> {
    let dest = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_destination(entity, format));

    let summary = run_export(
        session.platform(),
        &session.ctx,
        &session.cancel,
        entity,
        format,
        &dest,
        &mut io::stdout(),
    )
    .await?;

    output::print(
        format!(
            "Exported {} to {} ({})",
            entity,
            summary.path.display(),
            format_bytes(summary.bytes)
        ),
        session.verbosity,
    );
    Ok(())
}

/// `<entity>.<extension>` in the current directory.
fn default_destination(entity: Entity, format: ExportFormat) -> PathBuf {
    PathBuf::from(format!("{}.{}", entity, format.extension()))
}

pub(crate) async fn run_export(
    platform: &dyn Platform,
    ctx: &ShopContext,
    cancel: &CancellationToken,
    entity: Entity,
    format: ExportFormat,
    dest: &Path,
    out: &mut impl Write,
) -> Result<DownloadSummary> {
    let response = platform
        .start_export(&ctx.shop_id, entity, format)
        .await
        .with_context(|| format!("Failed to start export of {}", entity))?;
    let task_id = response
        .task_id()
        .cloned()
        .ok_or_else(|| anyhow!("Export of {} returned no task id", entity))?;
    tracing::info!(%entity, task = %task_id, "export started");

    let description = format!("Exporting {}", entity);
    let task =
        task::wait_for_task_with_progress_bar(platform, ctx, &task_id, &description, cancel)
            .await?;
    report_task_errors(&task, out)?;

    let file = task
        .result_file
        .ok_or_else(|| anyhow!("Export task {} finished without a result file", task_id))?;

    let summary = transfer::download_file_to_file(platform, ctx, &file.id, dest, cancel)
        .await
        .with_context(|| format!("Failed to download export to {}", dest.display()))?;
    Ok(summary)
}
