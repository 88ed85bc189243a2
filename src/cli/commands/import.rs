//! import command - Import an entity from a local file
//!
//! Uploads the file, starts the import against the uploaded file id and
//! waits for its task. Row-level messages are listed but do not fail the
//! command.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use tokio_util::sync::CancellationToken;

use super::{report_task_errors, Session};
use crate::api::{ImportRequest, Platform, ShardedTask};
use crate::core::context::ShopContext;
use crate::core::types::{Entity, LengthUnit, WeightUnit};
use crate::task;
use crate::transfer;
use crate::ui::output;

/// Run the import command.
///
/// Units not given on the command line come from the config file.
pub async fn import(
    session: &Session,
    entity: Entity,
    file: &Path,
    length_unit: Option<LengthUnit>,
    weight_unit: Option<WeightUnit>,
) -> Result<()> {
    let units = ImportUnits {
        length: length_unit.unwrap_or_else(|| session.config.length_unit()),
        weight: weight_unit.unwrap_or_else(|| session.config.weight_unit()),
    };

    let task = run_import(
        session.platform(),
        &session.ctx,
        &session.cancel,
        entity,
        file,
        units,
        &mut io::stdout(),
    )
    .await?;

    let message = if task.errors.is_empty() {
        format!("Imported {} from {}", entity, file.display())
    } else {
        format!(
            "Imported {} from {} with {} row message(s)",
            entity,
            file.display(),
            task.errors.len()
        )
    };
    output::print(message, session.verbosity);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ImportUnits {
    pub length: LengthUnit,
    pub weight: WeightUnit,
}

pub(crate) async fn run_import(
    platform: &dyn Platform,
    ctx: &ShopContext,
    cancel: &CancellationToken,
    entity: Entity,
    file: &Path,
    units: ImportUnits,
    out: &mut impl Write,
) -> Result<ShardedTask> {
    let file_id = transfer::upload_file_to_file(platform, ctx, file, cancel)
        .await
        .with_context(|| format!("Failed to upload {}", file.display()))?;
    tracing::debug!(file = %file_id, "import file uploaded");

    let request = ImportRequest {
        file_id,
        length_unit: units.length,
        weight_unit: units.weight,
    };
    let response = platform
        .start_import(&ctx.shop_id, entity, request)
        .await
        .with_context(|| format!("Failed to start import of {}", entity))?;
    let task_id = response
        .task_id()
        .cloned()
        .ok_or_else(|| anyhow!("Import of {} returned no task id", entity))?;
    tracing::info!(%entity, task = %task_id, "import started");

    let description = format!("Importing {}", entity);
    let task =
        task::wait_for_task_with_progress_bar(platform, ctx, &task_id, &description, cancel)
            .await?;
    report_task_errors(&task, out)?;
    Ok(task)
}
