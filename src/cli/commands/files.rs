//! files command - Download and upload stored files

use std::path::Path;

use anyhow::{Context as _, Result};

use super::Session;
use crate::core::types::FileId;
use crate::transfer;
use crate::ui::output::{self, format_bytes};

/// Download a stored file to `dest`.
pub async fn download(session: &Session, file_id: &str, dest: &Path) -> Result<()> {
    let id = FileId::new(file_id).context("Invalid file id")?;

    let summary = transfer::download_file_to_file(
        session.platform(),
        &session.ctx,
        &id,
        dest,
        &session.cancel,
    )
    .await
    .with_context(|| format!("Failed to download file {}", id))?;

    output::print(
        format!(
            "Downloaded {} to {} ({})",
            id,
            summary.path.display(),
            format_bytes(summary.bytes)
        ),
        session.verbosity,
    );
    Ok(())
}

/// Upload a local file as private storage and print the new file id.
///
/// The id goes to stdout even in quiet mode so it can be captured.
pub async fn upload(session: &Session, path: &Path) -> Result<()> {
    let id = transfer::upload_file_to_file(session.platform(), &session.ctx, path, &session.cancel)
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;

    println!("{}", id);
    Ok(())
}
