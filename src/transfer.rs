//! transfer
//!
//! Streaming file download and upload with byte-level progress.
//!
//! # Design
//!
//! **Download**: the file's metadata decides the source URL. A public URL
//! is used as-is; otherwise exactly one extra lookup fetches a time-limited
//! direct URL. The body is streamed chunk by chunk into the destination.
//! Each chunk advances the bar as it passes, and a render loop keeps the bar
//! ticking in parallel. The two sides are joined so both have finished
//! before the function returns.
//!
//! **Upload**: the file is opened for streamed reading and handed to the
//! platform's generic upload routine. The routine reports cumulative byte
//! counts; a [`DeltaTracker`] turns those into increments so the bar is
//! never advanced twice for the same bytes.
//!
//! A destination left behind by a failed or cancelled download is removed.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter, ReadBuf};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, Platform, UploadOutcome, UploadRequest};
use crate::core::context::ShopContext;
use crate::core::types::{FileId, StorageClass};
use crate::ui::progress::{bytes_format, DrawTarget, ProgressBar};

/// Content type declared for every upload.
pub const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// How often the render loop redraws during a download.
const REDRAW_EVERY: Duration = Duration::from_millis(250);

/// Errors from file transfers.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("upload rejected ({status}): {message}")]
    UploadRejected { status: u16, message: String },

    #[error("upload incomplete: sent {uploaded} of {expected} bytes")]
    UploadIncomplete { uploaded: u64, expected: u64 },

    #[error("'{}' has no usable file name", .0.display())]
    MissingFileName(PathBuf),

    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| TransferError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Turns cumulative progress reports into increments.
///
/// Reports that do not move past the highest value seen yield zero, so a
/// repeated or out-of-order report never advances the bar twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaTracker {
    last: u64,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cumulative count and return the increment since the last one.
    pub fn advance(&mut self, cumulative: u64) -> u64 {
        let delta = cumulative.saturating_sub(self.last);
        self.last = self.last.max(cumulative);
        delta
    }

    /// Highest cumulative count seen.
    pub fn total(&self) -> u64 {
        self.last
    }
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub path: PathBuf,
    /// Bytes written to `path`
    pub bytes: u64,
}

/// Download a stored file to `dest`, rendering a byte bar on stderr.
///
/// `dest` is created or truncated before the body is fetched. A response
/// without a body leaves it empty and counts as success.
///
/// # Errors
///
/// API, transport and filesystem errors propagate. On any error after the
/// destination was created, it is removed again.
pub async fn download_file_to_file(
    platform: &dyn Platform,
    ctx: &ShopContext,
    file_id: &FileId,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<DownloadSummary, TransferError> {
    let target = DrawTarget::stderr_if(ctx.show_progress);
    download_with_target(platform, ctx, file_id, dest, target, cancel).await
}

pub(crate) async fn download_with_target(
    platform: &dyn Platform,
    ctx: &ShopContext,
    file_id: &FileId,
    dest: &Path,
    target: DrawTarget,
    cancel: &CancellationToken,
) -> Result<DownloadSummary, TransferError> {
    let record = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
        record = platform.get_file(&ctx.shop_id, file_id) => record?,
    };
    let url = match record.public_url {
        Some(url) => url,
        None => tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            found = platform.get_file_download_url(&ctx.shop_id, file_id) => found?.url,
        },
    };

    let file = tokio::fs::File::create(dest)
        .await
        .map_err(TransferError::io("create", dest))?;

    let description = record.name.unwrap_or_else(|| file_id.to_string());
    let bar = ProgressBar::new(record.size, target, bytes_format(description));

    match stream_to_file(platform, &url, file, dest, &bar, cancel).await {
        Ok(bytes) => {
            bar.finish();
            tracing::info!(file = %file_id, bytes, path = %dest.display(), "download complete");
            Ok(DownloadSummary {
                path: dest.to_path_buf(),
                bytes,
            })
        }
        Err(err) => {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                tracing::warn!(
                    path = %dest.display(),
                    error = %e,
                    "failed to remove partial download"
                );
            }
            Err(err)
        }
    }
}

/// Fetch `url` and write its body into `file`, advancing `bar` per chunk.
async fn stream_to_file(
    platform: &dyn Platform,
    url: &str,
    file: tokio::fs::File,
    dest: &Path,
    bar: &ProgressBar,
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
        body = platform.open_download(url) => body?,
    };

    let Some(stream) = body.stream else {
        tracing::debug!(path = %dest.display(), "download has no body");
        return Ok(0);
    };

    let mut tracked = stream.inspect(|chunk| {
        if let Ok(bytes) = chunk {
            bar.inc(bytes.len() as u64);
        }
    });

    let done = CancellationToken::new();
    let writer = async {
        // Stop the render loop however the writer exits.
        let _stop_render = done.clone().drop_guard();
        let mut out = BufWriter::new(file);
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                next = tracked.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            out.write_all(&chunk)
                .await
                .map_err(TransferError::io("write", dest))?;
            written += chunk.len() as u64;
        }

        out.flush().await.map_err(TransferError::io("write", dest))?;
        Ok::<_, TransferError>(written)
    };

    let (written, ()) = tokio::join!(writer, bar.redraw_until(done.clone(), REDRAW_EVERY));
    written
}

/// Upload a local file as private storage, rendering a byte bar on stderr.
///
/// Returns the id of the stored file.
///
/// # Errors
///
/// Any outcome other than success is an error carrying the server's status
/// and message, or the byte counts for an incomplete upload.
pub async fn upload_file_to_file(
    platform: &dyn Platform,
    ctx: &ShopContext,
    source: &Path,
    cancel: &CancellationToken,
) -> Result<FileId, TransferError> {
    let target = DrawTarget::stderr_if(ctx.show_progress);
    upload_with_target(platform, ctx, source, target, cancel).await
}

pub(crate) async fn upload_with_target(
    platform: &dyn Platform,
    ctx: &ShopContext,
    source: &Path,
    target: DrawTarget,
    cancel: &CancellationToken,
) -> Result<FileId, TransferError> {
    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| TransferError::MissingFileName(source.to_path_buf()))?
        .to_string();

    let size = tokio::fs::metadata(source)
        .await
        .map_err(TransferError::io("read", source))?
        .len();
    let file = tokio::fs::File::open(source)
        .await
        .map_err(TransferError::io("open", source))?;
    let read_error = ReadErrorSlot::default();
    let source_reader = read_error.watch(file);

    let bar = ProgressBar::new(size, target, bytes_format(file_name.clone()));
    let tracker = Mutex::new(DeltaTracker::new());
    let on_progress = |cumulative: u64| {
        let delta = tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .advance(cumulative);
        bar.inc(delta);
    };

    let request = UploadRequest {
        shop_id: ctx.shop_id.clone(),
        file_name,
        content_type: UPLOAD_CONTENT_TYPE.to_string(),
        storage: StorageClass::Private,
        size,
        source: Box::new(source_reader),
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
        outcome = platform.upload(request, &on_progress) => outcome,
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            return Err(match read_error.take() {
                Some(read) => TransferError::Io {
                    action: "read",
                    path: source.to_path_buf(),
                    source: read,
                },
                None => err.into(),
            })
        }
    };

    match outcome {
        UploadOutcome::Ok(record) => {
            bar.finish();
            tracing::info!(file = %record.id, size, "upload complete");
            Ok(record.id)
        }
        UploadOutcome::Rejected { status, message } => {
            Err(TransferError::UploadRejected { status, message })
        }
        UploadOutcome::Incomplete { uploaded, expected } => {
            Err(TransferError::UploadIncomplete { uploaded, expected })
        }
    }
}

/// Keeps the first read error of an upload source.
///
/// The platform only sees a copy of the error, so a local read failure can be
/// reported with its path instead of as an API error.
#[derive(Debug, Clone, Default)]
struct ReadErrorSlot(Arc<Mutex<Option<io::Error>>>);

impl ReadErrorSlot {
    fn watch<R>(&self, inner: R) -> WatchedSource<R> {
        WatchedSource {
            inner,
            slot: self.clone(),
        }
    }

    fn take(&self) -> Option<io::Error> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

struct WatchedSource<R> {
    inner: R,
    slot: ReadErrorSlot,
}

impl<R: AsyncRead + Unpin> AsyncRead for WatchedSource<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Err(err)) => {
                let copy = io::Error::new(err.kind(), err.to_string());
                let mut slot = self
                    .slot
                    .0
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                slot.get_or_insert(err);
                Poll::Ready(Err(copy))
            }
            other => other,
        }
    }
}
