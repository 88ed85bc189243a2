//! api::traits
//!
//! Platform trait definition and the wire types it exchanges.
//!
//! # Design
//!
//! The `Platform` trait is async because every operation involves network
//! I/O. All methods return `Result` so callers decide how to surface API
//! failures; nothing here retries.
//!
//! # Example
//!
//! ```ignore
//! use shopcli::api::{Platform, ApiError};
//! use shopcli::core::types::{ShopId, TaskId};
//!
//! async fn show(platform: &dyn Platform, shop: &ShopId, id: &TaskId) -> Result<(), ApiError> {
//!     let task = platform.get_task(shop, id).await?;
//!     println!("{}: {}%", task.id, task.progress.percentage);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::core::types::{
    Entity, ExportFormat, FileId, LengthUnit, ShopId, StorageClass, TaskId, WeightUnit,
};

/// Errors from platform operations.
///
/// These map the common failure modes of the REST API. Transport and
/// decoding failures carry a rendered message rather than the source error
/// so the type stays `Clone`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// No API token is available.
    #[error("authentication required")]
    AuthRequired,

    /// The token was rejected or lacks permissions.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reading a local upload source failed.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Progress of a sharded task as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Completion percentage, nominally in `[0, 100]`
    #[serde(default)]
    pub percentage: f64,
}

/// Reference to a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: FileId,
}

/// A per-row message attached to a finished task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub message: String,
}

/// A server-side background job (export, import).
///
/// `result_file` and `errors` are only meaningful once `is_done` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardedTask {
    pub id: TaskId,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub progress: TaskProgress,
    #[serde(default)]
    pub result_file: Option<FileRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<TaskMessage>,
}

impl ShardedTask {
    /// A task still in progress at the given percentage.
    pub fn pending(id: TaskId, percentage: f64) -> Self {
        Self {
            id,
            is_done: false,
            progress: TaskProgress { percentage },
            result_file: None,
            errors: Vec::new(),
        }
    }

    /// A finished task.
    pub fn done(id: TaskId, result_file: Option<FileId>) -> Self {
        Self {
            id,
            is_done: true,
            progress: TaskProgress { percentage: 100.0 },
            result_file: result_file.map(|id| FileRef { id }),
            errors: Vec::new(),
        }
    }

    /// Attach row-level messages.
    pub fn with_errors<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = messages
            .into_iter()
            .map(|m| TaskMessage { message: m.into() })
            .collect();
        self
    }
}

/// Metadata of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Direct URL, present for publicly readable files
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Time-limited direct URL for a private file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadUrl {
    pub url: String,
}

/// Reference to the task started by a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: TaskId,
}

/// Response of the export and import mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub sharded_task: Option<TaskRef>,
}

impl MutationResponse {
    /// Response carrying a task id.
    pub fn started(id: TaskId) -> Self {
        Self {
            sharded_task: Some(TaskRef { id }),
        }
    }

    /// The started task id, if the server returned one.
    pub fn task_id(&self) -> Option<&TaskId> {
        self.sharded_task.as_ref().map(|t| &t.id)
    }
}

/// Options for an import mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRequest {
    pub file_id: FileId,
    pub length_unit: LengthUnit,
    pub weight_unit: WeightUnit,
}

/// Readable source for an upload.
pub type UploadSource = Box<dyn AsyncRead + Send + Unpin>;

/// Callback receiving the cumulative number of bytes uploaded so far.
pub type UploadProgress<'a> = &'a (dyn Fn(u64) + Send + Sync);

/// Input to the generic upload routine.
pub struct UploadRequest {
    pub shop_id: ShopId,
    pub file_name: String,
    pub content_type: String,
    pub storage: StorageClass,
    /// Declared total size in bytes
    pub size: u64,
    pub source: UploadSource,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("shop_id", &self.shop_id)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("storage", &self.storage)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Result tag of the generic upload routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The file was stored.
    Ok(FileRecord),
    /// The server refused the upload or one of its chunks.
    Rejected { status: u16, message: String },
    /// The source ended before the declared size was sent.
    Incomplete { uploaded: u64, expected: u64 },
}

/// Stream of body chunks for a download.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// An opened download.
pub struct DownloadBody {
    /// `Content-Length` if the server sent one
    pub content_length: Option<u64>,
    /// `None` when the response carries no body
    pub stream: Option<ByteStream>,
}

impl fmt::Debug for DownloadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadBody")
            .field("content_length", &self.content_length)
            .field("has_body", &self.stream.is_some())
            .finish()
    }
}

/// The Platform trait for talking to the e-commerce API.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ApiError>`. Nothing is retried at this
/// layer; a failed call is reported to the caller as-is.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Implementation name (e.g., "rest", "mock").
    fn name(&self) -> &'static str;

    /// Look up a sharded task, fully expanded.
    async fn get_task(&self, shop: &ShopId, id: &TaskId) -> Result<ShardedTask, ApiError>;

    /// Look up file metadata.
    async fn get_file(&self, shop: &ShopId, id: &FileId) -> Result<FileRecord, ApiError>;

    /// Obtain a time-limited direct URL for a file without a public URL.
    async fn get_file_download_url(
        &self,
        shop: &ShopId,
        id: &FileId,
    ) -> Result<DownloadUrl, ApiError>;

    /// Open a plain GET on a direct URL.
    ///
    /// Non-success statuses are errors. The body is not read.
    async fn open_download(&self, url: &str) -> Result<DownloadBody, ApiError>;

    /// Upload a file, reporting cumulative progress.
    ///
    /// Transport failures are `Err`; refusals by the server are reported
    /// through the returned [`UploadOutcome`].
    async fn upload(
        &self,
        request: UploadRequest,
        progress: UploadProgress<'_>,
    ) -> Result<UploadOutcome, ApiError>;

    /// Start a bulk export.
    async fn start_export(
        &self,
        shop: &ShopId,
        entity: Entity,
        format: ExportFormat,
    ) -> Result<MutationResponse, ApiError>;

    /// Start a bulk import of an uploaded file.
    async fn start_import(
        &self,
        shop: &ShopId,
        entity: Entity,
        request: ImportRequest,
    ) -> Result<MutationResponse, ApiError>;
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_decodes_minimal_pending() {
        let body = r#"{"id": "t1", "is_done": false, "progress": {"percentage": 30}}"#;
        let task: ShardedTask = serde_json::from_str(body).unwrap();
        assert_eq!(task.id.as_str(), "t1");
        assert!(!task.is_done);
        assert_eq!(task.progress.percentage, 30.0);
        assert!(task.result_file.is_none());
        assert!(task.errors.is_empty());
    }

    #[test]
    fn task_decodes_done_with_errors() {
        let task: ShardedTask = serde_json::from_str(
            r#"{
                "id": "t1",
                "is_done": true,
                "progress": {"percentage": 100},
                "result_file": {"id": "f1"},
                "errors": [{"message": "row 3 invalid"}]
            }"#,
        )
        .unwrap();
        assert!(task.is_done);
        assert_eq!(task.result_file.unwrap().id.as_str(), "f1");
        assert_eq!(task.errors[0].message, "row 3 invalid");
    }

    #[test]
    fn task_tolerates_null_errors_and_missing_progress() {
        let task: ShardedTask =
            serde_json::from_str(r#"{"id": "t1", "is_done": true, "errors": null}"#).unwrap();
        assert!(task.errors.is_empty());
        assert_eq!(task.progress.percentage, 0.0);
    }

    #[test]
    fn mutation_response_without_task() {
        let resp: MutationResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.task_id().is_none());

        let resp: MutationResponse =
            serde_json::from_str(r#"{"sharded_task": {"id": "t9"}}"#).unwrap();
        assert_eq!(resp.task_id().unwrap().as_str(), "t9");
    }

    #[test]
    fn import_request_serializes_units() {
        let body = serde_json::to_value(ImportRequest {
            file_id: FileId::new("f1").unwrap(),
            length_unit: LengthUnit::In,
            weight_unit: WeightUnit::Lb,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"file_id": "f1", "length_unit": "in", "weight_unit": "lb"})
        );
    }

    #[test]
    fn api_error_display() {
        assert_eq!(ApiError::AuthRequired.to_string(), "authentication required");
        assert_eq!(
            ApiError::Api {
                status: 422,
                message: "Validation failed".into()
            }
            .to_string(),
            "API error: 422 - Validation failed"
        );
        assert_eq!(
            ApiError::NotFound("task t1".into()).to_string(),
            "not found: task t1"
        );
        assert_eq!(
            ApiError::Network("connection refused".into()).to_string(),
            "network error: connection refused"
        );
    }
}
