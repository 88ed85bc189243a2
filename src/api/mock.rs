//! api::mock
//!
//! Mock platform implementation for deterministic testing.
//!
//! # Design
//!
//! The mock keeps tasks, files and download bodies in memory. Task lookups
//! are scripted: each call consumes the next queued response and the last
//! one repeats forever, so a poll loop can be driven through any sequence of
//! states. Every call is recorded for later verification.
//!
//! # Example
//!
//! ```
//! use shopcli::api::mock::MockPlatform;
//! use shopcli::api::{Platform, ShardedTask};
//! use shopcli::core::types::{ShopId, TaskId};
//!
//! # tokio_test::block_on(async {
//! let id = TaskId::new("t1").unwrap();
//! let platform = MockPlatform::new().with_task_script(
//!     id.clone(),
//!     [ShardedTask::pending(id.clone(), 40.0), ShardedTask::done(id.clone(), None)],
//! );
//! let shop = ShopId::new("1").unwrap();
//!
//! assert!(!platform.get_task(&shop, &id).await.unwrap().is_done);
//! assert!(platform.get_task(&shop, &id).await.unwrap().is_done);
//! // The last response repeats.
//! assert!(platform.get_task(&shop, &id).await.unwrap().is_done);
//! # });
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use super::traits::{
    ApiError, DownloadBody, DownloadUrl, FileRecord, ImportRequest, MutationResponse, Platform,
    ShardedTask, UploadOutcome, UploadProgress, UploadRequest,
};
use crate::core::types::{Entity, ExportFormat, FileId, ShopId, StorageClass, TaskId};

/// Number of chunks a mock download body is split into.
const DOWNLOAD_CHUNKS: usize = 4;

/// Mock platform for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    inner: Arc<Mutex<MockPlatformInner>>,
}

#[derive(Debug, Default)]
struct MockPlatformInner {
    /// Scripted responses per task; the last entry is sticky.
    tasks: HashMap<TaskId, VecDeque<Result<ShardedTask, ApiError>>>,
    /// Stored file metadata.
    files: HashMap<FileId, FileRecord>,
    /// Download bodies by URL. `None` means the response has no body.
    downloads: HashMap<String, Option<Vec<u8>>>,
    /// Progress values reported by `upload` instead of the computed ones.
    upload_progress: Option<Vec<u64>>,
    /// Outcome returned by `upload` instead of storing the file.
    upload_outcome: Option<UploadOutcome>,
    /// Queued responses for export/import mutations.
    mutations: VecDeque<MutationResponse>,
    /// Counter for generated task ids.
    next_task: u64,
    /// Delay before `get_file_download_url` answers.
    lookup_delay: Option<Duration>,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    GetTask(ApiError),
    GetFile(ApiError),
    GetFileDownloadUrl(ApiError),
    OpenDownload(ApiError),
    /// Yield the first chunk of the body, then this error.
    DownloadStream(ApiError),
    Upload(ApiError),
    StartExport(ApiError),
    StartImport(ApiError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOperation {
    GetTask {
        id: TaskId,
    },
    GetFile {
        id: FileId,
    },
    GetFileDownloadUrl {
        id: FileId,
    },
    OpenDownload {
        url: String,
    },
    Upload {
        file_name: String,
        size: u64,
        storage: StorageClass,
    },
    StartExport {
        entity: Entity,
        format: ExportFormat,
    },
    StartImport {
        entity: Entity,
        request: ImportRequest,
    },
}

impl MockPlatform {
    /// Create an empty mock platform.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockPlatformInner {
                next_task: 1,
                ..Default::default()
            })),
        }
    }

    /// Script the responses of successive `get_task` calls for `id`.
    pub fn with_task_script<I>(self, id: TaskId, responses: I) -> Self
    where
        I: IntoIterator<Item = ShardedTask>,
    {
        for task in responses {
            self.push_task_result(id.clone(), Ok(task));
        }
        self
    }

    /// Append one scripted `get_task` result, which may be an error.
    pub fn push_task_result(&self, id: TaskId, result: Result<ShardedTask, ApiError>) {
        let mut inner = self.inner.lock().unwrap();
        inner.tasks.entry(id).or_default().push_back(result);
    }

    /// Store a file and make its content downloadable.
    ///
    /// Files with a `public_url` are served there; others are served from a
    /// private URL handed out by `get_file_download_url`.
    pub fn with_file(self, record: FileRecord, content: impl Into<Vec<u8>>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let url = record
                .public_url
                .clone()
                .unwrap_or_else(|| private_url(&record.id));
            inner.downloads.insert(url, Some(content.into()));
            inner.files.insert(record.id.clone(), record);
        }
        self
    }

    /// Serve `url` with the given body (`None` for no body at all).
    pub fn with_download(self, url: impl Into<String>, body: Option<Vec<u8>>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.downloads.insert(url.into(), body);
        }
        self
    }

    /// Report these cumulative values from `upload` instead of the real ones.
    pub fn with_upload_progress(self, values: impl Into<Vec<u64>>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.upload_progress = Some(values.into());
        }
        self
    }

    /// Return this outcome from `upload` instead of storing the file.
    pub fn with_upload_outcome(self, outcome: UploadOutcome) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.upload_outcome = Some(outcome);
        }
        self
    }

    /// Queue a response for the next export or import mutation.
    ///
    /// With nothing queued, mutations start a fresh task `task-N`.
    pub fn with_mutation_response(self, response: MutationResponse) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.mutations.push_back(response);
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Make `get_file_download_url` take this long before answering.
    pub fn with_lookup_delay(self, delay: Duration) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.lookup_delay = Some(delay);
        }
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Stored content of a file, if any (for test verification).
    pub fn file_content(&self, id: &FileId) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let record = inner.files.get(id)?;
        let url = record
            .public_url
            .clone()
            .unwrap_or_else(|| private_url(id));
        inner.downloads.get(&url).cloned().flatten()
    }

    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, expected: &str) -> Option<ApiError> {
        let inner = self.inner.lock().unwrap();
        match &inner.fail_on {
            Some(FailOn::GetTask(e)) if expected == "get_task" => Some(e.clone()),
            Some(FailOn::GetFile(e)) if expected == "get_file" => Some(e.clone()),
            Some(FailOn::GetFileDownloadUrl(e)) if expected == "get_file_download_url" => {
                Some(e.clone())
            }
            Some(FailOn::OpenDownload(e)) if expected == "open_download" => Some(e.clone()),
            Some(FailOn::DownloadStream(e)) if expected == "download_stream" => Some(e.clone()),
            Some(FailOn::Upload(e)) if expected == "upload" => Some(e.clone()),
            Some(FailOn::StartExport(e)) if expected == "start_export" => Some(e.clone()),
            Some(FailOn::StartImport(e)) if expected == "start_import" => Some(e.clone()),
            _ => None,
        }
    }

    fn next_mutation(&self) -> MutationResponse {
        let mut inner = self.inner.lock().unwrap();
        if let Some(response) = inner.mutations.pop_front() {
            return response;
        }
        let n = inner.next_task;
        inner.next_task += 1;
        // Valid by construction: the id is never empty.
        match TaskId::new(format!("task-{}", n)) {
            Ok(id) => MutationResponse::started(id),
            Err(_) => MutationResponse::default(),
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn private_url(id: &FileId) -> String {
    format!("mock://private/{}", id)
}

/// Split `content` into at most [`DOWNLOAD_CHUNKS`] pieces.
fn split_chunks(content: &[u8]) -> Vec<Bytes> {
    let size = content.len().div_ceil(DOWNLOAD_CHUNKS).max(1);
    content
        .chunks(size)
        .map(Bytes::copy_from_slice)
        .collect()
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_task(&self, _shop: &ShopId, id: &TaskId) -> Result<ShardedTask, ApiError> {
        self.record(MockOperation::GetTask { id: id.clone() });

        if let Some(err) = self.check_fail("get_task") {
            return Err(err);
        }

        let mut inner = self.inner.lock().unwrap();
        let script = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("task {}", id)))?;

        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        next.unwrap_or_else(|| Err(ApiError::NotFound(format!("task {}", id))))
    }

    async fn get_file(&self, _shop: &ShopId, id: &FileId) -> Result<FileRecord, ApiError> {
        self.record(MockOperation::GetFile { id: id.clone() });

        if let Some(err) = self.check_fail("get_file") {
            return Err(err);
        }

        let inner = self.inner.lock().unwrap();
        inner
            .files
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("file {}", id)))
    }

    async fn get_file_download_url(
        &self,
        _shop: &ShopId,
        id: &FileId,
    ) -> Result<DownloadUrl, ApiError> {
        self.record(MockOperation::GetFileDownloadUrl { id: id.clone() });

        if let Some(err) = self.check_fail("get_file_download_url") {
            return Err(err);
        }

        let delay = self.inner.lock().unwrap().lookup_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.inner.lock().unwrap();
        if !inner.files.contains_key(id) {
            return Err(ApiError::NotFound(format!("file {}", id)));
        }
        Ok(DownloadUrl {
            url: private_url(id),
        })
    }

    async fn open_download(&self, url: &str) -> Result<DownloadBody, ApiError> {
        self.record(MockOperation::OpenDownload {
            url: url.to_string(),
        });

        if let Some(err) = self.check_fail("open_download") {
            return Err(err);
        }

        let body = {
            let inner = self.inner.lock().unwrap();
            inner
                .downloads
                .get(url)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("download {}", url)))?
        };

        let content = match body {
            None => {
                return Ok(DownloadBody {
                    content_length: None,
                    stream: None,
                })
            }
            Some(content) if content.is_empty() => {
                return Ok(DownloadBody {
                    content_length: Some(0),
                    stream: None,
                })
            }
            Some(content) => content,
        };

        let content_length = Some(content.len() as u64);
        let mut items: Vec<Result<Bytes, ApiError>> =
            split_chunks(&content).into_iter().map(Ok).collect();
        if let Some(err) = self.check_fail("download_stream") {
            items.truncate(1);
            items.push(Err(err));
        }

        Ok(DownloadBody {
            content_length,
            stream: Some(Box::pin(futures_util::stream::iter(items))),
        })
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: UploadProgress<'_>,
    ) -> Result<UploadOutcome, ApiError> {
        let UploadRequest {
            file_name,
            storage,
            size,
            mut source,
            ..
        } = request;

        self.record(MockOperation::Upload {
            file_name: file_name.clone(),
            size,
            storage,
        });

        if let Some(err) = self.check_fail("upload") {
            return Err(err);
        }

        let mut content = Vec::new();
        source
            .read_to_end(&mut content)
            .await
            .map_err(|e| ApiError::Io(e.to_string()))?;

        let (scripted, outcome) = {
            let inner = self.inner.lock().unwrap();
            (inner.upload_progress.clone(), inner.upload_outcome.clone())
        };

        match scripted {
            Some(values) => values.into_iter().for_each(|v| progress(v)),
            None => {
                progress(0);
                let mut sent = 0u64;
                for chunk in split_chunks(&content) {
                    sent += chunk.len() as u64;
                    progress(sent);
                }
            }
        }

        if let Some(outcome) = outcome {
            return Ok(outcome);
        }

        let uploaded = content.len() as u64;
        if uploaded != size {
            return Ok(UploadOutcome::Incomplete {
                uploaded,
                expected: size,
            });
        }

        let id = FileId::new(format!("file-{}", uuid::Uuid::new_v4()))
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let record = FileRecord {
            public_url: match storage {
                StorageClass::Public => Some(format!("mock://public/{}", id)),
                StorageClass::Private => None,
            },
            id,
            size,
            name: Some(file_name),
        };

        let mut inner = self.inner.lock().unwrap();
        let url = record
            .public_url
            .clone()
            .unwrap_or_else(|| private_url(&record.id));
        inner.downloads.insert(url, Some(content));
        inner.files.insert(record.id.clone(), record.clone());

        Ok(UploadOutcome::Ok(record))
    }

    async fn start_export(
        &self,
        _shop: &ShopId,
        entity: Entity,
        format: ExportFormat,
    ) -> Result<MutationResponse, ApiError> {
        self.record(MockOperation::StartExport { entity, format });

        if let Some(err) = self.check_fail("start_export") {
            return Err(err);
        }
        Ok(self.next_mutation())
    }

    async fn start_import(
        &self,
        _shop: &ShopId,
        entity: Entity,
        request: ImportRequest,
    ) -> Result<MutationResponse, ApiError> {
        self.record(MockOperation::StartImport { entity, request });

        if let Some(err) = self.check_fail("start_import") {
            return Err(err);
        }
        Ok(self.next_mutation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn shop() -> ShopId {
        ShopId::new("1").unwrap()
    }

    fn file(id: &str, public_url: Option<&str>) -> FileRecord {
        FileRecord {
            id: FileId::new(id).unwrap(),
            size: 0,
            public_url: public_url.map(String::from),
            name: None,
        }
    }

    async fn collect(body: DownloadBody) -> Vec<Result<Bytes, ApiError>> {
        match body.stream {
            Some(stream) => stream.collect().await,
            None => Vec::new(),
        }
    }

    #[tokio::test]
    async fn task_script_last_entry_repeats() {
        let id = TaskId::new("t").unwrap();
        let platform = MockPlatform::new().with_task_script(
            id.clone(),
            [
                ShardedTask::pending(id.clone(), 10.0),
                ShardedTask::pending(id.clone(), 50.0),
            ],
        );

        let first = platform.get_task(&shop(), &id).await.unwrap();
        let second = platform.get_task(&shop(), &id).await.unwrap();
        let third = platform.get_task(&shop(), &id).await.unwrap();

        assert_eq!(first.progress.percentage, 10.0);
        assert_eq!(second.progress.percentage, 50.0);
        assert_eq!(third.progress.percentage, 50.0);
        assert_eq!(platform.operations().len(), 3);
    }

    #[tokio::test]
    async fn scripted_error_is_returned() {
        let id = TaskId::new("t").unwrap();
        let platform = MockPlatform::new();
        platform.push_task_result(id.clone(), Err(ApiError::RateLimited));

        let err = platform.get_task(&shop(), &id).await.unwrap_err();
        assert_eq!(err, ApiError::RateLimited);
    }

    #[tokio::test]
    async fn unknown_task_not_found() {
        let platform = MockPlatform::new();
        let err = platform
            .get_task(&shop(), &TaskId::new("nope").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn private_file_served_from_download_url() {
        let platform = MockPlatform::new().with_file(file("f1", None), b"hello world".to_vec());
        let id = FileId::new("f1").unwrap();

        let url = platform.get_file_download_url(&shop(), &id).await.unwrap();
        let body = platform.open_download(&url.url).await.unwrap();
        assert_eq!(body.content_length, Some(11));

        let chunks = collect(body).await;
        assert_eq!(chunks.len(), 4);
        let joined: Vec<u8> = chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect();
        assert_eq!(joined, b"hello world");
    }

    #[tokio::test]
    async fn download_without_body() {
        let platform = MockPlatform::new().with_download("mock://empty", None);
        let body = platform.open_download("mock://empty").await.unwrap();
        assert!(body.stream.is_none());
        assert!(body.content_length.is_none());
    }

    #[tokio::test]
    async fn download_stream_failure_after_first_chunk() {
        let platform = MockPlatform::new()
            .with_download("mock://x", Some(vec![1u8; 16]))
            .fail_on(FailOn::DownloadStream(ApiError::Network("reset".into())));

        let chunks = collect(platform.open_download("mock://x").await.unwrap()).await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert!(chunks[1].is_err());
    }

    #[tokio::test]
    async fn upload_stores_file_and_reports_progress() {
        let platform = MockPlatform::new();
        let seen = Mutex::new(Vec::new());
        let report = |n: u64| seen.lock().unwrap().push(n);

        let outcome = platform
            .upload(
                UploadRequest {
                    shop_id: shop(),
                    file_name: "data.csv".into(),
                    content_type: "text/csv".into(),
                    storage: StorageClass::Private,
                    size: 8,
                    source: Box::new(&b"a,b\n1,2\n"[..]),
                },
                &report,
            )
            .await
            .unwrap();

        let record = match outcome {
            UploadOutcome::Ok(record) => record,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(record.size, 8);
        assert_eq!(platform.file_content(&record.id).unwrap(), b"a,b\n1,2\n");
        assert_eq!(seen.into_inner().unwrap(), vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn upload_short_source_is_incomplete() {
        let platform = MockPlatform::new();
        let outcome = platform
            .upload(
                UploadRequest {
                    shop_id: shop(),
                    file_name: "x".into(),
                    content_type: "application/octet-stream".into(),
                    storage: StorageClass::Private,
                    size: 10,
                    source: Box::new(&b"abc"[..]),
                },
                &|_: u64| {},
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Incomplete {
                uploaded: 3,
                expected: 10
            }
        );
    }

    #[tokio::test]
    async fn mutations_generate_task_ids() {
        let platform = MockPlatform::new()
            .with_mutation_response(MutationResponse::default());

        let first = platform
            .start_export(&shop(), Entity::Products, ExportFormat::Csv)
            .await
            .unwrap();
        let second = platform
            .start_export(&shop(), Entity::Orders, ExportFormat::Xlsx)
            .await
            .unwrap();

        assert!(first.task_id().is_none());
        assert_eq!(second.task_id().unwrap().as_str(), "task-1");
    }

    #[tokio::test]
    async fn fail_on_start_import() {
        let platform = MockPlatform::new().fail_on(FailOn::StartImport(ApiError::Api {
            status: 422,
            message: "bad file".into(),
        }));

        let result = platform
            .start_import(
                &shop(),
                Entity::Products,
                ImportRequest {
                    file_id: FileId::new("f").unwrap(),
                    length_unit: Default::default(),
                    weight_unit: Default::default(),
                },
            )
            .await;
        assert!(matches!(result, Err(ApiError::Api { status: 422, .. })));
        assert!(matches!(
            platform.operations()[0],
            MockOperation::StartImport { entity: Entity::Products, .. }
        ));
    }

    #[test]
    fn platform_name() {
        assert_eq!(MockPlatform::new().name(), "mock");
    }
}
