//! api::rest
//!
//! `Platform` implementation over the hosted REST API.
//!
//! # Design
//!
//! All authenticated calls go through [`ApiRequest`] selectors. Direct
//! downloads are the exception: the URL is pre-signed (or public), so the GET
//! is sent without the bearer token.
//!
//! Uploads use a three-step chunked session:
//! 1. `POST /shops/{shop_id}/uploads` opens a session and returns the chunk size
//! 2. `PUT .../chunks/{index}` once per chunk, read lazily from the source
//! 3. `POST .../complete` returns the stored file
//!
//! # Example
//!
//! ```ignore
//! use shopcli::api::{Platform, RestPlatform};
//!
//! let platform = RestPlatform::new("https://api.example-commerce.com/v1", Some(token))?;
//! let file = platform.get_file(&shop, &file_id).await?;
//! ```

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use super::request::{endpoints, error_for_status, ApiRequest};
use super::traits::{
    ApiError, DownloadBody, DownloadUrl, FileRecord, ImportRequest, MutationResponse, Platform,
    ShardedTask, UploadOutcome, UploadProgress, UploadRequest,
};
use crate::core::types::{Entity, ExportFormat, FileId, ShopId, StorageClass, TaskId};

/// Chunk size used when the server does not announce one.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// REST platform client.
pub struct RestPlatform {
    client: Client,
    api_base: Url,
    token: Option<String>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for RestPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestPlatform")
            .field("api_base", &self.api_base.as_str())
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl RestPlatform {
    /// Create a client for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the base URL does not parse.
    pub fn new(api_base: &str, token: Option<String>) -> Result<Self, ApiError> {
        let api_base = Url::parse(api_base).map_err(|e| {
            ApiError::InvalidRequest(format!("invalid API base '{}': {}", api_base, e))
        })?;
        Ok(Self {
            client: Client::new(),
            api_base,
            token,
        })
    }

    /// The configured API base.
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    fn request(&self, selector: &str) -> ApiRequest<'_> {
        ApiRequest::new(&self.client, &self.api_base, self.token.as_deref(), selector)
    }
}

#[derive(Serialize)]
struct CreateUpload<'a> {
    file_name: &'a str,
    content_type: &'a str,
    size: u64,
    storage: StorageClass,
}

#[derive(Deserialize)]
struct UploadSession {
    upload_id: String,
    #[serde(default)]
    chunk_size: Option<u64>,
}

#[derive(Deserialize)]
struct CompletedUpload {
    file: FileRecord,
}

#[derive(Serialize)]
struct ExportBody {
    format: ExportFormat,
}

/// Turn a server refusal into an outcome and pass anything else through.
fn rejected_or_err(err: ApiError) -> Result<UploadOutcome, ApiError> {
    match err {
        ApiError::Api { status, message } => Ok(UploadOutcome::Rejected { status, message }),
        ApiError::NotFound(message) => Ok(UploadOutcome::Rejected {
            status: StatusCode::NOT_FOUND.as_u16(),
            message,
        }),
        other => Err(other),
    }
}

#[async_trait]
impl Platform for RestPlatform {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn get_task(&self, shop: &ShopId, id: &TaskId) -> Result<ShardedTask, ApiError> {
        self.request(endpoints::GET_SHARDED_TASK)
            .shop_id(shop)
            .ids([id.as_str()])
            .expand_items(true)
            .unwrap()
            .await
    }

    async fn get_file(&self, shop: &ShopId, id: &FileId) -> Result<FileRecord, ApiError> {
        self.request(endpoints::GET_FILE)
            .shop_id(shop)
            .ids([id.as_str()])
            .unwrap()
            .await
    }

    async fn get_file_download_url(
        &self,
        shop: &ShopId,
        id: &FileId,
    ) -> Result<DownloadUrl, ApiError> {
        self.request(endpoints::GET_FILE_DOWNLOAD_URL)
            .shop_id(shop)
            .ids([id.as_str()])
            .unwrap()
            .await
    }

    async fn open_download(&self, url: &str) -> Result<DownloadBody, ApiError> {
        let url = Url::parse(url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid download URL: {}", e)))?;

        tracing::debug!(host = url.host_str().unwrap_or(""), "opening download");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("shopcli/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(status, response).await);
        }

        let content_length = response.content_length();
        if status == StatusCode::NO_CONTENT || content_length == Some(0) {
            return Ok(DownloadBody {
                content_length,
                stream: None,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ApiError::Network(e.to_string())));

        Ok(DownloadBody {
            content_length,
            stream: Some(Box::pin(stream)),
        })
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: UploadProgress<'_>,
    ) -> Result<UploadOutcome, ApiError> {
        let UploadRequest {
            shop_id,
            file_name,
            content_type,
            storage,
            size,
            source,
        } = request;

        let session: UploadSession = match self
            .request(endpoints::CREATE_UPLOAD)
            .shop_id(&shop_id)
            .json(&CreateUpload {
                file_name: &file_name,
                content_type: &content_type,
                size,
                storage,
            })
            .unwrap()
            .await
        {
            Ok(session) => session,
            Err(err) => return rejected_or_err(err),
        };

        let chunk_size = session.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1);
        tracing::debug!(upload_id = %session.upload_id, chunk_size, size, "upload session opened");

        progress(0);

        // Never send more than was declared.
        let mut source = source.take(size);
        let mut uploaded: u64 = 0;
        let mut index: u64 = 0;
        loop {
            let mut chunk = Vec::new();
            (&mut source)
                .take(chunk_size)
                .read_to_end(&mut chunk)
                .await
                .map_err(|e| ApiError::Io(e.to_string()))?;
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len() as u64;

            if let Err(err) = self
                .request(endpoints::UPLOAD_CHUNK)
                .shop_id(&shop_id)
                .param("upload_id", session.upload_id.as_str())
                .param("index", index.to_string())
                .bytes(chunk)
                .send()
                .await
            {
                return rejected_or_err(err);
            }

            uploaded += len;
            index += 1;
            progress(uploaded);
        }

        if uploaded != size {
            return Ok(UploadOutcome::Incomplete {
                uploaded,
                expected: size,
            });
        }

        match self
            .request(endpoints::COMPLETE_UPLOAD)
            .shop_id(&shop_id)
            .param("upload_id", session.upload_id.as_str())
            .unwrap::<CompletedUpload>()
            .await
        {
            Ok(done) => Ok(UploadOutcome::Ok(done.file)),
            Err(err) => rejected_or_err(err),
        }
    }

    async fn start_export(
        &self,
        shop: &ShopId,
        entity: Entity,
        format: ExportFormat,
    ) -> Result<MutationResponse, ApiError> {
        self.request(endpoints::START_EXPORT)
            .shop_id(shop)
            .param("entity", entity.as_str())
            .json(&ExportBody { format })
            .unwrap()
            .await
    }

    async fn start_import(
        &self,
        shop: &ShopId,
        entity: Entity,
        request: ImportRequest,
    ) -> Result<MutationResponse, ApiError> {
        self.request(endpoints::START_IMPORT)
            .shop_id(shop)
            .param("entity", entity.as_str())
            .json(&request)
            .unwrap()
            .await
    }
}
