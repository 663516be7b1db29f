//! Library API connector implementation
//!
//! Implements the `PhotoServiceApi` trait for the library backend.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::photos::{
    ChunkUploadResult, IngestionCandidate, MediaItemsResponse, OperationMessage,
    PhotoExportStats, PhotoServiceApi, PhotoSyncRecord, PickerSession, PickerSessionStatus,
    SavePhotoResult, VerifyResult,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::LibraryApiError;
use crate::types::{error_message_from_body, EmptyBody};

/// Picker and save endpoints
const BOOKS_FROM_FEED: &str = "/books-from-feed";

/// Photo resource endpoints (delete, restore, chunked archive import)
const PHOTOS: &str = "/photos";

/// Export/import reconciliation endpoints
const PHOTO_EXPORT: &str = "/photo-export";

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Library backend connector
///
/// Implements `PhotoServiceApi` over an injected `HttpClient`. Routes are
/// joined onto `base_url` (e.g. `https://library.example/api`).
///
/// # Example
///
/// ```ignore
/// use provider_library_api::LibraryApiConnector;
/// use bridge_traits::photos::PhotoServiceApi;
///
/// let connector = LibraryApiConnector::new(http_client, "https://library.example/api");
/// let stats = connector.export_stats().await?;
/// ```
pub struct LibraryApiConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Base URL without trailing slash
    base_url: String,

    timeout: Duration,
}

impl LibraryApiConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, self.url(path))
            .header("Accept", "application/json")
            .timeout(self.timeout)
    }

    /// Execute a request and turn non-2xx responses into status-carrying errors
    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;
        let status = response.status;

        if response.is_success() {
            debug!(status, "API request succeeded");
            return Ok(response);
        }

        if status == 401 {
            warn!("API request rejected: session is not authenticated");
            return Err(LibraryApiError::Unauthorized.into());
        }

        let message = error_message_from_body(&response.body);
        warn!(status, message = %message, "API request failed");
        Err(LibraryApiError::Api {
            status_code: status,
            message,
        }
        .into())
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            LibraryApiError::Parse(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    /// Parse a `{message, stats?}` body, tolerating an empty 200
    fn parse_operation_message(response: &HttpResponse, what: &str) -> Result<OperationMessage> {
        if response.body.is_empty() {
            return Ok(OperationMessage::default());
        }
        Self::parse(response, what)
    }
}

#[async_trait]
impl PhotoServiceApi for LibraryApiConnector {
    #[instrument(skip(self))]
    async fn create_picker_session(&self) -> Result<PickerSession> {
        let request = self
            .request(HttpMethod::Post, &format!("{}/picker-session", BOOKS_FROM_FEED))
            .json(&EmptyBody::default())?;

        let response = self.send(request).await?;
        let session: PickerSession = Self::parse(&response, "picker session")?;

        info!(session_id = %session.id, "Created picker session");
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn picker_session_status(&self, session_id: &str) -> Result<PickerSessionStatus> {
        let path = format!(
            "{}/picker-session/{}",
            BOOKS_FROM_FEED,
            urlencoding::encode(session_id)
        );
        let response = self.send(self.request(HttpMethod::Get, &path)).await?;
        Self::parse(&response, "picker session status")
    }

    #[instrument(skip(self))]
    async fn picker_media_items(&self, session_id: &str) -> Result<MediaItemsResponse> {
        let path = format!(
            "{}/picker-session/{}/media-items",
            BOOKS_FROM_FEED,
            urlencoding::encode(session_id)
        );
        let response = self.send(self.request(HttpMethod::Get, &path)).await?;
        let items: MediaItemsResponse = Self::parse(&response, "media items")?;

        info!(count = items.media_items.len(), "Fetched picked media items");
        Ok(items)
    }

    #[instrument(skip(self, candidate), fields(item_id = %candidate.id))]
    async fn save_picker_item(&self, candidate: &IngestionCandidate) -> Result<SavePhotoResult> {
        let request = self
            .request(
                HttpMethod::Post,
                &format!("{}/save-from-picker-item", BOOKS_FROM_FEED),
            )
            .json(candidate)?;

        let response = self.send(request).await?;
        Self::parse(&response, "save result")
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_index: u32,
        is_last_chunk: bool,
        bytes: Bytes,
    ) -> Result<ChunkUploadResult> {
        let request = self
            .request(HttpMethod::Put, &format!("{}/import-zip-chunk", PHOTOS))
            .header("X-Upload-Id", upload_id)
            .header("X-Chunk-Index", chunk_index.to_string())
            .header("X-Is-Last-Chunk", is_last_chunk.to_string())
            .octet_stream(bytes);

        let response = self.send(request).await?;
        Self::parse(&response, "chunk upload result")
    }

    #[instrument(skip(self))]
    async fn abort_chunked_upload(&self, upload_id: &str) -> Result<()> {
        let path = format!(
            "{}/import-zip-chunk/{}",
            PHOTOS,
            urlencoding::encode(upload_id)
        );
        self.send(self.request(HttpMethod::Delete, &path)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn export_stats(&self) -> Result<PhotoExportStats> {
        let path = format!("{}/stats", PHOTO_EXPORT);
        let response = self.send(self.request(HttpMethod::Get, &path)).await?;
        Self::parse(&response, "export stats")
    }

    #[instrument(skip(self))]
    async fn list_sync_records(&self) -> Result<Vec<PhotoSyncRecord>> {
        let path = format!("{}/photos", PHOTO_EXPORT);
        let response = self.send(self.request(HttpMethod::Get, &path)).await?;
        let records: Vec<PhotoSyncRecord> = Self::parse(&response, "photo sync records")?;

        debug!(count = records.len(), "Fetched photo sync records");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn export_photo(&self, photo_id: i64) -> Result<OperationMessage> {
        let path = format!("{}/export/{}", PHOTO_EXPORT, photo_id);
        let response = self.send(self.request(HttpMethod::Post, &path)).await?;
        Self::parse_operation_message(&response, "export response")
    }

    #[instrument(skip(self))]
    async fn import_photo(&self, photo_id: i64) -> Result<OperationMessage> {
        let path = format!("{}/import/{}", PHOTO_EXPORT, photo_id);
        let response = self.send(self.request(HttpMethod::Post, &path)).await?;
        Self::parse_operation_message(&response, "import response")
    }

    #[instrument(skip(self))]
    async fn verify_photo(&self, photo_id: i64) -> Result<VerifyResult> {
        let path = format!("{}/verify/{}", PHOTO_EXPORT, photo_id);
        let response = self.send(self.request(HttpMethod::Post, &path)).await?;
        Self::parse(&response, "verify response")
    }

    #[instrument(skip(self))]
    async fn unlink_photo(&self, photo_id: i64) -> Result<OperationMessage> {
        let path = format!("{}/unlink/{}", PHOTO_EXPORT, photo_id);
        let response = self.send(self.request(HttpMethod::Post, &path)).await?;
        Self::parse_operation_message(&response, "unlink response")
    }

    #[instrument(skip(self))]
    async fn delete_photo(&self, photo_id: i64) -> Result<()> {
        let path = format!("{}/{}", PHOTOS, photo_id);
        self.send(self.request(HttpMethod::Delete, &path)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn restore_photo(&self, photo_id: i64) -> Result<()> {
        let path = format!("{}/{}/restore", PHOTOS, photo_id);
        let request = self
            .request(HttpMethod::Post, &path)
            .json(&EmptyBody::default())?;
        self.send(request).await?;
        Ok(())
    }
}
