//! # Chunked Upload Transport
//!
//! Streams a large local archive to the import endpoint in fixed-size
//! chunks that share one upload id.
//!
//! Chunks go out strictly in index order; the server's cumulative counters
//! are only meaningful that way. After every acknowledgement the observable
//! [`UploadProgress`] is refreshed. When the upload ends, successfully or
//! not, the server-side partial state is dropped on a best-effort basis.

use crate::progress::{ProgressSink, ProgressUpdate};
use crate::retry::RetryExecutor;
use crate::types::{BusyFlag, UploadProgress};
use crate::{Result, SyncError};
use bridge_traits::{FileSystemAccess, PhotoServiceApi, PhotoZipImportItem, PhotoZipImportResult};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use core_runtime::logging::strip_path;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Number of chunks needed for `size` bytes
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    let chunk_size = chunk_size.max(1) as u64;
    size.div_ceil(chunk_size)
}

pub struct ChunkedUploader {
    api: Arc<dyn PhotoServiceApi>,
    file_system: Arc<dyn FileSystemAccess>,
    executor: RetryExecutor,
    event_bus: EventBus,
    chunk_size: usize,
    busy: BusyFlag,
    last_result: Mutex<Option<PhotoZipImportResult>>,
}

impl ChunkedUploader {
    pub fn new(
        api: Arc<dyn PhotoServiceApi>,
        file_system: Arc<dyn FileSystemAccess>,
        executor: RetryExecutor,
        event_bus: EventBus,
        chunk_size: usize,
    ) -> Self {
        Self {
            api,
            file_system,
            executor,
            event_bus,
            chunk_size,
            busy: BusyFlag::new(),
            last_result: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_set()
    }

    /// Server summary retained by the last upload, including failed ones
    pub async fn last_result(&self) -> Option<PhotoZipImportResult> {
        self.last_result.lock().await.clone()
    }

    /// Upload the archive at `path` and return the server's final summary.
    ///
    /// If the server never sends one, the summary is rebuilt from the
    /// per-chunk item lists.
    #[instrument(skip(self, path, sink), fields(file = %strip_path(&path.to_string_lossy())))]
    pub async fn upload(&self, path: &Path, sink: &dyn ProgressSink) -> Result<PhotoZipImportResult> {
        let _guard = self.busy.acquire("archive upload")?;
        *self.last_result.lock().await = None;

        let metadata = self.file_system.metadata(path).await?;
        if metadata.is_directory {
            return Err(SyncError::InvalidOperation {
                operation: "upload archive".to_string(),
                reason: "path is a directory".to_string(),
            });
        }
        if metadata.size == 0 {
            return Err(SyncError::InvalidOperation {
                operation: "upload archive".to_string(),
                reason: "file is empty".to_string(),
            });
        }

        let upload_id = Uuid::new_v4().to_string();
        let total_chunks = chunk_count(metadata.size, self.chunk_size);
        info!(
            %upload_id,
            total_bytes = metadata.size,
            total_chunks,
            "Starting chunked upload"
        );
        self.event_bus
            .emit(CoreEvent::Upload(UploadEvent::Started {
                upload_id: upload_id.clone(),
                total_bytes: metadata.size,
                total_chunks,
            }))
            .ok();

        let outcome = self
            .send_chunks(path, &upload_id, metadata.size, total_chunks, sink)
            .await;

        self.cleanup(&upload_id).await;

        match outcome {
            Ok(result) => {
                info!(
                    %upload_id,
                    total = result.total_files,
                    succeeded = result.success_count,
                    failed = result.failure_count,
                    skipped = result.skipped_count,
                    "Chunked upload finished"
                );
                self.event_bus
                    .emit(CoreEvent::Upload(UploadEvent::Completed {
                        upload_id,
                        total_files: result.total_files,
                        success_count: result.success_count,
                        failure_count: result.failure_count,
                        skipped_count: result.skipped_count,
                    }))
                    .ok();
                Ok(result)
            }
            Err(e) => {
                error!(%upload_id, "Chunked upload failed: {}", e);
                self.event_bus
                    .emit(CoreEvent::Upload(UploadEvent::Failed {
                        upload_id,
                        message: e.to_string(),
                    }))
                    .ok();
                Err(e)
            }
        }
    }

    async fn send_chunks(
        &self,
        path: &Path,
        upload_id: &str,
        total_bytes: u64,
        total_chunks: u64,
        sink: &dyn ProgressSink,
    ) -> Result<PhotoZipImportResult> {
        let chunk_size = self.chunk_size.max(1) as u64;
        let mut items: Vec<PhotoZipImportItem> = Vec::new();
        let mut final_result: Option<PhotoZipImportResult> = None;
        let mut progress = UploadProgress {
            upload_id: upload_id.to_string(),
            total_bytes,
            ..Default::default()
        };

        for index in 0..total_chunks {
            let offset = index * chunk_size;
            let len = chunk_size.min(total_bytes - offset) as usize;
            let bytes = self.file_system.read_range(path, offset, len).await?;
            if bytes.len() != len {
                return Err(SyncError::Upload {
                    message: format!(
                        "short read at byte {}: expected {} bytes, got {} (file changed during upload?)",
                        offset,
                        len,
                        bytes.len()
                    ),
                });
            }
            let chunk_index = index as u32;
            let is_last_chunk = index + 1 == total_chunks;

            debug!(chunk_index, len, is_last_chunk, "Uploading chunk");

            let api = &self.api;
            let chunk = &bytes;
            let ack = self
                .executor
                .run(
                    move || async move {
                        api.upload_chunk(upload_id, chunk_index, is_last_chunk, chunk.clone())
                            .await
                            .map_err(SyncError::from)
                    },
                    |attempt| warn!(chunk_index, attempt, "Retrying chunk"),
                )
                .await?;

            items.extend(ack.processed_photos.iter().cloned());

            progress.chunk_index = chunk_index;
            progress.bytes_sent = offset + bytes.len() as u64;
            progress.processed = ack.total_processed_so_far;
            progress.succeeded = ack.total_success_so_far;
            progress.failed = ack.total_failure_so_far;
            progress.skipped = ack.total_skipped_so_far;
            progress.complete = ack.complete;
            sink.on_progress(ProgressUpdate::Upload(progress.clone()));

            if let Some(result) = ack.final_result {
                *self.last_result.lock().await = Some(result.clone());
                final_result = Some(result);
            }

            if let Some(message) = ack.error_message.filter(|m| !m.trim().is_empty()) {
                return Err(SyncError::Upload {
                    message: format!("{} ({})", message, progress.counters()),
                });
            }

            if ack.complete {
                break;
            }
        }

        let result = match final_result {
            Some(result) => result,
            None => {
                debug!("No final result from server; summarizing {} item(s)", items.len());
                PhotoZipImportResult::from_items(items)
            }
        };
        *self.last_result.lock().await = Some(result.clone());
        Ok(result)
    }

    /// Drop server-side partial state; failures are logged and swallowed
    async fn cleanup(&self, upload_id: &str) {
        if let Err(e) = self.api.abort_chunked_upload(upload_id).await {
            warn!(%upload_id, "Upload cleanup failed: {}", e);
        }
    }
}
