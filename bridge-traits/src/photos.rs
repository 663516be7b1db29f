//! Photo Service Contract
//!
//! Request/response shapes and the async trait for the library's photo
//! endpoints: the picker session API, per-item saving, chunked archive
//! import and the export/import reconciliation surface.
//!
//! Field names follow the server's JSON (camelCase).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

// ============================================================================
// Picker
// ============================================================================

/// Handle returned when a picker session is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerSession {
    pub id: String,
    pub picker_uri: String,
}

/// Result of polling a picker session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerSessionStatus {
    #[serde(default)]
    pub media_items_set: bool,
    /// Server-suggested polling interval in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<f64>,
}

/// Media item as produced by the picker service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemsResponse {
    #[serde(default)]
    pub media_items: Vec<RawMediaItem>,
    #[serde(default)]
    pub count: usize,
}

/// Normalized picker item handed to ingestion
///
/// Serializes with the picker's field names so the save endpoint receives
/// the same shape the picker produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionCandidate {
    pub id: String,
    #[serde(rename = "filename")]
    pub name: String,
    #[serde(rename = "baseUrl")]
    pub url: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(
        rename = "lastEditedTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub edited_at: Option<String>,
}

impl From<RawMediaItem> for IngestionCandidate {
    fn from(item: RawMediaItem) -> Self {
        let name = item
            .filename
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| item.id.clone());

        Self {
            id: item.id,
            name,
            url: item.base_url,
            mime_type: item.mime_type,
            edited_at: item.last_edited_time,
        }
    }
}

/// Response to saving a single picker item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePhotoResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Chunked archive import
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportItemStatus {
    Success,
    Failure,
    Skipped,
}

/// Per-file entry of an archive import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoZipImportItem {
    pub filename: String,
    pub status: ImportItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Terminal summary of an archive import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoZipImportResult {
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub skipped_count: u64,
    #[serde(default)]
    pub items: Vec<PhotoZipImportItem>,
}

impl PhotoZipImportResult {
    /// Build a summary by counting item statuses
    pub fn from_items(items: Vec<PhotoZipImportItem>) -> Self {
        let count = |status: ImportItemStatus| {
            items.iter().filter(|item| item.status == status).count() as u64
        };

        Self {
            total_files: items.len() as u64,
            success_count: count(ImportItemStatus::Success),
            failure_count: count(ImportItemStatus::Failure),
            skipped_count: count(ImportItemStatus::Skipped),
            items,
        }
    }
}

/// Server acknowledgement of one uploaded chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResult {
    #[serde(default)]
    pub upload_id: String,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default)]
    pub processed_photos: Vec<PhotoZipImportItem>,
    #[serde(default)]
    pub total_processed_so_far: u64,
    #[serde(default)]
    pub total_success_so_far: u64,
    #[serde(default)]
    pub total_failure_so_far: u64,
    #[serde(default)]
    pub total_skipped_so_far: u64,
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<PhotoZipImportResult>,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ============================================================================
// Export / import reconciliation
// ============================================================================

/// Synchronization status as reported by the remote view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    PendingImport,
    NoImage,
    /// Any status text this client does not know; displayed as pending
    #[serde(other)]
    Unknown,
}

impl ExportStatus {
    /// Display text for the status
    pub fn label(&self) -> &'static str {
        match self {
            ExportStatus::Completed => "Completed",
            ExportStatus::Failed => "Failed",
            ExportStatus::InProgress => "In Progress",
            ExportStatus::NoImage => "No Image",
            ExportStatus::PendingImport => "Pending Import",
            ExportStatus::Pending | ExportStatus::Unknown => "Pending",
        }
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-photo synchronization record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSyncRecord {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub export_status: ExportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub has_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
}

impl PhotoSyncRecord {
    fn is_linked(&self) -> bool {
        self.permanent_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    /// Local bytes present and remotely linked
    pub fn is_synchronized(&self) -> bool {
        self.has_image && self.is_linked()
    }

    /// Local bytes present but never exported
    pub fn is_pending_export(&self) -> bool {
        self.has_image && !self.is_linked()
    }

    /// Remotely linked but local bytes missing
    pub fn is_pending_import(&self) -> bool {
        self.is_linked() && !self.has_image
    }

    /// Whether a remote link exists (verify/unlink are allowed)
    pub fn has_permanent_id(&self) -> bool {
        self.is_linked()
    }

    /// Title used when summarizing failures: book title, else author name
    pub fn title(&self) -> Option<&str> {
        self.book_title
            .as_deref()
            .or(self.author_name.as_deref())
    }
}

/// Aggregate counters of the reconciliation view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoExportStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub exported: u64,
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub pending_export: u64,
    #[serde(default)]
    pub pending_import: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
}

/// Response of export/import/unlink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PhotoExportStats>,
}

/// Response of verify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl VerifyResult {
    /// Human-readable outcome for photo `photo_id`
    pub fn describe(&self, photo_id: i64) -> String {
        if self.valid {
            match &self.filename {
                Some(filename) => format!(
                    "Photo #{} verified: {} ({})",
                    photo_id, self.message, filename
                ),
                None => format!("Photo #{} verified: {}", photo_id, self.message),
            }
        } else {
            format!("Photo #{} verification failed: {}", photo_id, self.message)
        }
    }
}

// ============================================================================
// Service trait
// ============================================================================

/// Remote photo endpoints of the library backend
///
/// Every method is one remote call. Implementations report non-2xx
/// responses as [`BridgeError::Http`](crate::error::BridgeError::Http) so
/// callers can classify them by status.
#[async_trait]
pub trait PhotoServiceApi: Send + Sync {
    async fn create_picker_session(&self) -> Result<PickerSession>;

    async fn picker_session_status(&self, session_id: &str) -> Result<PickerSessionStatus>;

    async fn picker_media_items(&self, session_id: &str) -> Result<MediaItemsResponse>;

    async fn save_picker_item(&self, candidate: &IngestionCandidate) -> Result<SavePhotoResult>;

    async fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_index: u32,
        is_last_chunk: bool,
        bytes: Bytes,
    ) -> Result<ChunkUploadResult>;

    /// Drop server-side partial state of an upload
    async fn abort_chunked_upload(&self, upload_id: &str) -> Result<()>;

    async fn export_stats(&self) -> Result<PhotoExportStats>;

    async fn list_sync_records(&self) -> Result<Vec<PhotoSyncRecord>>;

    async fn export_photo(&self, photo_id: i64) -> Result<OperationMessage>;

    async fn import_photo(&self, photo_id: i64) -> Result<OperationMessage>;

    async fn verify_photo(&self, photo_id: i64) -> Result<VerifyResult>;

    async fn unlink_photo(&self, photo_id: i64) -> Result<OperationMessage>;

    async fn delete_photo(&self, photo_id: i64) -> Result<()>;

    async fn restore_photo(&self, photo_id: i64) -> Result<()>;
}
