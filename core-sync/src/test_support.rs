//! Shared doubles for the in-crate unit tests

use crate::progress::{ProgressSink, ProgressUpdate};
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    ChunkUploadResult, IngestionCandidate, MediaItemsResponse, OperationMessage,
    PhotoExportStats, PhotoServiceApi, PhotoSyncRecord, PickerSession, PickerSessionStatus,
    SavePhotoResult, Sleeper, VerifyResult,
};
use bytes::Bytes;
use mockall::mock;
use std::sync::Mutex;
use std::time::Duration;

mock! {
    pub PhotoApi {}

    #[async_trait]
    impl PhotoServiceApi for PhotoApi {
        async fn create_picker_session(&self) -> BridgeResult<PickerSession>;
        async fn picker_session_status(&self, session_id: &str) -> BridgeResult<PickerSessionStatus>;
        async fn picker_media_items(&self, session_id: &str) -> BridgeResult<MediaItemsResponse>;
        async fn save_picker_item(&self, candidate: &IngestionCandidate) -> BridgeResult<SavePhotoResult>;
        async fn upload_chunk(
            &self,
            upload_id: &str,
            chunk_index: u32,
            is_last_chunk: bool,
            bytes: Bytes,
        ) -> BridgeResult<ChunkUploadResult>;
        async fn abort_chunked_upload(&self, upload_id: &str) -> BridgeResult<()>;
        async fn export_stats(&self) -> BridgeResult<PhotoExportStats>;
        async fn list_sync_records(&self) -> BridgeResult<Vec<PhotoSyncRecord>>;
        async fn export_photo(&self, photo_id: i64) -> BridgeResult<OperationMessage>;
        async fn import_photo(&self, photo_id: i64) -> BridgeResult<OperationMessage>;
        async fn verify_photo(&self, photo_id: i64) -> BridgeResult<VerifyResult>;
        async fn unlink_photo(&self, photo_id: i64) -> BridgeResult<OperationMessage>;
        async fn delete_photo(&self, photo_id: i64) -> BridgeResult<()>;
        async fn restore_photo(&self, photo_id: i64) -> BridgeResult<()>;
    }
}

/// Records requested delays without waiting
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

pub fn candidate(name: &str) -> IngestionCandidate {
    IngestionCandidate {
        id: format!("id-{}", name),
        name: name.to_string(),
        url: format!("https://photos.example/{}", name),
        mime_type: "image/jpeg".to_string(),
        edited_at: None,
    }
}

pub fn saved_result() -> SavePhotoResult {
    SavePhotoResult {
        success: true,
        skipped: false,
        photo_name: None,
        error: None,
    }
}
