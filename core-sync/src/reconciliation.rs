//! # Export/Import Reconciliation
//!
//! Operations that move a photo between "local only", "remote only" and
//! "synchronized", plus the view of every photo's status.
//!
//! ## Preconditions
//!
//! | Operation | Valid when                     |
//! |-----------|--------------------------------|
//! | export    | has image, no permanent id     |
//! | import    | permanent id, no image         |
//! | verify    | permanent id                   |
//! | unlink    | permanent id (asks to confirm) |
//! | delete    | always (asks to confirm)       |
//! | restore   | always                         |
//!
//! The view is never patched locally: every mutation is followed by a full
//! refetch of records and statistics. Deleted photos stay in the view,
//! flagged, until restored.

use crate::progress::{ProgressSink, ProgressUpdate};
use crate::types::{
    BulkFailure, BulkOperation, BulkOperationReport, BusyFlag, ReconciliationOperation,
};
use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::{
    OperationMessage, PhotoExportStats, PhotoServiceApi, PhotoSyncRecord, VerifyResult,
};
use core_runtime::events::{
    CacheScope, CoreEvent, EventBus, LibraryEvent, ReconciliationEvent,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Confirmation
// ============================================================================

/// Asks the person before destructive operations
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Confirms everything; for non-interactive hosts
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmation for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

// ============================================================================
// View
// ============================================================================

/// Action offered for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Delete,
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSyncRow {
    pub record: PhotoSyncRecord,
    /// Soft-deleted and waiting for a possible restore
    pub deleted: bool,
}

impl PhotoSyncRow {
    pub fn available_action(&self) -> RowAction {
        if self.deleted {
            RowAction::Restore
        } else {
            RowAction::Delete
        }
    }
}

/// Last fetched records and statistics
#[derive(Debug, Clone, Default)]
pub struct ReconciliationView {
    records: Vec<PhotoSyncRecord>,
    stats: Option<PhotoExportStats>,
    /// Deleted photos, kept so their rows remain visible
    deleted: HashMap<i64, PhotoSyncRecord>,
}

impl ReconciliationView {
    pub fn stats(&self) -> Option<&PhotoExportStats> {
        self.stats.as_ref()
    }

    pub fn record(&self, photo_id: i64) -> Option<&PhotoSyncRecord> {
        self.records
            .iter()
            .find(|record| record.id == photo_id)
            .or_else(|| self.deleted.get(&photo_id))
    }

    pub fn is_deleted(&self, photo_id: i64) -> bool {
        self.deleted.contains_key(&photo_id)
    }

    /// Rows in server order; deleted photos the server no longer lists are
    /// appended at the end
    pub fn rows(&self) -> Vec<PhotoSyncRow> {
        let mut rows: Vec<PhotoSyncRow> = self
            .records
            .iter()
            .map(|record| PhotoSyncRow {
                record: record.clone(),
                deleted: self.is_deleted(record.id),
            })
            .collect();

        let mut missing: Vec<&PhotoSyncRecord> = self
            .deleted
            .values()
            .filter(|deleted| !self.records.iter().any(|r| r.id == deleted.id))
            .collect();
        missing.sort_by_key(|record| record.id);
        rows.extend(missing.into_iter().map(|record| PhotoSyncRow {
            record: record.clone(),
            deleted: true,
        }));

        rows
    }

    fn pending(&self, operation: BulkOperation) -> Vec<PhotoSyncRecord> {
        self.records
            .iter()
            .filter(|record| !self.is_deleted(record.id))
            .filter(|record| match operation {
                BulkOperation::Export => record.is_pending_export(),
                BulkOperation::Import => record.is_pending_import(),
            })
            .cloned()
            .collect()
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct ReconciliationService {
    api: Arc<dyn PhotoServiceApi>,
    confirmation: Arc<dyn Confirmation>,
    event_bus: EventBus,
    view: RwLock<ReconciliationView>,
    busy: [BusyFlag; 8],
}

impl ReconciliationService {
    pub fn new(
        api: Arc<dyn PhotoServiceApi>,
        confirmation: Arc<dyn Confirmation>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            api,
            confirmation,
            event_bus,
            view: RwLock::new(ReconciliationView::default()),
            busy: Default::default(),
        }
    }

    /// Snapshot of the current view
    pub async fn view(&self) -> ReconciliationView {
        self.view.read().await.clone()
    }

    pub async fn rows(&self) -> Vec<PhotoSyncRow> {
        self.view.read().await.rows()
    }

    pub fn is_busy(&self, operation: ReconciliationOperation) -> bool {
        self.busy[operation.index()].is_set()
    }

    /// Refetch records and statistics
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let records = self.api.list_sync_records().await?;
        let stats = self.api.export_stats().await?;

        let count = records.len();
        {
            let mut view = self.view.write().await;
            view.records = records;
            view.stats = Some(stats);
        }

        info!(records = count, "Photo sync view refreshed");
        self.event_bus
            .emit(CoreEvent::Reconciliation(ReconciliationEvent::Refreshed {
                records: count,
            }))
            .ok();
        Ok(())
    }

    // ========================================================================
    // Single-photo operations
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn export(&self, photo_id: i64) -> Result<OperationMessage> {
        let operation = ReconciliationOperation::Export;
        let _guard = self.busy[operation.index()].acquire(operation.as_str())?;
        self.require(operation, photo_id, |record| {
            if record.is_pending_export() {
                Ok(())
            } else if !record.has_image {
                Err("photo has no local image")
            } else {
                Err("photo is already exported")
            }
        })
        .await?;

        let result = self.api.export_photo(photo_id).await;
        self.finish(operation, photo_id, result, "Photo exported successfully!")
            .await
    }

    #[instrument(skip(self))]
    pub async fn import(&self, photo_id: i64) -> Result<OperationMessage> {
        let operation = ReconciliationOperation::Import;
        let _guard = self.busy[operation.index()].acquire(operation.as_str())?;
        self.require(operation, photo_id, |record| {
            if record.is_pending_import() {
                Ok(())
            } else if !record.has_permanent_id() {
                Err("photo has no permanent id")
            } else {
                Err("photo already has a local image")
            }
        })
        .await?;

        let result = self.api.import_photo(photo_id).await;
        self.finish(operation, photo_id, result, "Photo imported successfully!")
            .await
    }

    /// Check the remote link; does not change any state
    #[instrument(skip(self))]
    pub async fn verify(&self, photo_id: i64) -> Result<VerifyResult> {
        let operation = ReconciliationOperation::Verify;
        let _guard = self.busy[operation.index()].acquire(operation.as_str())?;
        self.require(operation, photo_id, Self::linked).await?;

        match self.api.verify_photo(photo_id).await {
            Ok(result) => {
                info!(valid = result.valid, "{}", result.describe(photo_id));
                Ok(result)
            }
            Err(e) => Err(self.failed(operation, photo_id, e.into())),
        }
    }

    /// Remove the remote linkage; returns `None` when not confirmed
    #[instrument(skip(self))]
    pub async fn unlink(&self, photo_id: i64) -> Result<Option<OperationMessage>> {
        let operation = ReconciliationOperation::Unlink;
        let _guard = self.busy[operation.index()].acquire(operation.as_str())?;
        self.require(operation, photo_id, Self::linked).await?;

        let prompt = format!(
            "Are you sure you want to unlink photo #{}? This will remove the permanent ID and the photo will need to be re-exported.",
            photo_id
        );
        if !self.confirmation.confirm(&prompt).await {
            info!("Unlink declined");
            return Ok(None);
        }

        let result = self.api.unlink_photo(photo_id).await;
        self.finish(operation, photo_id, result, "Photo unlinked successfully!")
            .await
            .map(Some)
    }

    /// Soft-delete; returns `false` when not confirmed
    #[instrument(skip(self))]
    pub async fn delete(&self, photo_id: i64) -> Result<bool> {
        let operation = ReconciliationOperation::Delete;
        let _guard = self.busy[operation.index()].acquire(operation.as_str())?;

        let prompt = format!("Are you sure you want to delete photo #{}?", photo_id);
        if !self.confirmation.confirm(&prompt).await {
            info!("Delete declined");
            return Ok(false);
        }

        if let Err(e) = self.api.delete_photo(photo_id).await {
            return Err(self.failed(operation, photo_id, e.into()));
        }

        {
            let mut view = self.view.write().await;
            let snapshot = view
                .records
                .iter()
                .find(|record| record.id == photo_id)
                .cloned();
            if let Some(record) = snapshot {
                view.deleted.insert(photo_id, record);
            }
        }

        self.completed(operation, photo_id, format!("Photo #{} deleted successfully!", photo_id));
        self.refresh_after_mutation().await;
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn restore(&self, photo_id: i64) -> Result<()> {
        let operation = ReconciliationOperation::Restore;
        let _guard = self.busy[operation.index()].acquire(operation.as_str())?;

        if let Err(e) = self.api.restore_photo(photo_id).await {
            return Err(self.failed(operation, photo_id, e.into()));
        }

        self.view.write().await.deleted.remove(&photo_id);
        self.completed(operation, photo_id, format!("Photo #{} restored successfully!", photo_id));
        self.refresh_after_mutation().await;
        Ok(())
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Export every photo with a local image and no permanent id.
    ///
    /// Returns `None` when the person declined.
    pub async fn export_all_pending(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Option<BulkOperationReport>> {
        self.run_bulk(BulkOperation::Export, sink).await
    }

    /// Import every linked photo without a local image.
    ///
    /// Returns `None` when the person declined.
    pub async fn import_all_pending(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Option<BulkOperationReport>> {
        self.run_bulk(BulkOperation::Import, sink).await
    }

    #[instrument(skip(self, sink))]
    async fn run_bulk(
        &self,
        bulk: BulkOperation,
        sink: &dyn ProgressSink,
    ) -> Result<Option<BulkOperationReport>> {
        let operation = match bulk {
            BulkOperation::Export => ReconciliationOperation::ExportAll,
            BulkOperation::Import => ReconciliationOperation::ImportAll,
        };
        let _guard = self.busy[operation.index()].acquire(operation.as_str())?;

        let pending = self.view.read().await.pending(bulk);
        if pending.is_empty() {
            let report = BulkOperationReport::new(bulk, 0);
            info!("{}", report.summary());
            return Ok(Some(report));
        }

        let prompt = match bulk {
            BulkOperation::Export => format!(
                "Are you sure you want to export {} pending photo(s)? This may take a while.",
                pending.len()
            ),
            BulkOperation::Import => format!(
                "Are you sure you want to import {} pending photo(s) from the photo store? This may take a while.",
                pending.len()
            ),
        };
        if !self.confirmation.confirm(&prompt).await {
            info!("Bulk {} declined", bulk.verb());
            return Ok(None);
        }

        let total = pending.len();
        let mut report = BulkOperationReport::new(bulk, total);

        for (index, record) in pending.iter().enumerate() {
            sink.on_progress(ProgressUpdate::Bulk {
                current: index + 1,
                total,
                verb: bulk.verb(),
            });

            let result = match bulk {
                BulkOperation::Export => self.api.export_photo(record.id).await,
                BulkOperation::Import => self.api.import_photo(record.id).await,
            };

            match result {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    let error = SyncError::from(e).to_string();
                    error!(
                        photo_id = record.id,
                        book = record.title().unwrap_or("N/A"),
                        "Failed to {} photo: {}",
                        bulk.verb(),
                        error
                    );
                    report.failures.push(BulkFailure {
                        photo_id: record.id,
                        title: record.title().map(String::from),
                        error,
                    });
                }
            }
        }

        if report.is_success() {
            info!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
        }
        self.refresh_after_mutation().await;
        Ok(Some(report))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn linked(record: &PhotoSyncRecord) -> std::result::Result<(), &'static str> {
        if record.has_permanent_id() {
            Ok(())
        } else {
            Err("photo has no permanent id")
        }
    }

    /// Check `check` against the photo's record in the current view
    async fn require<F>(
        &self,
        operation: ReconciliationOperation,
        photo_id: i64,
        check: F,
    ) -> Result<()>
    where
        F: FnOnce(&PhotoSyncRecord) -> std::result::Result<(), &'static str>,
    {
        let view = self.view.read().await;
        let record = view
            .record(photo_id)
            .ok_or_else(|| SyncError::InvalidOperation {
                operation: format!("{} photo #{}", operation, photo_id),
                reason: "photo is not in the current view; refresh first".to_string(),
            })?;

        check(record).map_err(|reason| SyncError::InvalidOperation {
            operation: format!("{} photo #{}", operation, photo_id),
            reason: reason.to_string(),
        })
    }

    async fn finish(
        &self,
        operation: ReconciliationOperation,
        photo_id: i64,
        result: bridge_traits::error::Result<OperationMessage>,
        fallback: &str,
    ) -> Result<OperationMessage> {
        let mut message = match result {
            Ok(message) => message,
            Err(e) => return Err(self.failed(operation, photo_id, e.into())),
        };
        if message.message.trim().is_empty() {
            message.message = fallback.to_string();
        }

        self.completed(operation, photo_id, message.message.clone());
        self.refresh_after_mutation().await;
        Ok(message)
    }

    fn completed(&self, operation: ReconciliationOperation, photo_id: i64, message: String) {
        info!(%operation, photo_id, "{}", message);
        self.event_bus
            .emit(CoreEvent::Reconciliation(
                ReconciliationEvent::OperationCompleted {
                    operation: operation.to_string(),
                    photo_id,
                    message,
                },
            ))
            .ok();
    }

    fn failed(
        &self,
        operation: ReconciliationOperation,
        photo_id: i64,
        err: SyncError,
    ) -> SyncError {
        error!(%operation, photo_id, "Failed to {} photo #{}: {}", operation, photo_id, err);
        self.event_bus
            .emit(CoreEvent::Reconciliation(ReconciliationEvent::OperationFailed {
                operation: operation.to_string(),
                photo_id,
                message: err.to_string(),
            }))
            .ok();
        err
    }

    /// Invalidate and refetch; a failed refetch never hides the mutation's result
    async fn refresh_after_mutation(&self) {
        self.event_bus
            .emit(CoreEvent::Library(LibraryEvent::CacheInvalidated {
                scope: CacheScope::PhotoExport,
            }))
            .ok();
        if let Err(e) = self.refresh().await {
            warn!("Failed to refresh photo sync view: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockPhotoApi;
    use bridge_traits::{BridgeError, ExportStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn record(id: i64, has_image: bool, permanent_id: Option<&str>) -> PhotoSyncRecord {
        PhotoSyncRecord {
            id,
            caption: None,
            export_status: ExportStatus::Pending,
            exported_at: None,
            permanent_id: permanent_id.map(String::from),
            export_error_message: None,
            content_type: Some("image/jpeg".to_string()),
            has_image,
            checksum: None,
            book_title: Some(format!("Book {}", id)),
            book_id: Some(id * 10),
            author_name: None,
            author_id: None,
        }
    }

    struct ScriptedConfirmation {
        answer: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedConfirmation {
        fn new(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Confirmation for ScriptedConfirmation {
        async fn confirm(&self, prompt: &str) -> bool {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer
        }
    }

    fn expect_refreshes(api: &mut MockPhotoApi, records: Vec<PhotoSyncRecord>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        api.expect_list_sync_records().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(records.clone())
        });
        api.expect_export_stats()
            .returning(|| Ok(PhotoExportStats::default()));
        count
    }

    async fn service(
        api: MockPhotoApi,
        confirmation: Arc<dyn Confirmation>,
    ) -> ReconciliationService {
        let service = ReconciliationService::new(Arc::new(api), confirmation, EventBus::new(64));
        service.refresh().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_export_rejected_when_already_linked() {
        let mut api = MockPhotoApi::new();
        expect_refreshes(&mut api, vec![record(1, true, Some("perm-1"))]);
        api.expect_export_photo().never();
        let service = service(api, Arc::new(AutoConfirm)).await;

        let err = service.export(1).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidOperation { .. }));
        assert!(err.to_string().contains("already exported"));
    }

    #[tokio::test]
    async fn test_export_refetches_view() {
        let mut api = MockPhotoApi::new();
        let refreshes = expect_refreshes(&mut api, vec![record(1, true, None)]);
        api.expect_export_photo()
            .times(1)
            .returning(|_| Ok(OperationMessage::default()));
        let service = service(api, Arc::new(AutoConfirm)).await;

        let message = service.export(1).await.unwrap();

        assert_eq!(message.message, "Photo exported successfully!");
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_import_requires_permanent_id_without_image() {
        let mut api = MockPhotoApi::new();
        expect_refreshes(&mut api, vec![record(1, false, None), record(2, false, Some("p"))]);
        api.expect_import_photo()
            .times(1)
            .returning(|_| Ok(OperationMessage {
                message: "Imported".to_string(),
                stats: None,
            }));
        let service = service(api, Arc::new(AutoConfirm)).await;

        assert!(service.import(1).await.is_err());
        assert_eq!(service.import(2).await.unwrap().message, "Imported");
    }

    #[tokio::test]
    async fn test_verify_does_not_refetch() {
        let mut api = MockPhotoApi::new();
        let refreshes = expect_refreshes(&mut api, vec![record(3, true, Some("perm-3"))]);
        api.expect_verify_photo().returning(|_| {
            Ok(VerifyResult {
                valid: true,
                message: "Photo exists".to_string(),
                filename: Some("cover.jpg".to_string()),
            })
        });
        let service = service(api, Arc::new(AutoConfirm)).await;

        let result = service.verify(3).await.unwrap();

        assert_eq!(result.describe(3), "Photo #3 verified: Photo exists (cover.jpg)");
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_declined_unlink_makes_no_call() {
        let mut api = MockPhotoApi::new();
        expect_refreshes(&mut api, vec![record(4, true, Some("perm-4"))]);
        api.expect_unlink_photo().never();
        let confirmation = ScriptedConfirmation::new(false);
        let service = service(api, confirmation.clone()).await;

        assert_eq!(service.unlink(4).await.unwrap(), None);
        assert!(confirmation.prompts.lock().unwrap()[0].contains("unlink photo #4"));
    }

    #[tokio::test]
    async fn test_delete_keeps_row_visible_until_restore() {
        let mut api = MockPhotoApi::new();
        let mut listed = 0;
        api.expect_list_sync_records().returning(move || {
            listed += 1;
            // The server stops listing photo 5 once it is deleted
            if listed == 1 {
                Ok(vec![record(5, true, None), record(6, true, None)])
            } else {
                Ok(vec![record(6, true, None)])
            }
        });
        api.expect_export_stats()
            .returning(|| Ok(PhotoExportStats::default()));
        api.expect_delete_photo().times(1).returning(|_| Ok(()));
        api.expect_restore_photo().times(1).returning(|_| Ok(()));
        let service = service(api, Arc::new(AutoConfirm)).await;

        assert!(service.delete(5).await.unwrap());

        let rows = service.rows().await;
        let row = rows.iter().find(|row| row.record.id == 5).unwrap();
        assert!(row.deleted);
        assert_eq!(row.available_action(), RowAction::Restore);

        service.restore(5).await.unwrap();
        let view = service.view().await;
        assert!(!view.is_deleted(5));
    }

    #[tokio::test]
    async fn test_failed_operation_surfaces_error() {
        let mut api = MockPhotoApi::new();
        let refreshes = expect_refreshes(&mut api, vec![record(7, true, None)]);
        api.expect_export_photo().returning(|_| {
            Err(BridgeError::Http {
                status: 500,
                message: "Photo store unavailable".to_string(),
            })
        });
        let service = service(api, Arc::new(AutoConfirm)).await;

        let err = service.export(7).await.unwrap_err();

        assert_eq!(err.to_string(), "Photo store unavailable");
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert!(!service.is_busy(ReconciliationOperation::Export));
    }

    #[tokio::test]
    async fn test_bulk_with_nothing_pending_asks_nothing() {
        let mut api = MockPhotoApi::new();
        expect_refreshes(&mut api, vec![record(8, true, Some("perm-8"))]);
        api.expect_export_photo().never();
        let confirmation = ScriptedConfirmation::new(true);
        let service = service(api, confirmation.clone()).await;

        let report = service
            .export_all_pending(&crate::progress::NoopProgressSink)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.summary(), "No pending photos to export.");
        assert!(confirmation.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_import_collects_failures() {
        let mut api = MockPhotoApi::new();
        expect_refreshes(
            &mut api,
            vec![
                record(1, false, Some("p1")),
                record(2, false, Some("p2")),
                record(3, true, None),
            ],
        );
        api.expect_import_photo().times(2).returning(|id| {
            if id == 2 {
                Err(BridgeError::Http {
                    status: 404,
                    message: "Remote photo not found".to_string(),
                })
            } else {
                Ok(OperationMessage::default())
            }
        });
        let service = service(api, Arc::new(AutoConfirm)).await;

        let report = service
            .import_all_pending(&crate::progress::NoopProgressSink)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(
            report.failures,
            vec![BulkFailure {
                photo_id: 2,
                title: Some("Book 2".to_string()),
                error: "Remote photo not found".to_string(),
            }]
        );
        assert_eq!(
            report.summary(),
            "Import completed: 1 succeeded, 1 failed. Failed books: Book 2"
        );
    }
}
