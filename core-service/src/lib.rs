//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! picker popup, sleeper) into the photo sync core. Desktop apps typically
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`) and
//! call [`bootstrap_desktop`]; other hosts inject their own adapters through
//! [`PhotoSyncConfig::builder`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::PhotoServiceApi;
use core_runtime::config::PhotoSyncConfig;
use core_runtime::events::{EventBus, EventStream};
use core_sync::{
    ChunkedUploader, Confirmation, EventBusProgressSink, IngestionEngine, PickerController,
    ReconciliationService, RetryExecutor,
};
use provider_library_api::LibraryApiConnector;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Every component shares one [`EventBus`] and one retry policy. Components
/// are reference counted so hosts can hand them to their own tasks.
#[derive(Clone)]
pub struct PhotoSyncService {
    config: Arc<PhotoSyncConfig>,
    event_bus: EventBus,
    api: Arc<dyn PhotoServiceApi>,
    ingestion: Arc<IngestionEngine>,
    picker: Arc<PickerController>,
    uploader: Arc<ChunkedUploader>,
    reconciliation: Arc<ReconciliationService>,
}

impl PhotoSyncService {
    /// Create the service, talking to the library API at `config.api_base_url`.
    pub fn new(config: PhotoSyncConfig, confirmation: Arc<dyn Confirmation>) -> Result<Self> {
        config.validate()?;

        let api: Arc<dyn PhotoServiceApi> = Arc::new(
            LibraryApiConnector::new(config.http_client.clone(), config.api_base_url.clone())
                .with_timeout(config.request_timeout),
        );

        Ok(Self::with_api(config, api, confirmation))
    }

    /// Create the service over an existing [`PhotoServiceApi`] implementation.
    pub fn with_api(
        config: PhotoSyncConfig,
        api: Arc<dyn PhotoServiceApi>,
        confirmation: Arc<dyn Confirmation>,
    ) -> Self {
        let event_bus = EventBus::default();
        let executor = || RetryExecutor::new(config.retry, config.sleeper.clone());

        let ingestion = Arc::new(IngestionEngine::new(
            api.clone(),
            executor(),
            event_bus.clone(),
        ));

        let picker = Arc::new(PickerController::new(
            api.clone(),
            config.interaction_launcher.clone(),
            config.sleeper.clone(),
            ingestion.clone(),
            event_bus.clone(),
            config.picker.clone(),
            config.completion_close_delay,
        ));

        let uploader = Arc::new(ChunkedUploader::new(
            api.clone(),
            config.file_system.clone(),
            executor(),
            event_bus.clone(),
            config.upload.chunk_size,
        ));

        let reconciliation = Arc::new(ReconciliationService::new(
            api.clone(),
            confirmation,
            event_bus.clone(),
        ));

        info!(base_url = %config.api_base_url, "Photo sync service initialized");

        Self {
            config: Arc::new(config),
            event_bus,
            api,
            ingestion,
            picker,
            uploader,
            reconciliation,
        }
    }

    pub fn config(&self) -> &PhotoSyncConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to every event emitted by the pipeline
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Progress sink that republishes updates on the service's event bus
    pub fn progress_sink(&self) -> EventBusProgressSink {
        EventBusProgressSink::new(self.event_bus.clone())
    }

    pub fn api(&self) -> Arc<dyn PhotoServiceApi> {
        Arc::clone(&self.api)
    }

    pub fn ingestion(&self) -> Arc<IngestionEngine> {
        Arc::clone(&self.ingestion)
    }

    pub fn picker(&self) -> Arc<PickerController> {
        Arc::clone(&self.picker)
    }

    pub fn uploader(&self) -> Arc<ChunkedUploader> {
        Arc::clone(&self.uploader)
    }

    pub fn reconciliation(&self) -> Arc<ReconciliationService> {
        Arc::clone(&self.reconciliation)
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the reqwest HTTP client, `tokio::fs` file access and the console
/// picker launcher.
///
/// ```ignore
/// use core_service::bootstrap_desktop;
/// use core_sync::AutoConfirm;
///
/// let service = bootstrap_desktop("https://library.example/api", Arc::new(AutoConfirm))?;
/// let report = service.picker().start(&service.progress_sink()).await?;
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    api_base_url: impl Into<String>,
    confirmation: Arc<dyn Confirmation>,
) -> Result<PhotoSyncService> {
    let config = PhotoSyncConfig::builder()
        .api_base_url(api_base_url)
        .build()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    PhotoSyncService::new(config, confirmation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        ChunkUploadResult, ExternalInteraction, FileMetadata, FileSystemAccess, HttpClient,
        HttpRequest, HttpResponse, IngestionCandidate, InteractionLauncher, MediaItemsResponse,
        OperationMessage, PhotoExportStats, PhotoSyncRecord, PickerSession, PickerSessionStatus,
        PopupGeometry, SavePhotoResult, Sleeper, VerifyResult,
    };
    use bytes::Bytes;
    use core_runtime::events::{CoreEvent, PickerEvent};
    use core_sync::{AutoConfirm, PickerStep, ProgressSink, ProgressUpdate, ReconciliationOperation};
    use mockall::mock;
    use std::path::Path;
    use std::time::Duration;

    mock! {
        PhotoApi {}

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

    struct UnusedHttp;

    #[async_trait]
    impl HttpClient for UnusedHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            unreachable!("no request expected")
        }
    }

    struct UnusedFs;

    #[async_trait]
    impl FileSystemAccess for UnusedFs {
        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            unreachable!("no file access expected")
        }

        async fn read_range(&self, _path: &Path, _offset: u64, _len: usize) -> BridgeResult<Bytes> {
            unreachable!("no file access expected")
        }
    }

    struct BlockedLauncher;

    #[async_trait]
    impl InteractionLauncher for BlockedLauncher {
        async fn open(
            &self,
            _url: &str,
            _geometry: PopupGeometry,
        ) -> BridgeResult<Option<Box<dyn ExternalInteraction>>> {
            Ok(None)
        }
    }

    struct InstantSleeper;

    #[async_trait]
    impl Sleeper for InstantSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn config() -> PhotoSyncConfig {
        PhotoSyncConfig::builder()
            .api_base_url("https://library.example/api/")
            .http_client(Arc::new(UnusedHttp))
            .file_system(Arc::new(UnusedFs))
            .interaction_launcher(Arc::new(BlockedLauncher))
            .sleeper(Arc::new(InstantSleeper))
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_wires_idle_components() {
        let service = PhotoSyncService::new(config(), Arc::new(AutoConfirm)).unwrap();

        assert_eq!(service.config().api_base_url, "https://library.example/api");
        assert!(!service.ingestion().is_busy());
        assert!(!service.uploader().is_busy());
        for operation in ReconciliationOperation::ALL {
            assert!(!service.reconciliation().is_busy(operation));
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = config();
        config.upload.chunk_size = 0;

        let err = PhotoSyncService::new(config, Arc::new(AutoConfirm))
            .err()
            .expect("invalid config");

        assert!(matches!(err, CoreError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_progress_sink_publishes_on_service_bus() {
        let service =
            PhotoSyncService::with_api(config(), Arc::new(MockPhotoApi::new()), Arc::new(AutoConfirm));
        let mut rx = service.event_bus().subscribe();

        service
            .progress_sink()
            .on_progress(ProgressUpdate::Step(PickerStep::Saving));

        match rx.recv().await.unwrap() {
            CoreEvent::Picker(PickerEvent::StepChanged { step, .. }) => assert_eq!(step, "saving"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_picker_uses_injected_launcher() {
        let mut api = MockPhotoApi::new();
        api.expect_create_picker_session().times(1).returning(|| {
            Ok(PickerSession {
                id: "s1".to_string(),
                picker_uri: "https://picker/abc".to_string(),
            })
        });
        let service = PhotoSyncService::with_api(config(), Arc::new(api), Arc::new(AutoConfirm));
        let mut rx = service.event_bus().subscribe();

        let err = service
            .picker()
            .start(&service.progress_sink())
            .await
            .unwrap_err();

        assert!(matches!(err, core_sync::SyncError::PopupBlocked));
        assert_eq!(service.picker().step().await, PickerStep::Idle);

        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::Picker(PickerEvent::Failed { .. }) = event {
                failed = true;
            }
        }
        assert!(failed);
    }
}
