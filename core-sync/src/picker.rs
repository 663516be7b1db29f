//! # Picker Session Controller
//!
//! Drives the external picker service: create a session, open the picker
//! URI in an external interaction, poll until the selection is set, fetch
//! the selected items and hand them to the [`IngestionEngine`].
//!
//! ## Flow
//!
//! ```text
//! start()
//!   ├─ CreatingSession      POST picker session, open popup (blocked → Idle)
//!   ├─ WaitingForSelection  poll status every interval, at most `max_polls`
//!   ├─ FetchingPhotos       close popup, fetch media items
//!   ├─ Saving               sequential ingestion (cancel() stops at item boundary)
//!   └─ Complete             auto-close to Idle after `close_delay`
//!      CompleteWithErrors   stays until acknowledge()
//! ```
//!
//! Any failure closes the popup, discards the session and returns to
//! `Idle` with the error kept in [`PickerController::last_error`].

use crate::ingestion::IngestionEngine;
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::types::{IngestionReport, PickerStep};
use crate::{Result, SyncError};
use bridge_traits::{
    ExternalInteraction, IngestionCandidate, InteractionLauncher, PhotoServiceApi, PopupGeometry,
    Sleeper,
};
use core_runtime::config::PickerConfig;
use core_runtime::events::{CoreEvent, EventBus, PickerEvent};
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

struct PickerState {
    step: PickerStep,
    session_id: Option<String>,
    error: Option<String>,
    popup: Option<Box<dyn ExternalInteraction>>,
    cancel: CancellationToken,
    report: Option<IngestionReport>,
}

impl PickerState {
    fn new() -> Self {
        Self {
            step: PickerStep::Idle,
            session_id: None,
            error: None,
            popup: None,
            cancel: CancellationToken::new(),
            report: None,
        }
    }

    fn close_popup(&mut self) {
        if let Some(popup) = self.popup.take() {
            if !popup.is_closed() {
                popup.close();
            }
        }
    }
}

pub struct PickerController {
    api: Arc<dyn PhotoServiceApi>,
    launcher: Arc<dyn InteractionLauncher>,
    sleeper: Arc<dyn Sleeper>,
    ingestion: Arc<IngestionEngine>,
    event_bus: EventBus,
    config: PickerConfig,
    close_delay: Duration,
    state: Mutex<PickerState>,
}

impl PickerController {
    pub fn new(
        api: Arc<dyn PhotoServiceApi>,
        launcher: Arc<dyn InteractionLauncher>,
        sleeper: Arc<dyn Sleeper>,
        ingestion: Arc<IngestionEngine>,
        event_bus: EventBus,
        config: PickerConfig,
        close_delay: Duration,
    ) -> Self {
        Self {
            api,
            launcher,
            sleeper,
            ingestion,
            event_bus,
            config,
            close_delay,
            state: Mutex::new(PickerState::new()),
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub async fn step(&self) -> PickerStep {
        self.state.lock().await.step
    }

    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.session_id.clone()
    }

    /// Error of the last failed attempt, cleared when a new one starts
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.error.clone()
    }

    /// Report of the last ingestion, kept until reset
    pub async fn last_report(&self) -> Option<IngestionReport> {
        self.state.lock().await.report.clone()
    }

    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.step.is_processing()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Run the whole picker flow once.
    ///
    /// Returns the ingestion report. An empty selection returns an empty
    /// report and goes back to `Idle` without saving anything.
    #[instrument(skip(self, sink))]
    pub async fn start(&self, sink: &dyn ProgressSink) -> Result<IngestionReport> {
        let cancel = {
            let mut state = self.state.lock().await;
            if state.step.is_processing() {
                return Err(SyncError::Busy {
                    operation: "picker".to_string(),
                });
            }
            state.close_popup();
            *state = PickerState::new();
            // Claimed under the same lock as the busy check
            state.step = state.step.transition(PickerStep::CreatingSession)?;
            state.cancel.clone()
        };
        debug!(step = %PickerStep::CreatingSession, "Picker step changed");
        sink.on_progress(ProgressUpdate::Step(PickerStep::CreatingSession));

        let session = match self.api.create_picker_session().await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e.into(), sink).await),
        };
        info!(
            session_id = %redact_if_sensitive("session_id", &session.id),
            picker_uri = %redact_if_sensitive("picker_uri", &session.picker_uri),
            "Picker session created"
        );
        self.state.lock().await.session_id = Some(session.id.clone());
        self.event_bus
            .emit(CoreEvent::Picker(PickerEvent::SessionCreated {
                session_id: session.id.clone(),
            }))
            .ok();

        let url = format!("{}{}", session.picker_uri, self.config.auto_close_suffix);
        let geometry = PopupGeometry::centered(
            self.config.popup_width,
            self.config.popup_height,
            self.config.screen_width,
            self.config.screen_height,
        );
        debug!(url = %redact_if_sensitive("picker_uri", &url), "Opening picker popup");
        let popup = match self.launcher.open(&url, geometry).await {
            Ok(Some(popup)) => popup,
            Ok(None) => return Err(self.fail(SyncError::PopupBlocked, sink).await),
            Err(e) => return Err(self.fail(e.into(), sink).await),
        };
        self.state.lock().await.popup = Some(popup);
        self.transition(PickerStep::WaitingForSelection, sink).await?;

        self.wait_for_selection(&session.id, sink).await?;

        self.state.lock().await.close_popup();
        self.transition(PickerStep::FetchingPhotos, sink).await?;

        let candidates: Vec<IngestionCandidate> =
            match self.api.picker_media_items(&session.id).await {
                Ok(response) => response
                    .media_items
                    .into_iter()
                    .map(IngestionCandidate::from)
                    .collect(),
                Err(e) => return Err(self.fail(e.into(), sink).await),
            };
        self.event_bus
            .emit(CoreEvent::Picker(PickerEvent::SelectionReceived {
                session_id: session.id.clone(),
                item_count: candidates.len(),
            }))
            .ok();

        if candidates.is_empty() {
            info!("Picker selection was empty");
            self.reset_state(sink).await;
            return Ok(IngestionReport::default());
        }

        self.transition(PickerStep::Saving, sink).await?;

        let report = match self.ingestion.ingest(&candidates, &cancel, sink).await {
            Ok(report) => report,
            Err(e) => return Err(self.fail(e, sink).await),
        };

        let terminal = report.final_step();
        self.state.lock().await.report = Some(report.clone());
        self.transition(terminal, sink).await?;

        if terminal == PickerStep::Complete {
            sink.on_progress(ProgressUpdate::Saved {
                count: report.saved,
            });
            self.sleeper.sleep(self.close_delay).await;
            let mut state = self.state.lock().await;
            if state.step == PickerStep::Complete {
                debug!("Auto-closing completed picker");
                *state = PickerState::new();
                drop(state);
                sink.on_progress(ProgressUpdate::Step(PickerStep::Idle));
            }
        }

        Ok(report)
    }

    /// Request cooperative cancellation of the running ingestion.
    ///
    /// The item being saved finishes; no later item starts. Outside of
    /// `Saving` this just resets an idle or finished picker.
    pub async fn cancel(&self, sink: &dyn ProgressSink) {
        let state = self.state.lock().await;
        match state.step {
            PickerStep::Saving => {
                info!("Picker closed while saving; cancelling after current item");
                state.cancel.cancel();
            }
            step if step.is_processing() => {
                debug!("Ignoring close while {}", step);
            }
            _ => {
                drop(state);
                self.reset_state(sink).await;
            }
        }
    }

    /// Acknowledge a finished run so the picker can be closed
    pub async fn acknowledge(&self, sink: &dyn ProgressSink) -> Result<()> {
        let step = self.step().await;
        if !step.is_terminal() {
            return Err(SyncError::InvalidStateTransition {
                from: step.to_string(),
                to: PickerStep::Idle.to_string(),
            });
        }
        self.reset_state(sink).await;
        Ok(())
    }

    /// Discard the session and all state; a stale session cannot be resumed
    pub async fn reset(&self, sink: &dyn ProgressSink) -> Result<()> {
        if self.is_busy().await {
            return Err(SyncError::Busy {
                operation: "picker".to_string(),
            });
        }
        self.reset_state(sink).await;
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn wait_for_selection(&self, session_id: &str, sink: &dyn ProgressSink) -> Result<()> {
        let max_polls = self.config.max_polls;

        for poll in 1..=max_polls {
            let status = match self.api.picker_session_status(session_id).await {
                Ok(status) => status,
                Err(e) => return Err(self.fail(e.into(), sink).await),
            };

            if status.media_items_set {
                info!(polls = poll, "Picker selection received");
                return Ok(());
            }

            if poll == max_polls {
                break;
            }

            let interval = self.poll_interval(status.polling_interval);
            debug!(poll, interval_ms = interval.as_millis() as u64, "Selection not set yet");
            self.sleeper.sleep(interval).await;
        }

        warn!(polls = max_polls, "Picker selection timed out");
        self.event_bus
            .emit(CoreEvent::Picker(PickerEvent::TimedOut {
                session_id: session_id.to_string(),
                polls: max_polls,
            }))
            .ok();
        Err(self
            .fail(SyncError::PickerTimeout { polls: max_polls }, sink)
            .await)
    }

    /// Configured interval, or the server's hint (milliseconds) when longer
    fn poll_interval(&self, server_hint_ms: Option<f64>) -> Duration {
        let hinted = server_hint_ms
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or_default();
        self.config.poll_interval.max(hinted)
    }

    async fn transition(&self, next: PickerStep, sink: &dyn ProgressSink) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.step = state.step.transition(next)?;
        }
        debug!(step = %next, "Picker step changed");
        sink.on_progress(ProgressUpdate::Step(next));
        Ok(())
    }

    /// Release popup and session, go back to `Idle`, and hand the error back
    async fn fail(&self, err: SyncError, sink: &dyn ProgressSink) -> SyncError {
        error!("Picker failed: {}", err);
        {
            let mut state = self.state.lock().await;
            state.close_popup();
            state.step = PickerStep::Idle;
            state.session_id = None;
            state.error = Some(err.to_string());
        }
        self.event_bus
            .emit(CoreEvent::Picker(PickerEvent::Failed {
                message: err.to_string(),
            }))
            .ok();
        sink.on_progress(ProgressUpdate::Step(PickerStep::Idle));
        err
    }

    async fn reset_state(&self, sink: &dyn ProgressSink) {
        {
            let mut state = self.state.lock().await;
            state.close_popup();
            *state = PickerState::new();
        }
        sink.on_progress(ProgressUpdate::Step(PickerStep::Idle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryExecutor;
    use crate::test_support::{MockPhotoApi, RecordingSink, RecordingSleeper};
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, MediaItemsResponse, PickerSession, PickerSessionStatus};
    use core_runtime::config::RetryConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeLauncher {
        blocked: bool,
        opened: StdMutex<Vec<(String, PopupGeometry)>>,
        closed: Arc<AtomicBool>,
    }

    struct FakePopup(Arc<AtomicBool>);

    impl ExternalInteraction for FakePopup {
        fn is_closed(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn close(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl InteractionLauncher for FakeLauncher {
        async fn open(
            &self,
            url: &str,
            geometry: PopupGeometry,
        ) -> BridgeResult<Option<Box<dyn ExternalInteraction>>> {
            self.opened.lock().unwrap().push((url.to_string(), geometry));
            if self.blocked {
                return Ok(None);
            }
            Ok(Some(Box::new(FakePopup(self.closed.clone()))))
        }
    }

    fn controller(
        api: MockPhotoApi,
        launcher: Arc<FakeLauncher>,
        sleeper: Arc<RecordingSleeper>,
        max_polls: u32,
    ) -> PickerController {
        let api: Arc<dyn PhotoServiceApi> = Arc::new(api);
        let bus = EventBus::new(64);
        let executor = RetryExecutor::new(RetryConfig::default(), sleeper.clone());
        let ingestion = Arc::new(IngestionEngine::new(api.clone(), executor, bus.clone()));
        PickerController::new(
            api,
            launcher,
            sleeper,
            ingestion,
            bus,
            PickerConfig {
                max_polls,
                ..PickerConfig::default()
            },
            Duration::from_secs(2),
        )
    }

    fn session() -> PickerSession {
        PickerSession {
            id: "s1".to_string(),
            picker_uri: "https://picker/abc".to_string(),
        }
    }

    fn not_set() -> PickerSessionStatus {
        PickerSessionStatus {
            media_items_set: false,
            polling_interval: None,
        }
    }

    #[tokio::test]
    async fn test_popup_opened_centered_with_auto_close_suffix() {
        let mut api = MockPhotoApi::new();
        api.expect_create_picker_session().returning(|| Ok(session()));
        api.expect_picker_session_status().returning(|_| {
            Ok(PickerSessionStatus {
                media_items_set: true,
                polling_interval: None,
            })
        });
        api.expect_picker_media_items().returning(|_| {
            Ok(MediaItemsResponse {
                media_items: vec![],
                count: 0,
            })
        });
        let launcher = Arc::new(FakeLauncher::default());
        let sink = RecordingSink::default();

        let report = controller(api, launcher.clone(), Arc::default(), 10)
            .start(&sink)
            .await
            .unwrap();

        assert_eq!(report.total, 0);
        let opened = launcher.opened.lock().unwrap();
        assert_eq!(opened[0].0, "https://picker/abc/autoclose");
        assert_eq!(opened[0].1, PopupGeometry::centered(800, 600, 1920, 1080));
        assert!(launcher.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_blocked_popup_reverts_to_idle() {
        let mut api = MockPhotoApi::new();
        api.expect_create_picker_session().returning(|| Ok(session()));
        api.expect_picker_session_status().never();
        let launcher = Arc::new(FakeLauncher {
            blocked: true,
            ..Default::default()
        });
        let picker = controller(api, launcher, Arc::default(), 10);

        let err = picker.start(&RecordingSink::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::PopupBlocked));
        assert_eq!(picker.step().await, PickerStep::Idle);
        assert_eq!(picker.session_id().await, None);
        assert!(picker.last_error().await.unwrap().contains("allow popups"));
    }

    #[tokio::test]
    async fn test_session_creation_failure_reverts_to_idle() {
        let mut api = MockPhotoApi::new();
        api.expect_create_picker_session().returning(|| {
            Err(BridgeError::Http {
                status: 502,
                message: "Picker service unavailable".to_string(),
            })
        });
        let launcher = Arc::new(FakeLauncher::default());
        let picker = controller(api, launcher.clone(), Arc::default(), 10);

        let err = picker.start(&RecordingSink::default()).await.unwrap_err();

        assert_eq!(err.status(), Some(502));
        assert_eq!(picker.step().await, PickerStep::Idle);
        assert!(launcher.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_cap_times_out_and_releases_popup() {
        let mut api = MockPhotoApi::new();
        api.expect_create_picker_session().returning(|| Ok(session()));
        api.expect_picker_session_status()
            .times(3)
            .returning(|_| Ok(not_set()));
        api.expect_picker_media_items().never();
        let launcher = Arc::new(FakeLauncher::default());
        let sleeper = Arc::new(RecordingSleeper::default());
        let picker = controller(api, launcher.clone(), sleeper.clone(), 3);

        let err = picker.start(&RecordingSink::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::PickerTimeout { polls: 3 }));
        assert_eq!(picker.step().await, PickerStep::Idle);
        assert_eq!(picker.session_id().await, None);
        assert!(launcher.closed.load(Ordering::SeqCst));
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_server_polling_interval_used_when_longer() {
        let mut api = MockPhotoApi::new();
        api.expect_create_picker_session().returning(|| Ok(session()));
        let mut polls = 0;
        api.expect_picker_session_status().returning(move |_| {
            polls += 1;
            Ok(PickerSessionStatus {
                media_items_set: polls > 2,
                polling_interval: if polls == 1 { Some(5000.0) } else { Some(100.0) },
            })
        });
        api.expect_picker_media_items().returning(|_| {
            Ok(MediaItemsResponse {
                media_items: vec![],
                count: 0,
            })
        });
        let sleeper = Arc::new(RecordingSleeper::default());
        let picker = controller(api, Arc::default(), sleeper.clone(), 10);

        picker.start(&RecordingSink::default()).await.unwrap();

        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(5), Duration::from_secs(2)]
        );
    }

    /// Launcher that parks inside `open` until released, then reports a blocked popup
    #[derive(Default)]
    struct GatedLauncher {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl InteractionLauncher for GatedLauncher {
        async fn open(
            &self,
            _url: &str,
            _geometry: PopupGeometry,
        ) -> BridgeResult<Option<Box<dyn ExternalInteraction>>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_second_start_while_in_flight_is_busy() {
        let mut api = MockPhotoApi::new();
        api.expect_create_picker_session()
            .times(1)
            .returning(|| Ok(session()));
        let api: Arc<dyn PhotoServiceApi> = Arc::new(api);
        let bus = EventBus::new(64);
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = RetryExecutor::new(RetryConfig::default(), sleeper.clone());
        let ingestion = Arc::new(IngestionEngine::new(api.clone(), executor, bus.clone()));
        let launcher = Arc::new(GatedLauncher::default());
        let picker = Arc::new(PickerController::new(
            api,
            launcher.clone(),
            sleeper,
            ingestion,
            bus,
            PickerConfig::default(),
            Duration::from_secs(2),
        ));

        let first = tokio::spawn({
            let picker = picker.clone();
            async move {
                let sink = RecordingSink::default();
                picker.start(&sink).await
            }
        });
        launcher.entered.notified().await;

        assert_eq!(picker.step().await, PickerStep::CreatingSession);
        let err = picker
            .start(&RecordingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Busy { .. }));
        assert!(picker.is_busy().await);

        launcher.release.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, Err(SyncError::PopupBlocked)));
        assert_eq!(picker.step().await, PickerStep::Idle);
    }

    #[tokio::test]
    async fn test_acknowledge_requires_finished_run() {
        let picker = controller(MockPhotoApi::new(), Arc::default(), Arc::default(), 10);
        let err = picker
            .acknowledge(&RecordingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
    }
}
