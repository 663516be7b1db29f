//! # Batch Ingestion Engine
//!
//! Saves picked photos one at a time through the [`RetryExecutor`].
//!
//! Items are processed strictly in input order, never in parallel. The
//! cancellation token is checked at item boundaries only, so a save that
//! already started always runs to completion. Progress is reported once per
//! item, not once per attempt.
//!
//! After the loop (complete or cancelled) the saved-books and books caches
//! are invalidated through the event bus.

use crate::progress::{ProgressSink, ProgressUpdate};
use crate::retry::RetryExecutor;
use crate::types::{
    display_name, BusyFlag, FailedItem, IngestionOutcome, IngestionReport, ItemStatus,
};
use crate::{Result, SyncError};
use bridge_traits::{IngestionCandidate, PhotoServiceApi};
use core_runtime::events::{CacheScope, CoreEvent, EventBus, IngestionEvent, LibraryEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

const DEFAULT_SAVE_ERROR: &str = "Failed to save photo";

pub struct IngestionEngine {
    api: Arc<dyn PhotoServiceApi>,
    executor: RetryExecutor,
    event_bus: EventBus,
    busy: BusyFlag,
}

impl IngestionEngine {
    pub fn new(api: Arc<dyn PhotoServiceApi>, executor: RetryExecutor, event_bus: EventBus) -> Self {
        Self {
            api,
            executor,
            event_bus,
            busy: BusyFlag::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_set()
    }

    /// Save every candidate, recording one outcome per processed item.
    ///
    /// An empty list is a no-op: no calls, no events, an empty report.
    #[instrument(skip(self, candidates, cancel, sink), fields(total = candidates.len()))]
    pub async fn ingest(
        &self,
        candidates: &[IngestionCandidate],
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<IngestionReport> {
        if candidates.is_empty() {
            return Ok(IngestionReport::default());
        }

        let _guard = self.busy.acquire("ingestion")?;
        let total = candidates.len();
        let mut report = IngestionReport {
            total,
            ..Default::default()
        };

        info!("Saving {} picked photo(s)", total);
        self.event_bus
            .emit(CoreEvent::Ingestion(IngestionEvent::Started { total }))
            .ok();

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Ingestion cancelled after {} item(s)", index);
                report.cancelled = true;
                break;
            }

            let name = display_name(&candidate.name, index);
            let status = self.save_one(candidate, &name, sink).await;

            match &status {
                ItemStatus::Saved => report.saved += 1,
                ItemStatus::Skipped => debug!("Skipped {}", name),
                ItemStatus::Failed(reason) => {
                    error!("Failed to save {}: {}", name, reason);
                    report.failed.push(FailedItem {
                        name: name.clone(),
                        error: reason.clone(),
                    });
                }
            }

            report.outcomes.push(IngestionOutcome {
                name: name.clone(),
                status,
            });

            sink.on_progress(ProgressUpdate::Item {
                current: index + 1,
                total,
                name,
            });
        }

        self.invalidate_caches();

        info!(
            saved = report.saved,
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Ingestion finished"
        );
        self.event_bus
            .emit(CoreEvent::Ingestion(IngestionEvent::Completed {
                saved: report.saved,
                failed: report.failed.len(),
                cancelled: report.cancelled,
            }))
            .ok();

        Ok(report)
    }

    async fn save_one(
        &self,
        candidate: &IngestionCandidate,
        name: &str,
        sink: &dyn ProgressSink,
    ) -> ItemStatus {
        let api = &self.api;

        let result = self
            .executor
            .run(
                move || async move {
                    api.save_picker_item(candidate)
                        .await
                        .map_err(SyncError::from)
                },
                |attempt| {
                    sink.on_progress(ProgressUpdate::Retry {
                        name: name.to_string(),
                        attempt,
                    })
                },
            )
            .await;

        match result {
            Ok(saved) if saved.skipped => ItemStatus::Skipped,
            Ok(saved) if saved.success => ItemStatus::Saved,
            Ok(saved) => {
                ItemStatus::Failed(saved.error.unwrap_or_else(|| DEFAULT_SAVE_ERROR.to_string()))
            }
            Err(e) => ItemStatus::Failed(e.to_string()),
        }
    }

    fn invalidate_caches(&self) {
        for scope in [CacheScope::SavedBooks, CacheScope::Books] {
            self.event_bus
                .emit(CoreEvent::Library(LibraryEvent::CacheInvalidated { scope }))
                .ok();
        }
    }
}
