//! Progress reporting seam
//!
//! Algorithms report what they are doing through a [`ProgressSink`] and stay
//! free of any rendering concern. [`EventBusProgressSink`] republishes the
//! updates on the core event bus.

use crate::types::{PickerStep, UploadProgress};
use core_runtime::events::{
    CoreEvent, EventBus, IngestionEvent, PickerEvent, ReconciliationEvent, UploadEvent,
};

/// One observable progress update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// The picker flow entered a new step
    Step(PickerStep),
    /// An ingestion item finished (`current` is 1-based)
    Item {
        current: usize,
        total: usize,
        name: String,
    },
    /// A save is about to be retried
    Retry { name: String, attempt: u32 },
    /// A chunk was acknowledged by the server
    Upload(UploadProgress),
    /// A bulk reconciliation item is starting (`current` is 1-based)
    Bulk {
        current: usize,
        total: usize,
        verb: &'static str,
    },
    /// Picked photos were saved; fired before any auto-close delay
    Saved { count: usize },
}

/// Receives progress updates
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);
}

/// Discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_progress(&self, _update: ProgressUpdate) {}
}

/// Forwards updates to the event bus as typed core events
#[derive(Debug, Clone)]
pub struct EventBusProgressSink {
    event_bus: EventBus,
}

impl EventBusProgressSink {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }

    fn to_event(update: ProgressUpdate) -> CoreEvent {
        match update {
            ProgressUpdate::Step(step) => CoreEvent::Picker(PickerEvent::StepChanged {
                step: step.as_str().to_string(),
                message: step.message().to_string(),
            }),
            ProgressUpdate::Item {
                current,
                total,
                name,
            } => CoreEvent::Ingestion(IngestionEvent::Progress {
                current,
                total,
                name,
            }),
            ProgressUpdate::Retry { name, attempt } => {
                CoreEvent::Ingestion(IngestionEvent::Retrying { name, attempt })
            }
            ProgressUpdate::Upload(progress) => {
                let percent = progress.percent();
                CoreEvent::Upload(UploadEvent::ChunkAcknowledged {
                    upload_id: progress.upload_id,
                    chunk_index: progress.chunk_index,
                    percent,
                    processed: progress.processed,
                    succeeded: progress.succeeded,
                    failed: progress.failed,
                    skipped: progress.skipped,
                })
            }
            ProgressUpdate::Bulk {
                current,
                total,
                verb,
            } => CoreEvent::Reconciliation(ReconciliationEvent::BulkProgress {
                operation: verb.to_string(),
                current,
                total,
            }),
            ProgressUpdate::Saved { count } => {
                CoreEvent::Picker(PickerEvent::PhotosSaved { count })
            }
        }
    }
}

impl ProgressSink for EventBusProgressSink {
    fn on_progress(&self, update: ProgressUpdate) {
        self.event_bus.emit(Self::to_event(update)).ok();
    }
}
