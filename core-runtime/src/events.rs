//! # Event Bus System
//!
//! Provides an event-driven architecture for the photo sync core using
//! `tokio::sync::broadcast`. Sync components publish typed events; hosts and
//! caches subscribe without the components knowing about them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐
//! │ Picker       ├────────────>│           │
//! └──────────────┘             │           │    subscribe   ┌────────────┐
//! ┌──────────────┐    emit     │ EventBus  ├───────────────>│ UI / host  │
//! │ Ingestion    ├────────────>│ (broadcast│                └────────────┘
//! └──────────────┘             │  channel) │    subscribe   ┌────────────┐
//! ┌──────────────┐    emit     │           ├───────────────>│ List cache │
//! │ Upload/Recon ├────────────>│           │                └────────────┘
//! └──────────────┘             └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheScope, CoreEvent, EventBus, LibraryEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Library(LibraryEvent::CacheInvalidated {
//!         scope: CacheScope::Books,
//!     }))
//!     .ok();
//! # let _ = receiver.try_recv();
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error that publishers ignore with
//! `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Picker session lifecycle
    Picker(PickerEvent),
    /// Per-item saving of picked photos
    Ingestion(IngestionEvent),
    /// Chunked archive upload
    Upload(UploadEvent),
    /// Export/import/verify/unlink/delete/restore
    Reconciliation(ReconciliationEvent),
    /// Side effects on entities outside the photo subsystem
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Short human-readable description
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Picker(e) => e.description(),
            CoreEvent::Ingestion(e) => e.description(),
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Reconciliation(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Picker(PickerEvent::Failed { .. })
            | CoreEvent::Upload(UploadEvent::Failed { .. })
            | CoreEvent::Reconciliation(ReconciliationEvent::OperationFailed { .. }) => {
                EventSeverity::Error
            }
            CoreEvent::Picker(PickerEvent::TimedOut { .. })
            | CoreEvent::Ingestion(IngestionEvent::Retrying { .. }) => EventSeverity::Warning,
            CoreEvent::Ingestion(IngestionEvent::Completed { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Ingestion(IngestionEvent::Completed { .. })
            | CoreEvent::Upload(UploadEvent::Completed { .. })
            | CoreEvent::Reconciliation(ReconciliationEvent::OperationCompleted { .. }) => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Picker Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PickerEvent {
    StepChanged {
        step: String,
        message: String,
    },
    SessionCreated {
        session_id: String,
    },
    SelectionReceived {
        session_id: String,
        item_count: usize,
    },
    TimedOut {
        session_id: String,
        polls: u32,
    },
    PhotosSaved {
        count: usize,
    },
    Failed {
        message: String,
    },
}

impl PickerEvent {
    fn description(&self) -> &str {
        match self {
            PickerEvent::StepChanged { .. } => "Picker step changed",
            PickerEvent::SessionCreated { .. } => "Picker session created",
            PickerEvent::SelectionReceived { .. } => "Picker selection received",
            PickerEvent::TimedOut { .. } => "Picker selection timed out",
            PickerEvent::PhotosSaved { .. } => "Picked photos saved",
            PickerEvent::Failed { .. } => "Picker failed",
        }
    }
}

// ============================================================================
// Ingestion Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum IngestionEvent {
    Started {
        total: usize,
    },
    Progress {
        current: usize,
        total: usize,
        name: String,
    },
    Retrying {
        name: String,
        attempt: u32,
    },
    Completed {
        saved: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl IngestionEvent {
    fn description(&self) -> &str {
        match self {
            IngestionEvent::Started { .. } => "Ingestion started",
            IngestionEvent::Progress { .. } => "Ingestion in progress",
            IngestionEvent::Retrying { .. } => "Retrying photo save",
            IngestionEvent::Completed { .. } => "Ingestion finished",
        }
    }
}

// ============================================================================
// Upload Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    Started {
        upload_id: String,
        total_bytes: u64,
        total_chunks: u64,
    },
    ChunkAcknowledged {
        upload_id: String,
        chunk_index: u32,
        percent: u8,
        processed: u64,
        succeeded: u64,
        failed: u64,
        skipped: u64,
    },
    Completed {
        upload_id: String,
        total_files: u64,
        success_count: u64,
        failure_count: u64,
        skipped_count: u64,
    },
    Failed {
        upload_id: String,
        message: String,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::Started { .. } => "Archive upload started",
            UploadEvent::ChunkAcknowledged { .. } => "Archive chunk acknowledged",
            UploadEvent::Completed { .. } => "Archive upload completed",
            UploadEvent::Failed { .. } => "Archive upload failed",
        }
    }
}

// ============================================================================
// Reconciliation Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ReconciliationEvent {
    OperationCompleted {
        operation: String,
        photo_id: i64,
        message: String,
    },
    OperationFailed {
        operation: String,
        photo_id: i64,
        message: String,
    },
    BulkProgress {
        operation: String,
        current: usize,
        total: usize,
    },
    Refreshed {
        records: usize,
    },
}

impl ReconciliationEvent {
    fn description(&self) -> &str {
        match self {
            ReconciliationEvent::OperationCompleted { .. } => "Photo operation completed",
            ReconciliationEvent::OperationFailed { .. } => "Photo operation failed",
            ReconciliationEvent::BulkProgress { .. } => "Bulk photo operation in progress",
            ReconciliationEvent::Refreshed { .. } => "Photo sync view refreshed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Cached collection that observers should refetch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Books/photos saved through the picker
    SavedBooks,
    /// The generic books list view
    Books,
    /// Export statistics and per-photo sync records
    PhotoExport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    CacheInvalidated { scope: CacheScope },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::CacheInvalidated { .. } => "Cache invalidated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publish an event to all current subscribers
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that skips events not matching an optional predicate
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
