//! # Pipeline State & Result Types
//!
//! ## Picker State Machine
//!
//! ```text
//! Idle → CreatingSession → WaitingForSelection → FetchingPhotos → Saving → Complete
//!  ↑           │                   │                   │            └────→ CompleteWithErrors
//!  └───────────┴───────────────────┴───────────────────┘  (failure, timeout, reset)
//! ```
//!
//! Every step may return to `Idle`; forward moves must follow the arrows.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

// ============================================================================
// Picker Steps
// ============================================================================

/// Step of the picker session flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PickerStep {
    Idle,
    CreatingSession,
    WaitingForSelection,
    FetchingPhotos,
    Saving,
    Complete,
    /// Some items failed; the host must acknowledge before closing
    CompleteWithErrors,
}

impl PickerStep {
    /// Work is in flight and the triggering control must stay disabled
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            PickerStep::CreatingSession
                | PickerStep::WaitingForSelection
                | PickerStep::FetchingPhotos
                | PickerStep::Saving
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PickerStep::Complete | PickerStep::CompleteWithErrors)
    }

    /// Whether the flow may move from `self` to `next`
    pub fn can_transition_to(&self, next: PickerStep) -> bool {
        use PickerStep::*;
        matches!(
            (*self, next),
            (_, Idle)
                | (Idle, CreatingSession)
                | (CreatingSession, WaitingForSelection)
                | (WaitingForSelection, FetchingPhotos)
                | (FetchingPhotos, Saving)
                | (Saving, Complete)
                | (Saving, CompleteWithErrors)
        )
    }

    /// Validated transition
    pub fn transition(self, next: PickerStep) -> Result<PickerStep> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SyncError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PickerStep::Idle => "idle",
            PickerStep::CreatingSession => "creating-session",
            PickerStep::WaitingForSelection => "waiting-for-selection",
            PickerStep::FetchingPhotos => "fetching-photos",
            PickerStep::Saving => "saving",
            PickerStep::Complete => "complete",
            PickerStep::CompleteWithErrors => "complete-with-errors",
        }
    }

    /// Text shown next to the spinner
    pub fn message(&self) -> &'static str {
        match self {
            PickerStep::Idle => "",
            PickerStep::CreatingSession => "Creating picker session...",
            PickerStep::WaitingForSelection => "Waiting for photo selection in popup window...",
            PickerStep::FetchingPhotos => "Fetching selected photos...",
            PickerStep::Saving => "Saving photos to database...",
            PickerStep::Complete => "Photos saved successfully!",
            PickerStep::CompleteWithErrors => "Some photos could not be saved.",
        }
    }
}

impl FromStr for PickerStep {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(PickerStep::Idle),
            "creating-session" => Ok(PickerStep::CreatingSession),
            "waiting-for-selection" => Ok(PickerStep::WaitingForSelection),
            "fetching-photos" => Ok(PickerStep::FetchingPhotos),
            "saving" => Ok(PickerStep::Saving),
            "complete" => Ok(PickerStep::Complete),
            "complete-with-errors" => Ok(PickerStep::CompleteWithErrors),
            _ => Err(SyncError::InvalidOperation {
                operation: "parse picker step".to_string(),
                reason: format!("unknown step '{}'", s),
            }),
        }
    }
}

impl fmt::Display for PickerStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Ingestion Results
// ============================================================================

/// Result of saving one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ItemStatus {
    Saved,
    Skipped,
    Failed(String),
}

/// Outcome of one candidate, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub name: String,
    pub status: ItemStatus,
}

/// Candidate that could not be saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub name: String,
    pub error: String,
}

/// Accumulated result of one ingestion batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub total: usize,
    pub saved: usize,
    pub failed: Vec<FailedItem>,
    pub outcomes: Vec<IngestionOutcome>,
    /// The batch stopped early at an item boundary
    pub cancelled: bool,
}

impl IngestionReport {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == ItemStatus::Skipped)
            .count()
    }

    /// Failures win over cancellation; a cancelled batch without failures
    /// counts as an ordinary (partial) success.
    pub fn final_step(&self) -> PickerStep {
        if self.failed.is_empty() {
            PickerStep::Complete
        } else {
            PickerStep::CompleteWithErrors
        }
    }

    pub fn requires_acknowledgement(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Display name of the candidate at `index`
pub fn display_name(name: &str, index: usize) -> String {
    if name.trim().is_empty() {
        format!("Photo {}", index + 1)
    } else {
        name.to_string()
    }
}

// ============================================================================
// Upload Progress
// ============================================================================

/// Observable progress of a chunked upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub upload_id: String,
    pub chunk_index: u32,
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub complete: bool,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.bytes_sent.min(self.total_bytes) * 100) / self.total_bytes) as u8
    }

    /// Running image counters as shown in failure messages
    pub fn counters(&self) -> String {
        format!(
            "processed {}, succeeded {}, failed {}, skipped {}",
            self.processed, self.succeeded, self.failed, self.skipped
        )
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Operations of the reconciliation view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOperation {
    Export,
    Import,
    Verify,
    Unlink,
    Delete,
    Restore,
    ExportAll,
    ImportAll,
}

impl ReconciliationOperation {
    pub const ALL: [ReconciliationOperation; 8] = [
        ReconciliationOperation::Export,
        ReconciliationOperation::Import,
        ReconciliationOperation::Verify,
        ReconciliationOperation::Unlink,
        ReconciliationOperation::Delete,
        ReconciliationOperation::Restore,
        ReconciliationOperation::ExportAll,
        ReconciliationOperation::ImportAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationOperation::Export => "export",
            ReconciliationOperation::Import => "import",
            ReconciliationOperation::Verify => "verify",
            ReconciliationOperation::Unlink => "unlink",
            ReconciliationOperation::Delete => "delete",
            ReconciliationOperation::Restore => "restore",
            ReconciliationOperation::ExportAll => "export_all",
            ReconciliationOperation::ImportAll => "import_all",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ReconciliationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a bulk operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkOperation {
    Export,
    Import,
}

impl BulkOperation {
    pub fn verb(&self) -> &'static str {
        match self {
            BulkOperation::Export => "export",
            BulkOperation::Import => "import",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            BulkOperation::Export => "exported",
            BulkOperation::Import => "imported",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            BulkOperation::Export => "Export",
            BulkOperation::Import => "Import",
        }
    }
}

/// Photo that failed during a bulk operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub photo_id: i64,
    pub title: Option<String>,
    pub error: String,
}

/// Result of "export all pending" / "import all pending"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationReport {
    pub operation: BulkOperation,
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkOperationReport {
    pub fn new(operation: BulkOperation, total: usize) -> Self {
        Self {
            operation,
            total,
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Unique titles of failed photos, in failure order
    pub fn failed_titles(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.failures
            .iter()
            .filter_map(|failure| failure.title.as_deref())
            .filter(|title| !title.is_empty() && seen.insert(*title))
            .collect()
    }

    pub fn summary(&self) -> String {
        if self.total == 0 {
            return format!("No pending photos to {}.", self.operation.verb());
        }

        if self.failures.is_empty() {
            return format!(
                "Successfully {} all {} photo(s)!",
                self.operation.past_tense(),
                self.succeeded
            );
        }

        let titles = self.failed_titles();
        let books = if titles.is_empty() {
            String::new()
        } else {
            let shown: Vec<&str> = titles.iter().take(3).copied().collect();
            format!(
                " Failed books: {}{}",
                shown.join(", "),
                if titles.len() > 3 { "..." } else { "" }
            )
        };

        format!(
            "{} completed: {} succeeded, {} failed.{}",
            self.operation.noun(),
            self.succeeded,
            self.failures.len(),
            books
        )
    }
}

// ============================================================================
// Busy Flags
// ============================================================================

/// Guards an operation against being triggered twice while in flight
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Mark busy until the returned guard drops
    pub fn acquire(&self, operation: &str) -> Result<BusyGuard<'_>> {
        if self
            .0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::Busy {
                operation: operation.to_string(),
            });
        }
        Ok(BusyGuard(&self.0))
    }
}

#[must_use]
pub struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
