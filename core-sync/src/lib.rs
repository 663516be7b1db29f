//! # Photo Sync Pipeline
//!
//! Imports photos chosen in the external picker, uploads large photo
//! archives in chunks, and reconciles each photo's state against the
//! remote photo store.
//!
//! ## Components
//!
//! - **Retry Executor** (`retry`): bounded retries with exponential backoff and error classification
//! - **Picker Controller** (`picker`): session → popup → polling → fetch → save state machine
//! - **Ingestion Engine** (`ingestion`): sequential, cancellable saving of picked photos
//! - **Chunked Uploader** (`chunked_upload`): ordered 10 MiB chunks under one upload id
//! - **Reconciliation** (`reconciliation`): export/import/verify/unlink/delete/restore and bulk runs
//! - **Progress** (`progress`): sink trait keeping the algorithms free of UI concerns

pub mod chunked_upload;
pub mod error;
pub mod ingestion;
pub mod picker;
pub mod progress;
pub mod reconciliation;
pub mod retry;
pub mod types;

#[cfg(test)]
mod test_support;

pub use chunked_upload::{chunk_count, ChunkedUploader};
pub use error::{Result, SyncError};
pub use ingestion::IngestionEngine;
pub use picker::PickerController;
pub use progress::{EventBusProgressSink, NoopProgressSink, ProgressSink, ProgressUpdate};
pub use reconciliation::{
    AutoConfirm, Confirmation, PhotoSyncRow, ReconciliationService, ReconciliationView, RowAction,
};
pub use retry::{RetryExecutor, RetryOutcome};
pub use types::{
    display_name, BulkFailure, BulkOperation, BulkOperationReport, BusyFlag, FailedItem,
    IngestionOutcome, IngestionReport, ItemStatus, PickerStep, ReconciliationOperation,
    UploadProgress,
};
