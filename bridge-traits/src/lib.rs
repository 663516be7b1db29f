//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the photo sync core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per platform
//! (desktop, web, mobile).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with cookie sessions and TLS
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Sizes and ranged reads for chunked uploads
//!
//! ### Remote Services
//! - [`PhotoServiceApi`](photos::PhotoServiceApi) - Picker, save, chunk upload and export endpoints
//!
//! ### Platform Integration
//! - [`InteractionLauncher`](interaction::InteractionLauncher) - Opens the picker popup
//! - [`ExternalInteraction`](interaction::ExternalInteraction) - Handle to an opened popup
//!
//! ### Utilities
//! - [`Sleeper`](time::Sleeper) - Suspension source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Failures
//! that came from an HTTP response carry the status so the core can tell
//! client errors from transient ones.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod error;
pub mod http;
pub mod interaction;
pub mod photos;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use interaction::{ExternalInteraction, InteractionLauncher, PopupGeometry};
pub use photos::{
    ChunkUploadResult, ExportStatus, ImportItemStatus, IngestionCandidate, MediaItemsResponse,
    OperationMessage, PhotoExportStats, PhotoServiceApi, PhotoSyncRecord, PhotoZipImportItem,
    PhotoZipImportResult, PickerSession, PickerSessionStatus, RawMediaItem, SavePhotoResult,
    VerifyResult,
};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::Sleeper;
