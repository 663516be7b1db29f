//! # Library API Provider
//!
//! Implements `PhotoServiceApi` against the library backend's HTTP surface.
//!
//! ## Overview
//!
//! This module provides:
//! - Picker session creation, polling and media item retrieval
//! - Saving a single picked photo
//! - Raw-body chunk uploads and cleanup of abandoned uploads
//! - Export statistics, per-photo sync records and the export/import/verify/unlink actions
//! - Soft delete and restore of photos
//!
//! All requests rely on the session cookie held by the injected `HttpClient`.
//! Every method performs a single request; retries are the caller's decision.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::LibraryApiConnector;
pub use error::{LibraryApiError, Result};
