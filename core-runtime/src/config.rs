//! # Core Configuration Module
//!
//! Provides configuration management for the photo sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `PhotoSyncConfig` instance that holds the bridges and tuning knobs the sync
//! components need. It enforces fail-fast validation so a misconfigured host
//! is rejected before any remote call is made.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - talks to the library API (desktop default: reqwest)
//! - `FileSystemAccess` - ranged reads for chunked uploads (desktop default: tokio fs)
//! - `InteractionLauncher` - opens the picker link (desktop default: console)
//!
//! `Sleeper` always defaults to the Tokio timer.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::PhotoSyncConfig;
//! use std::time::Duration;
//!
//! let config = PhotoSyncConfig::builder()
//!     .api_base_url("https://library.example/api")
//!     .max_retries(5)
//!     .poll_interval(Duration::from_secs(3))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::time::TokioSleeper;
use bridge_traits::{FileSystemAccess, HttpClient, InteractionLauncher, Sleeper};
use std::sync::Arc;
use std::time::Duration;

/// Default chunk size for archive uploads (10 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Retry policy of the request executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every following one
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Picker session polling and popup placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerConfig {
    pub poll_interval: Duration,
    /// Status polls before the session is abandoned
    pub max_polls: u32,
    pub popup_width: u32,
    pub popup_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Appended to the picker URI so the window closes itself after selection
    pub auto_close_suffix: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_polls: 300,
            popup_width: 800,
            popup_height: 600,
            screen_width: 1920,
            screen_height: 1080,
            auto_close_suffix: "/autoclose".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadConfig {
    pub chunk_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Core configuration for the photo sync pipeline.
///
/// Use [`PhotoSyncConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct PhotoSyncConfig {
    /// Base URL the library API routes are joined onto
    pub api_base_url: String,

    pub retry: RetryConfig,

    pub picker: PickerConfig,

    pub upload: UploadConfig,

    /// Delay before a fully successful ingestion closes itself
    pub completion_close_delay: Duration,

    /// Per-request timeout handed to the HTTP client
    pub request_timeout: Duration,

    pub http_client: Arc<dyn HttpClient>,

    pub file_system: Arc<dyn FileSystemAccess>,

    pub interaction_launcher: Arc<dyn InteractionLauncher>,

    pub sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for PhotoSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoSyncConfig")
            .field("api_base_url", &self.api_base_url)
            .field("retry", &self.retry)
            .field("picker", &self.picker)
            .field("upload", &self.upload)
            .field("completion_close_delay", &self.completion_close_delay)
            .field("request_timeout", &self.request_timeout)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("interaction_launcher", &"InteractionLauncher { ... }")
            .field("sleeper", &"Sleeper { ... }")
            .finish()
    }
}

impl PhotoSyncConfig {
    /// Creates a new builder for constructing a `PhotoSyncConfig`.
    pub fn builder() -> PhotoSyncConfigBuilder {
        PhotoSyncConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The base URL is an absolute http(s) URL
    /// - Retry delays are non-zero and ordered
    /// - Chunk size, poll interval and poll cap are non-zero
    pub fn validate(&self) -> Result<()> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                base
            )));
        }

        if self.retry.base_delay.is_zero() {
            return Err(Error::Config(
                "Retry base delay must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(Error::Config(
                "Retry max delay cannot be smaller than the base delay".to_string(),
            ));
        }

        if self.upload.chunk_size == 0 {
            return Err(Error::Config(
                "Chunk size must be greater than 0 bytes".to_string(),
            ));
        }

        if self.picker.poll_interval.is_zero() {
            return Err(Error::Config(
                "Picker poll interval must be greater than zero".to_string(),
            ));
        }
        if self.picker.max_polls == 0 {
            return Err(Error::Config(
                "Picker poll cap must be at least 1".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required {}. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Other hosts: inject a platform-native adapter.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "to reach the library API"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing("FileSystemAccess", "for chunked uploads"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_interaction_launcher() -> Result<Arc<dyn InteractionLauncher>> {
    Ok(Arc::new(bridge_desktop::ConsoleInteractionLauncher::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_interaction_launcher() -> Result<Arc<dyn InteractionLauncher>> {
    Err(capability_missing(
        "InteractionLauncher",
        "to open the photo picker",
    ))
}

/// Builder for constructing [`PhotoSyncConfig`] instances.
#[derive(Default)]
pub struct PhotoSyncConfigBuilder {
    api_base_url: Option<String>,
    retry: RetryConfig,
    picker: PickerConfig,
    upload: UploadConfig,
    completion_close_delay: Option<Duration>,
    request_timeout: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    interaction_launcher: Option<Arc<dyn InteractionLauncher>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl PhotoSyncConfigBuilder {
    /// Sets the library API base URL (required).
    ///
    /// A trailing slash is dropped so routes can be appended verbatim.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Replaces the whole retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the number of retries after the first attempt.
    ///
    /// Default: 10
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Replaces the whole picker configuration.
    pub fn picker(mut self, picker: PickerConfig) -> Self {
        self.picker = picker;
        self
    }

    /// Default: 2 seconds
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.picker.poll_interval = interval;
        self
    }

    /// Default: 300 polls
    pub fn max_polls(mut self, max_polls: u32) -> Self {
        self.picker.max_polls = max_polls;
        self
    }

    /// Sets the upload chunk size in bytes.
    ///
    /// Default: 10 MiB
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.upload.chunk_size = bytes;
        self
    }

    /// Default: 2 seconds
    pub fn completion_close_delay(mut self, delay: Duration) -> Self {
        self.completion_close_delay = Some(delay);
        self
    }

    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the desktop default (tokio fs-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the launcher used to open the picker.
    pub fn interaction_launcher(mut self, launcher: Arc<dyn InteractionLauncher>) -> Self {
        self.interaction_launcher = Some(launcher);
        self
    }

    /// Overrides the suspension source (tests use a recording sleeper).
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Builds the final `PhotoSyncConfig` instance.
    ///
    /// Returns an error if:
    /// - The base URL is missing or malformed
    /// - A required bridge is missing and no desktop default is available
    /// - Any tuning value is out of range
    pub fn build(self) -> Result<PhotoSyncConfig> {
        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let request_timeout = self.request_timeout.unwrap_or(Duration::from_secs(30));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let interaction_launcher = match self.interaction_launcher {
            Some(launcher) => launcher,
            None => provide_default_interaction_launcher()?,
        };

        let sleeper = self
            .sleeper
            .unwrap_or_else(|| Arc::new(TokioSleeper) as Arc<dyn Sleeper>);

        let config = PhotoSyncConfig {
            api_base_url,
            retry: self.retry,
            picker: self.picker,
            upload: self.upload,
            completion_close_delay: self
                .completion_close_delay
                .unwrap_or(Duration::from_secs(2)),
            request_timeout,
            http_client,
            file_system,
            interaction_launcher,
            sleeper,
        };

        config.validate()?;

        Ok(config)
    }
}
