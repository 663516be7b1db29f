//! File System Abstraction
//!
//! Chunked uploads only need two things from the host: the size of a local
//! file and positioned reads into it. Keeping the surface that small lets
//! sandboxed platforms (document pickers, OPFS) satisfy it without exposing
//! real paths.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn first_chunk(fs: &dyn FileSystemAccess, path: &Path) -> Result<Bytes> {
///     let meta = fs.metadata(path).await?;
///     fs.read_range(path, 0, meta.size.min(10 * 1024 * 1024) as usize).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Read up to `len` bytes starting at `offset`
    ///
    /// Returns fewer bytes only when the end of the file is reached.
    async fn read_range(&self, path: &Path, offset: u64, len: usize) -> Result<Bytes>;
}
