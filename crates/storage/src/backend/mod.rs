//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the seam between the image
//! resolver and wherever materialized images end up. The resolver only ever
//! needs four things: an existence check, reads, and atomic writes (both
//! streamed and all-at-once).

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Atomicity
/// Writes go through a [`StagedWrite`]: bytes are collected out of sight and
/// only appear under their final name on [`commit()`](StagedWrite::commit).
/// A stage that is dropped without committing leaves nothing behind, so a
/// half-written image can never be mistaken for a cached one.
///
/// # Concurrency
/// No locking is performed. Two concurrent writes to the same path both
/// succeed and the last commit wins.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tgimg_storage::{backend::StorageBackend, error::Result};
///
/// async fn cached_size(backend: &dyn StorageBackend, name: &str) -> Result<Option<usize>> {
///     let path = Path::new(name);
///     if backend.exists(path).await? {
///         Ok(Some(backend.read(path).await?.len()))
///     } else {
///         Ok(None)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Check if a file exists.
    ///
    /// This is a presence test only. Contents are not validated: an empty or
    /// corrupt file counts as existing.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Begin an atomic write to `path`.
    ///
    /// Implementations should create parent directories as needed. The
    /// destination is created or overwritten on commit.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use tgimg_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut staged = backend.stage(Path::new("123")).await?;
    /// staged.append(b"first chunk").await?;
    /// staged.append(b"second chunk").await?;
    /// let written = staged.commit().await?;
    /// assert_eq!(written, 23);
    /// # Ok(())
    /// # }
    /// ```
    async fn stage(&self, path: &Path) -> Result<Box<dyn StagedWrite>>;

    /// Write file contents atomically.
    ///
    /// Creates a new file or overwrites an existing file with the provided data.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<u64> {
        let mut staged = self.stage(path).await?;
        staged.append(data).await?;
        staged.commit().await
    }
}

/// A write in progress, see [`StorageBackend::stage()`].
#[async_trait]
pub trait StagedWrite: Send {
    /// Append a chunk of bytes.
    async fn append(&mut self, chunk: &[u8]) -> Result<()>;

    /// Publish the staged bytes under the final path, returning the number
    /// of bytes written.
    ///
    /// A stage can only be committed once; appending to or committing an
    /// already committed stage is a [`BackendError`](crate::error::ErrorKind::BackendError).
    async fn commit(&mut self) -> Result<u64>;
}
