//! Local filesystem storage backend.
//!
//! Files are stored in a configured directory and accessed via `tokio::fs`.
//! Writes are staged in a temporary file next to their destination and
//! renamed into place on commit.

use crate::backend::StagedWrite;
use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, path::validate as validate_path};
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STAGING_PREFIX: &str = ".tgimg-staged-";

/// Local filesystem storage backend.
///
/// Stores files in a directory on the local filesystem. All paths are relative
/// to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use tgimg_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("images", "/var/lib/tgimg/images")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the image store
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating the root directory if
    /// it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is not
    /// absolute or points at something other than a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the absolute path for a relative storage path.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn stage(&self, path: &Path) -> Result<Box<dyn StagedWrite>> {
        let destination = self.absolute_path(path)?;
        // The store directory may have been removed since startup; recreating
        // it is idempotent.
        let parent = destination.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent).await.map_err(|e| Self::map_io_error(e, path))?;
        // Same directory as the destination, so the final rename never
        // crosses filesystems.
        let (file, temp_path) =
            tokio::task::spawn_blocking(move || tempfile::Builder::new().prefix(STAGING_PREFIX).tempfile_in(&parent))
                .await
                .or_raise(|| ErrorKind::BackendError("staging task failed".to_string()))?
                .map_err(|e| Self::map_io_error(e, path))?
                .into_parts();
        tracing::trace!(backend = %self.name, path = %path.display(), staged = %temp_path.display(), "Write staged");
        Ok(Box::new(LocalStagedWrite {
            path: path.to_path_buf(),
            destination,
            staged: Some((fs::File::from_std(file), temp_path)),
            written: 0,
        }))
    }
}

/// A temporary file that becomes `destination` on commit. Dropping it before
/// then deletes the temporary file.
struct LocalStagedWrite {
    path: PathBuf,
    destination: PathBuf,
    staged: Option<(fs::File, TempPath)>,
    written: u64,
}
impl LocalStagedWrite {
    fn already_committed(path: &Path) -> ErrorKind {
        ErrorKind::BackendError(format!("staged write to `{}` already committed", path.display()))
    }
}

impl Drop for LocalStagedWrite {
    fn drop(&mut self) {
        let Some((file, temp_path)) = self.staged.take() else {
            return;
        };
        // Removing the temporary file blocks; keep that off the runtime's
        // worker threads when there is one.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    drop(file);
                    drop(temp_path);
                });
            },
            Err(_) => {
                drop(file);
                drop(temp_path);
            },
        }
    }
}

#[async_trait]
impl StagedWrite for LocalStagedWrite {
    async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        let Some((file, _)) = self.staged.as_mut() else {
            exn::bail!(Self::already_committed(&self.path));
        };
        file.write_all(chunk).await.map_err(ErrorKind::Io)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn commit(&mut self) -> Result<u64> {
        let Some((mut file, temp_path)) = self.staged.take() else {
            exn::bail!(Self::already_committed(&self.path));
        };
        file.flush().await.map_err(ErrorKind::Io)?;
        file.sync_all().await.map_err(ErrorKind::Io)?;
        drop(file);
        // Overwrites an existing destination: last writer wins.
        let publish = || ErrorKind::BackendError(format!("could not publish `{}`", self.path.display()));
        let destination = self.destination.clone();
        tokio::task::spawn_blocking(move || temp_path.persist(destination))
            .await
            .or_raise(publish)?
            .or_raise(publish)?;
        tracing::debug!(path = %self.path.display(), bytes = self.written, "Write committed");
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("images", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    fn directory_entries(path: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(path)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("images", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("images", "relative/path").is_err());
        assert!(LocalBackend::new("images", "./images").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/images");
        let backend = LocalBackend::new("images", &root).unwrap();
        assert!(root.is_dir());
        assert_eq!(backend.root(), root);
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("not-a-directory");
        std::fs::write(&file, b"data").unwrap();
        let err = LocalBackend::new("images", &file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (_dir, backend) = backend();
        let written = backend.write(Path::new("123"), b"jpeg bytes").await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(backend.read(Path::new("123")).await.unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (_dir, backend) = backend();
        backend.write(Path::new("123"), b"first").await.unwrap();
        backend.write(Path::new("123"), b"second").await.unwrap();
        assert_eq!(backend.read(Path::new("123")).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_exists() {
        let (_dir, backend) = backend();
        assert!(!backend.exists(Path::new("123")).await.unwrap());
        backend.write(Path::new("123"), b"data").await.unwrap();
        assert!(backend.exists(Path::new("123")).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_file_counts_as_existing() {
        // Presence is all that matters, contents are never inspected.
        let (dir, backend) = backend();
        std::fs::write(dir.path().join("123"), b"").unwrap();
        assert!(backend.exists(Path::new("123")).await.unwrap());
    }

    #[tokio::test]
    async fn test_staged_write_is_invisible_until_commit() {
        let (dir, backend) = backend();
        let mut staged = backend.stage(Path::new("123")).await.unwrap();
        staged.append(b"half an ").await.unwrap();
        assert!(!backend.exists(Path::new("123")).await.unwrap());
        staged.append(b"image").await.unwrap();
        assert_eq!(staged.commit().await.unwrap(), 13);
        assert!(backend.exists(Path::new("123")).await.unwrap());
        assert_eq!(directory_entries(dir.path()), vec!["123".to_string()]);
    }

    /// Waits for background cleanup to empty `path`.
    async fn wait_until_empty(path: &Path) -> bool {
        for _ in 0..200 {
            if directory_entries(path).is_empty() {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_dropped_stage_leaves_nothing() {
        let (dir, backend) = backend();
        let mut staged = backend.stage(Path::new("123")).await.unwrap();
        staged.append(b"partial").await.unwrap();
        assert_eq!(directory_entries(dir.path()).len(), 1);
        drop(staged);
        assert!(!backend.exists(Path::new("123")).await.unwrap());
        assert!(wait_until_empty(dir.path()).await);
    }

    #[test]
    fn test_dropped_stage_outside_runtime() {
        let (dir, backend) = backend();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let staged = runtime.block_on(backend.stage(Path::new("123"))).unwrap();
        drop(runtime);
        assert_eq!(directory_entries(dir.path()).len(), 1);
        drop(staged);
        assert!(directory_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_commit_twice_fails() {
        let (_dir, backend) = backend();
        let mut staged = backend.stage(Path::new("123")).await.unwrap();
        staged.commit().await.unwrap();
        let err = staged.commit().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        let err = staged.append(b"late").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
    }

    #[tokio::test]
    async fn test_stage_recreates_removed_root() {
        let (dir, backend) = backend();
        std::fs::remove_dir(dir.path()).unwrap();
        backend.write(Path::new("123"), b"data").await.unwrap();
        assert!(dir.path().join("123").is_file());
    }

    #[tokio::test]
    async fn test_read_missing() {
        let (_dir, backend) = backend();
        let err = backend.read(Path::new("404")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if p == Path::new("404")));
    }

    #[tokio::test]
    async fn test_path_security() {
        let (_dir, backend) = backend();
        assert!(backend.exists(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.write(Path::new("../../123"), b"data").await.is_err());
        assert!(backend.stage(Path::new("")).await.is_err());
    }
}
