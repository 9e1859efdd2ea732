//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::backend::StagedWrite;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

type Files = Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Staged writes
/// buffer their bytes and only insert them on commit, mirroring the
/// visibility rules of [`LocalBackend`](super::LocalBackend).
///
/// # Examples
///
/// ```
/// use tgimg_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("123", b"jpeg")]);
/// assert!(backend.exists(Path::new("123")).await?);
///
/// backend.write(Path::new("456.svg"), b"<svg></svg>").await?;
/// assert!(backend.exists(Path::new("456.svg")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    files: Files,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            files: Arc::new(RwLock::new(map)),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sorted list of every stored path, for asserting on the whole store.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.files.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let validated = validate_path(path)?;
        match self.files.read().await.get(&validated) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        }
    }

    async fn stage(&self, path: &Path) -> Result<Box<dyn StagedWrite>> {
        Ok(Box::new(MockStagedWrite {
            path: validate_path(path)?,
            buffer: Some(Vec::new()),
            files: Arc::clone(&self.files),
        }))
    }
}

struct MockStagedWrite {
    path: PathBuf,
    buffer: Option<Vec<u8>>,
    files: Files,
}

#[async_trait]
impl StagedWrite for MockStagedWrite {
    async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.extend_from_slice(chunk),
            None => exn::bail!(ErrorKind::BackendError("staged write already committed".to_string())),
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<u64> {
        let Some(buffer) = self.buffer.take() else {
            exn::bail!(ErrorKind::BackendError("staged write already committed".to_string()));
        };
        let written = buffer.len() as u64;
        self.files.write().await.insert(self.path.clone(), buffer);
        Ok(written)
    }
}
