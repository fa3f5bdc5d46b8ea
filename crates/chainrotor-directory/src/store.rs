//! Local persistence of the parsed catalog.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::catalog::ChainInfo;
use crate::error::DirectoryError;

/// Storage for the last successfully fetched catalog.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    /// `Ok(None)` when no snapshot has been written yet.
    async fn load(&self) -> Result<Option<Vec<ChainInfo>>, DirectoryError>;

    /// Replace the snapshot wholesale.
    async fn save(&self, catalog: &[ChainInfo]) -> Result<(), DirectoryError>;
}

/// Pretty-printed JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> DirectoryError {
        DirectoryError::Io { path: self.path.clone(), source }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<ChainInfo>>, DirectoryError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, catalog: &[ChainInfo]) -> Result<(), DirectoryError> {
        let bytes = serde_json::to_vec_pretty(catalog)?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| self.io_err(e))
    }
}
