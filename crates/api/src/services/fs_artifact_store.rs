//! Filesystem artifact store.
//!
//! Artifacts live under `<root>/<organization_id>/<name>`; the handle is the
//! relative path. Retention is enforced by the cleanup job through the job
//! records' expiry timestamps, not by the store itself.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use domain::services::artifact_store::{
    ArtifactContent, ArtifactError, ArtifactStore, StoredArtifact,
};

/// Artifact store backed by a local directory.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, handle: &str) -> Result<PathBuf, ArtifactError> {
        // Handles are minted by `store`; anything pointing outside the root
        // is rejected.
        if handle.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(ArtifactError::NotFound(handle.to_string()));
        }
        Ok(self.root.join(handle))
    }

    fn content_type_for(path: &Path) -> &'static str {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => "text/csv",
            Some("json") => "application/json",
            Some("xls") => "application/vnd.ms-excel",
            _ => "application/octet-stream",
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(
        &self,
        organization_id: Uuid,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredArtifact, ArtifactError> {
        let handle = format!("{}/{}", organization_id, name);
        let path = self.resolve(&handle)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArtifactError::Backend(e.to_string()))?;
        }

        let size_bytes = bytes.len() as i64;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ArtifactError::Backend(e.to_string()))?;

        Ok(StoredArtifact { handle, size_bytes })
    }

    async fn retrieve(&self, handle: &str) -> Result<ArtifactContent, ArtifactError> {
        let path = self.resolve(handle)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(handle.to_string()))
            }
            Err(e) => return Err(ArtifactError::Backend(e.to_string())),
        };

        Ok(ArtifactContent {
            bytes,
            content_type: Self::content_type_for(&path).to_string(),
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), ArtifactError> {
        let path = self.resolve(handle)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArtifactError::Backend(e.to_string())),
        }
    }
}
