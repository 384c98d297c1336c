//! Artifact store interface.
//!
//! Stores the formatted output of completed export jobs and serves it back
//! for download. Handles are opaque strings minted by the store; the job
//! record keeps the handle, the store keeps the bytes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by an artifact store backend.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Artifact store error: {0}")]
    Backend(String),
}

/// A stored artifact reference.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub handle: String,
    pub size_bytes: i64,
}

/// Artifact content for download.
#[derive(Debug, Clone)]
pub struct ArtifactContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Binary artifact storage scoped by organization.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist an artifact and mint a handle for it.
    async fn store(
        &self,
        organization_id: Uuid,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredArtifact, ArtifactError>;

    /// Fetch an artifact's bytes by handle.
    async fn retrieve(&self, handle: &str) -> Result<ArtifactContent, ArtifactError>;

    /// Delete an artifact. Deleting an unknown handle is not an error, so
    /// cleanup can run repeatedly.
    async fn delete(&self, handle: &str) -> Result<(), ArtifactError>;
}

/// In-memory artifact store for development and testing.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<HashMap<String, ArtifactContent>>,
    /// When true, every store attempt fails.
    fail_stores: bool,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            fail_stores: true,
            ..Self::default()
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts
            .lock()
            .expect("artifact store lock poisoned")
            .len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn store(
        &self,
        organization_id: Uuid,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredArtifact, ArtifactError> {
        if self.fail_stores {
            return Err(ArtifactError::Backend("simulated store failure".to_string()));
        }

        let handle = format!("{}/{}", organization_id, name);
        let size_bytes = bytes.len() as i64;
        self.artifacts
            .lock()
            .expect("artifact store lock poisoned")
            .insert(
                handle.clone(),
                ArtifactContent {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );

        Ok(StoredArtifact { handle, size_bytes })
    }

    async fn retrieve(&self, handle: &str) -> Result<ArtifactContent, ArtifactError> {
        self.artifacts
            .lock()
            .expect("artifact store lock poisoned")
            .get(handle)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(handle.to_string()))
    }

    async fn delete(&self, handle: &str) -> Result<(), ArtifactError> {
        self.artifacts
            .lock()
            .expect("artifact store lock poisoned")
            .remove(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_retrieve_roundtrip() {
        let store = InMemoryArtifactStore::new();
        let org = Uuid::new_v4();

        let stored = store
            .store(org, "export_abc.csv", b"a,b,c\n".to_vec(), "text/csv")
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 6);
        assert!(stored.handle.contains("export_abc.csv"));

        let content = store.retrieve(&stored.handle).await.unwrap();
        assert_eq!(content.bytes, b"a,b,c\n");
        assert_eq!(content.content_type, "text/csv");
    }

    #[tokio::test]
    async fn test_retrieve_unknown_handle() {
        let store = InMemoryArtifactStore::new();
        assert!(matches!(
            store.retrieve("nope").await,
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryArtifactStore::new();
        let org = Uuid::new_v4();
        let stored = store
            .store(org, "a.json", b"[]".to_vec(), "application/json")
            .await
            .unwrap();

        store.delete(&stored.handle).await.unwrap();
        store.delete(&stored.handle).await.unwrap();
        assert_eq!(store.artifact_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = InMemoryArtifactStore::failing();
        let result = store
            .store(Uuid::new_v4(), "a.csv", vec![], "text/csv")
            .await;
        assert!(matches!(result, Err(ArtifactError::Backend(_))));
    }
}
