//! Artifact expiry cleanup job.
//!
//! Terminal jobs whose retention window has passed are removed together
//! with their artifacts. Runs hourly; each pass handles a bounded batch so
//! a large backlog cannot stall the scheduler.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use domain::services::artifact_store::ArtifactStore;
use domain::services::storage::ExportJobStore;

use super::scheduler::{Job, JobFrequency};

/// Background job that deletes expired export jobs and their artifacts.
pub struct ArtifactCleanupJob {
    jobs: Arc<dyn ExportJobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    batch_size: i64,
}

impl ArtifactCleanupJob {
    /// Create a new cleanup job.
    ///
    /// # Arguments
    /// * `jobs` - Job store to scan for expired records
    /// * `artifacts` - Artifact store to delete files from
    /// * `batch_size` - Expired jobs processed per pass
    pub fn new(
        jobs: Arc<dyn ExportJobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        batch_size: i64,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            batch_size,
        }
    }
}

#[async_trait::async_trait]
impl Job for ArtifactCleanupJob {
    fn name(&self) -> &'static str {
        "artifact_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self
            .jobs
            .find_expired(Utc::now(), self.batch_size)
            .await
            .map_err(|e| format!("Failed to query expired jobs: {}", e))?;

        let mut deleted = 0u32;
        for job in expired {
            if let Some(handle) = &job.artifact_handle {
                if let Err(e) = self.artifacts.delete(handle).await {
                    warn!(job_id = %job.job_id, error = %e, "Failed to delete expired artifact");
                    continue;
                }
            }

            match self.jobs.delete(job.organization_id, &job.job_id).await {
                Ok(_) => deleted += 1,
                Err(e) => {
                    warn!(job_id = %job.job_id, error = %e, "Failed to delete expired job")
                }
            }
        }

        if deleted > 0 {
            info!(deleted = deleted, "Cleaned up expired export jobs");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use domain::models::{ExportFormat, NewExportJob};
    use domain::services::artifact_store::InMemoryArtifactStore;
    use domain::services::storage::MemoryExportJobStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_cleanup_removes_expired_jobs_and_artifacts() {
        let jobs: Arc<MemoryExportJobStore> = Arc::new(MemoryExportJobStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let org = Uuid::new_v4();
        // Created long enough ago that the retention window has passed
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let job = NewExportJob::on_demand(
            org,
            ExportFormat::Csv,
            created - Duration::days(1),
            created,
            vec![],
            vec![],
        )
        .unwrap()
        .build(created);
        jobs.insert(&job).await.unwrap();

        let stored = artifacts
            .store(org, "export.csv", b"data".to_vec(), "text/csv")
            .await
            .unwrap();
        jobs.mark_processing(&job.job_id).await.unwrap();
        jobs.mark_completed(&job.job_id, 1, 4, &stored.handle, created)
            .await
            .unwrap();

        let cleanup = ArtifactCleanupJob::new(jobs.clone(), artifacts.clone(), 100);
        cleanup.execute().await.unwrap();

        assert!(jobs.find(org, &job.job_id).await.unwrap().is_none());
        assert_eq!(artifacts.artifact_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_leaves_unexpired_jobs() {
        let jobs: Arc<MemoryExportJobStore> = Arc::new(MemoryExportJobStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();

        let job = NewExportJob::on_demand(
            org,
            ExportFormat::Json,
            now - Duration::days(1),
            now,
            vec![],
            vec![],
        )
        .unwrap()
        .build(now);
        jobs.insert(&job).await.unwrap();
        jobs.mark_processing(&job.job_id).await.unwrap();
        jobs.mark_completed(&job.job_id, 0, 2, "h", now).await.unwrap();

        let cleanup = ArtifactCleanupJob::new(jobs.clone(), artifacts, 100);
        cleanup.execute().await.unwrap();

        assert!(jobs.find(org, &job.job_id).await.unwrap().is_some());
    }
}
