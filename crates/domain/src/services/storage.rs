//! Durable storage interfaces for jobs and schedules.
//!
//! The traits mirror the query patterns the runner and the schedule engine
//! need, including the conditional updates that make state transitions and
//! due-schedule claims safe under concurrent callers. Implementations must
//! provide those updates as single atomic operations against the backing
//! store; an in-process lock is not enough when several engine instances
//! run for availability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ExportJob, ExportJobStatus, ExportSchedule};

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Backend(String),
}

/// Durable storage for export jobs.
#[async_trait]
pub trait ExportJobStore: Send + Sync {
    async fn insert(&self, job: &ExportJob) -> Result<(), StoreError>;

    async fn find(
        &self,
        organization_id: Uuid,
        job_id: &str,
    ) -> Result<Option<ExportJob>, StoreError>;

    /// Most recent jobs for an organization, optionally filtered by status.
    async fn list(
        &self,
        organization_id: Uuid,
        status: Option<ExportJobStatus>,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError>;

    /// Transition `pending -> processing`. Returns false when the job was
    /// not pending, so a job is never executed twice.
    async fn mark_processing(&self, job_id: &str) -> Result<bool, StoreError>;

    /// Transition a non-terminal job to `completed` with its artifact data.
    async fn mark_completed(
        &self,
        job_id: &str,
        total_records: i64,
        artifact_size_bytes: i64,
        artifact_handle: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Transition a non-terminal job to `failed` with an error message.
    async fn mark_failed(
        &self,
        job_id: &str,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Delete a job, returning the deleted record so the caller can also
    /// drop its artifact.
    async fn delete(
        &self,
        organization_id: Uuid,
        job_id: &str,
    ) -> Result<Option<ExportJob>, StoreError>;

    /// Jobs whose artifact retention window has passed.
    async fn find_expired(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError>;
}

/// Durable storage for export schedules.
#[async_trait]
pub trait ExportScheduleStore: Send + Sync {
    async fn insert(&self, schedule: &ExportSchedule) -> Result<(), StoreError>;

    async fn find(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ExportSchedule>, StoreError>;

    async fn list(&self, organization_id: Uuid) -> Result<Vec<ExportSchedule>, StoreError>;

    /// Persist an edited schedule. Returns false when it no longer exists.
    async fn update(&self, schedule: &ExportSchedule) -> Result<bool, StoreError>;

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool, StoreError>;

    /// Active schedules with `next_run_at <= now`, across organizations.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ExportSchedule>, StoreError>;

    /// Claim one due occurrence: advance the run state only if the schedule
    /// is still active and `next_run_at` still equals the value the caller
    /// read. Exactly one of any number of concurrent claimants wins.
    async fn claim_due(
        &self,
        id: Uuid,
        expected_next_run_at: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// In-memory job store for development and testing.
#[derive(Default)]
pub struct MemoryExportJobStore {
    jobs: Mutex<HashMap<String, ExportJob>>,
}

impl MemoryExportJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_jobs<R>(&self, f: impl FnOnce(&mut HashMap<String, ExportJob>) -> R) -> R {
        let mut jobs = self.jobs.lock().expect("job store lock poisoned");
        f(&mut jobs)
    }
}

#[async_trait]
impl ExportJobStore for MemoryExportJobStore {
    async fn insert(&self, job: &ExportJob) -> Result<(), StoreError> {
        self.with_jobs(|jobs| {
            jobs.insert(job.job_id.clone(), job.clone());
        });
        Ok(())
    }

    async fn find(
        &self,
        organization_id: Uuid,
        job_id: &str,
    ) -> Result<Option<ExportJob>, StoreError> {
        Ok(self.with_jobs(|jobs| {
            jobs.get(job_id)
                .filter(|j| j.organization_id == organization_id)
                .cloned()
        }))
    }

    async fn list(
        &self,
        organization_id: Uuid,
        status: Option<ExportJobStatus>,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError> {
        Ok(self.with_jobs(|jobs| {
            let mut matching: Vec<ExportJob> = jobs
                .values()
                .filter(|j| j.organization_id == organization_id)
                .filter(|j| status.map_or(true, |s| j.status == s))
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            matching.truncate(limit.max(0) as usize);
            matching
        }))
    }

    async fn mark_processing(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(self.with_jobs(|jobs| match jobs.get_mut(job_id) {
            Some(job) if job.status == ExportJobStatus::Pending => {
                job.status = ExportJobStatus::Processing;
                true
            }
            _ => false,
        }))
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        total_records: i64,
        artifact_size_bytes: i64,
        artifact_handle: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.with_jobs(|jobs| match jobs.get_mut(job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = ExportJobStatus::Completed;
                job.total_records = Some(total_records);
                job.artifact_size_bytes = Some(artifact_size_bytes);
                job.artifact_handle = Some(artifact_handle.to_string());
                job.completed_at = Some(completed_at);
                true
            }
            _ => false,
        }))
    }

    async fn mark_failed(
        &self,
        job_id: &str,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.with_jobs(|jobs| match jobs.get_mut(job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = ExportJobStatus::Failed;
                job.error_message = Some(error_message.to_string());
                job.completed_at = Some(completed_at);
                true
            }
            _ => false,
        }))
    }

    async fn delete(
        &self,
        organization_id: Uuid,
        job_id: &str,
    ) -> Result<Option<ExportJob>, StoreError> {
        Ok(self.with_jobs(|jobs| {
            let owned = jobs
                .get(job_id)
                .map_or(false, |j| j.organization_id == organization_id);
            if owned {
                jobs.remove(job_id)
            } else {
                None
            }
        }))
    }

    async fn find_expired(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError> {
        Ok(self.with_jobs(|jobs| {
            let mut expired: Vec<ExportJob> = jobs
                .values()
                .filter(|j| j.status.is_terminal() && j.expires_at <= now)
                .cloned()
                .collect();
            expired.sort_by_key(|j| j.expires_at);
            expired.truncate(limit.max(0) as usize);
            expired
        }))
    }
}

/// In-memory schedule store for development and testing. The claim is a
/// compare-and-swap under the store lock, matching the conditional-update
/// contract of the Postgres implementation.
#[derive(Default)]
pub struct MemoryExportScheduleStore {
    schedules: Mutex<HashMap<Uuid, ExportSchedule>>,
}

impl MemoryExportScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_schedules<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, ExportSchedule>) -> R) -> R {
        let mut schedules = self.schedules.lock().expect("schedule store lock poisoned");
        f(&mut schedules)
    }
}

#[async_trait]
impl ExportScheduleStore for MemoryExportScheduleStore {
    async fn insert(&self, schedule: &ExportSchedule) -> Result<(), StoreError> {
        self.with_schedules(|schedules| {
            schedules.insert(schedule.id, schedule.clone());
        });
        Ok(())
    }

    async fn find(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ExportSchedule>, StoreError> {
        Ok(self.with_schedules(|schedules| {
            schedules
                .get(&id)
                .filter(|s| s.organization_id == organization_id)
                .cloned()
        }))
    }

    async fn list(&self, organization_id: Uuid) -> Result<Vec<ExportSchedule>, StoreError> {
        Ok(self.with_schedules(|schedules| {
            let mut matching: Vec<ExportSchedule> = schedules
                .values()
                .filter(|s| s.organization_id == organization_id)
                .cloned()
                .collect();
            matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            matching
        }))
    }

    async fn update(&self, schedule: &ExportSchedule) -> Result<bool, StoreError> {
        Ok(self.with_schedules(|schedules| {
            if schedules.contains_key(&schedule.id) {
                schedules.insert(schedule.id, schedule.clone());
                true
            } else {
                false
            }
        }))
    }

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with_schedules(|schedules| {
            let owned = schedules
                .get(&id)
                .map_or(false, |s| s.organization_id == organization_id);
            if owned {
                schedules.remove(&id);
            }
            owned
        }))
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ExportSchedule>, StoreError> {
        Ok(self.with_schedules(|schedules| {
            let mut due: Vec<ExportSchedule> = schedules
                .values()
                .filter(|s| s.is_active && s.next_run_at <= now)
                .cloned()
                .collect();
            due.sort_by_key(|s| s.next_run_at);
            due
        }))
    }

    async fn claim_due(
        &self,
        id: Uuid,
        expected_next_run_at: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.with_schedules(|schedules| match schedules.get_mut(&id) {
            Some(s) if s.is_active && s.next_run_at == expected_next_run_at => {
                s.last_run_at = Some(last_run_at);
                s.next_run_at = next_run_at;
                s.updated_at = last_run_at;
                true
            }
            _ => false,
        }))
    }
}
