//! Export job runner.
//!
//! Executes one export job to a terminal state: claim `pending ->
//! processing`, stream the event log through the formatter, persist the
//! artifact, record the outcome. Failures land on the job record and never
//! propagate to the caller; a job that died mid-run is observable as
//! stuck-in-processing, distinguishable from pending.
//!
//! Executions are dispatched through a semaphore-bounded pool so a burst of
//! due schedules cannot create unbounded concurrent event-log queries.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use domain::models::{ExportJob, ExportJobStatus};
use domain::services::artifact_store::{ArtifactError, ArtifactStore, StoredArtifact};
use domain::services::event_log::{EventLogError, EventLogQuery};
use domain::services::formatter::{new_formatter, FormatError};
use domain::services::notification::{Notifier, NotifyResult};
use domain::services::storage::{ExportJobStore, ExportScheduleStore, StoreError};
use shared::pagination::EventCursor;

use crate::middleware::metrics::{record_export_artifact_bytes, record_export_job_finished};

/// Errors that fail an export job.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

struct ExportOutcome {
    total_records: i64,
    artifact: StoredArtifact,
}

/// Executes export jobs against the event log.
pub struct ExportJobRunner {
    jobs: Arc<dyn ExportJobStore>,
    schedules: Arc<dyn ExportScheduleStore>,
    event_log: Arc<dyn EventLogQuery>,
    artifacts: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn Notifier>,
    batch_size: i64,
    permits: Arc<Semaphore>,
}

impl ExportJobRunner {
    pub fn new(
        jobs: Arc<dyn ExportJobStore>,
        schedules: Arc<dyn ExportScheduleStore>,
        event_log: Arc<dyn EventLogQuery>,
        artifacts: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn Notifier>,
        worker_concurrency: usize,
        batch_size: i64,
    ) -> Self {
        Self {
            jobs,
            schedules,
            event_log,
            artifacts,
            notifier,
            batch_size,
            permits: Arc::new(Semaphore::new(worker_concurrency.max(1))),
        }
    }

    /// Dispatch a job to the worker pool. Returns immediately; the handle is
    /// mainly useful to tests.
    pub fn submit(self: &Arc<Self>, job: ExportJob) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            // Closed semaphore means the process is shutting down.
            let Ok(_permit) = runner.permits.clone().acquire_owned().await else {
                return;
            };
            runner.execute(job).await;
        })
    }

    /// Execute one job to a terminal state. Precondition: the job record is
    /// `pending`; anything else skips execution.
    pub async fn execute(&self, job: ExportJob) {
        let job_id = job.job_id.clone();

        // Claim before any I/O.
        match self.jobs.mark_processing(&job_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job_id, "Export job is not pending, skipping execution");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to claim export job");
                return;
            }
        }

        let started = std::time::Instant::now();
        match self.run_export(&job).await {
            Ok(outcome) => {
                let recorded = self
                    .jobs
                    .mark_completed(
                        &job_id,
                        outcome.total_records,
                        outcome.artifact.size_bytes,
                        &outcome.artifact.handle,
                        Utc::now(),
                    )
                    .await;

                match recorded {
                    Ok(true) => {
                        record_export_job_finished("completed");
                        record_export_artifact_bytes(outcome.artifact.size_bytes);
                        info!(
                            job_id = %job_id,
                            total_records = outcome.total_records,
                            artifact_size_bytes = outcome.artifact.size_bytes,
                            elapsed_ms = started.elapsed().as_millis(),
                            "Export job completed"
                        );
                        self.notify_outcome(&job, ExportJobStatus::Completed, outcome.total_records, None)
                            .await;
                    }
                    Ok(false) | Err(_) => {
                        // The outcome could not be recorded; do not leave an
                        // unreferenced artifact behind.
                        if let Err(e) = self.artifacts.delete(&outcome.artifact.handle).await {
                            warn!(job_id = %job_id, error = %e, "Failed to remove orphan artifact");
                        }
                        self.fail(&job, "Failed to record export completion").await;
                    }
                }
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Export job failed");
                self.fail(&job, &e.to_string()).await;
            }
        }
    }

    /// Query, format and store. The artifact is written only after the full
    /// stream has been formatted, so a failure anywhere leaves nothing
    /// referenced by the job.
    async fn run_export(&self, job: &ExportJob) -> Result<ExportOutcome, ExportError> {
        let mut formatter = new_formatter(job, Utc::now());
        let filter = job.event_filter();
        let mut cursor: Option<EventCursor> = None;
        let mut total_records: i64 = 0;

        loop {
            let batch = self
                .event_log
                .fetch_batch(job.organization_id, &filter, cursor, self.batch_size)
                .await?;

            for event in &batch {
                formatter.write_event(event)?;
            }
            total_records += batch.len() as i64;

            if (batch.len() as i64) < self.batch_size {
                break;
            }
            cursor = batch
                .last()
                .map(|event| EventCursor::new(event.occurred_at, event.id));
        }

        let bytes = formatter.finish()?;
        let name = format!("{}.{}", job.job_id, job.format.extension());
        let artifact = self
            .artifacts
            .store(
                job.organization_id,
                &name,
                bytes,
                job.format.content_type(),
            )
            .await?;

        Ok(ExportOutcome {
            total_records,
            artifact,
        })
    }

    async fn fail(&self, job: &ExportJob, message: &str) {
        match self.jobs.mark_failed(&job.job_id, message, Utc::now()).await {
            Ok(true) => record_export_job_finished("failed"),
            Ok(false) => {
                warn!(job_id = %job.job_id, "Export job already terminal, not marking failed")
            }
            Err(e) => {
                error!(job_id = %job.job_id, error = %e, "Failed to mark export job failed")
            }
        }
        self.notify_outcome(job, ExportJobStatus::Failed, 0, Some(message))
            .await;
    }

    /// Dispatch a terminal-status notification for schedule-backed jobs.
    /// Delivery failure is logged and never alters the job's status.
    async fn notify_outcome(
        &self,
        job: &ExportJob,
        status: ExportJobStatus,
        total_records: i64,
        error_message: Option<&str>,
    ) {
        let Some(schedule_id) = job.schedule_id else {
            return;
        };

        let schedule = match self.schedules.find(job.organization_id, schedule_id).await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => return,
            Err(e) => {
                warn!(
                    job_id = %job.job_id,
                    schedule_id = %schedule_id,
                    error = %e,
                    "Could not load schedule for notification"
                );
                return;
            }
        };

        if schedule.notify_targets.is_empty() {
            return;
        }

        let (subject, body) = match status {
            ExportJobStatus::Completed => (
                format!("Scheduled audit export completed: {}", schedule.name),
                format!(
                    "Export job {} finished with {} records ({} to {}).",
                    job.job_id,
                    total_records,
                    job.date_from.to_rfc3339(),
                    job.date_to.to_rfc3339()
                ),
            ),
            _ => (
                format!("Scheduled audit export failed: {}", schedule.name),
                format!(
                    "Export job {} failed: {}",
                    job.job_id,
                    error_message.unwrap_or("unknown error")
                ),
            ),
        };

        if let NotifyResult::Failed(e) = self
            .notifier
            .notify(&schedule.notify_targets, &subject, &body)
            .await
        {
            warn!(job_id = %job.job_id, error = %e, "Outcome notification failed");
        }
    }
}
