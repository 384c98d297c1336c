//! Schedule engine.
//!
//! One tick: read due active schedules, claim each occurrence with an
//! atomic conditional update, materialize an export job per claimed
//! schedule, hand it to the runner, and advance `next_run_at`.
//!
//! The claim is the only mutual-exclusion point: several engine instances
//! can tick concurrently and exactly one wins each occurrence. A failure
//! after the claim counts as "attempted, not retried": the occurrence is
//! consumed and the next tick evaluates the following one. Missed
//! occurrences are never backfilled.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

use domain::models::{ExportSchedule, NewExportJob};
use domain::services::storage::{ExportJobStore, ExportScheduleStore, StoreError};
use domain::services::trigger;

use crate::middleware::metrics::record_schedule_tick;
use crate::services::export_runner::ExportJobRunner;

/// Outcome of one tick, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Schedules read as due.
    pub due: usize,
    /// Occurrences claimed and materialized by this instance.
    pub fired: usize,
    /// Occurrences lost to a concurrent claimant or a toggled schedule.
    pub skipped: usize,
    /// Schedules whose materialization failed after the claim.
    pub failed: usize,
}

/// Evaluates recurring schedules and materializes due export jobs.
pub struct ScheduleEngine {
    schedules: Arc<dyn ExportScheduleStore>,
    jobs: Arc<dyn ExportJobStore>,
    runner: Arc<ExportJobRunner>,
}

impl ScheduleEngine {
    pub fn new(
        schedules: Arc<dyn ExportScheduleStore>,
        jobs: Arc<dyn ExportJobStore>,
        runner: Arc<ExportJobRunner>,
    ) -> Self {
        Self {
            schedules,
            jobs,
            runner,
        }
    }

    /// One evaluation pass against all active schedules. Failures are
    /// isolated per schedule: one schedule failing to materialize never
    /// prevents the others in the same tick.
    pub async fn on_tick(&self, now: DateTime<Utc>) -> TickSummary {
        let due = match self.schedules.find_due(now).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to query due schedules");
                return TickSummary::default();
            }
        };

        let mut summary = TickSummary {
            due: due.len(),
            ..TickSummary::default()
        };

        for schedule in due {
            match self.fire_schedule(&schedule, now).await {
                Ok(true) => summary.fired += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        schedule_id = %schedule.id,
                        schedule_name = %schedule.name,
                        error = %e,
                        "Failed to materialize scheduled export"
                    );
                }
            }
        }

        record_schedule_tick(summary.fired);
        if summary.due > 0 {
            info!(
                due = summary.due,
                fired = summary.fired,
                skipped = summary.skipped,
                failed = summary.failed,
                "Schedule tick evaluated"
            );
        }
        summary
    }

    /// Claim one due occurrence and materialize its job. Returns Ok(false)
    /// when another claimant won or the schedule was toggled inactive
    /// between the due read and the claim.
    async fn fire_schedule(
        &self,
        schedule: &ExportSchedule,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let next_run_at = trigger::next_trigger_after(&schedule.trigger_spec(), now);

        let claimed = self
            .schedules
            .claim_due(schedule.id, schedule.next_run_at, now, next_run_at)
            .await?;
        if !claimed {
            return Ok(false);
        }

        // The occurrence is consumed from here on, even if materialization
        // fails below.
        let job = NewExportJob::from_schedule(schedule, now).build(now);
        self.jobs.insert(&job).await?;

        info!(
            schedule_id = %schedule.id,
            schedule_name = %schedule.name,
            job_id = %job.job_id,
            next_run_at = %next_run_at,
            "Materialized scheduled export job"
        );

        self.runner.submit(job);
        Ok(true)
    }
}
