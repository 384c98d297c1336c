//! Schedule engine tick job.
//!
//! Drives the schedule engine on a fixed interval. The interval is an
//! operational parameter; trigger instants come from the schedules
//! themselves, so a slower tick only delays firing, never skips it.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::services::ScheduleEngine;

use super::scheduler::{Job, JobFrequency};

/// Background job that evaluates due schedules.
pub struct ScheduleTickJob {
    engine: Arc<ScheduleEngine>,
    interval_secs: u64,
}

impl ScheduleTickJob {
    /// Create a new tick job.
    ///
    /// # Arguments
    /// * `engine` - The schedule engine to drive
    /// * `interval_secs` - Tick interval in seconds
    pub fn new(engine: Arc<ScheduleEngine>, interval_secs: u64) -> Self {
        Self {
            engine,
            interval_secs: interval_secs.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Job for ScheduleTickJob {
    fn name(&self) -> &'static str {
        "schedule_tick"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let summary = self.engine.on_tick(Utc::now()).await;

        if summary.due == 0 {
            debug!("No schedules due");
        }

        // Per-schedule failures are already isolated and logged by the
        // engine; the tick itself only fails if nothing could be evaluated.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_interval_floor_is_one_second() {
        let secs = 0u64.max(1);
        assert_eq!(JobFrequency::Seconds(secs).interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_frequency_uses_configured_interval() {
        let freq = JobFrequency::Seconds(30);
        assert_eq!(freq.interval(), Duration::from_secs(30));
    }
}
