//! Event log query interface.
//!
//! The event log itself belongs to the surrounding platform; this service
//! only reads it. Queries are lazy and restartable: the runner pulls fixed
//! size batches in `(occurred_at, id)` order and resumes from a cursor, so
//! a bounded date range is always a finite, repeatable sequence.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use shared::pagination::EventCursor;

use crate::models::{AuditEvent, EventFilter};

/// Errors surfaced by an event-log backend.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("Event log query failed: {0}")]
    Query(String),
}

/// Read access to the append-only event log.
#[async_trait]
pub trait EventLogQuery: Send + Sync {
    /// Fetch up to `limit` events matching `filter`, strictly after the
    /// cursor position, ordered by `(occurred_at, id)` ascending. A batch
    /// shorter than `limit` ends the sequence.
    async fn fetch_batch(
        &self,
        organization_id: Uuid,
        filter: &EventFilter,
        after: Option<EventCursor>,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, EventLogError>;
}

/// In-memory event log for development and testing.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<AuditEvent>>,
    /// When set, the batch with this index fails, simulating a query error
    /// partway through a stream.
    fail_on_batch: Option<usize>,
    batches_served: Mutex<usize>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that fails on the given zero-based batch index.
    pub fn failing_on_batch(batch: usize) -> Self {
        Self {
            fail_on_batch: Some(batch),
            ..Self::default()
        }
    }

    pub fn push(&self, event: AuditEvent) {
        self.events
            .lock()
            .expect("event log lock poisoned")
            .push(event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventLogQuery for InMemoryEventLog {
    async fn fetch_batch(
        &self,
        organization_id: Uuid,
        filter: &EventFilter,
        after: Option<EventCursor>,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, EventLogError> {
        {
            let mut served = self.batches_served.lock().expect("event log lock poisoned");
            if self.fail_on_batch == Some(*served) {
                return Err(EventLogError::Query("simulated backend failure".to_string()));
            }
            *served += 1;
        }

        let mut matching: Vec<AuditEvent> = self
            .events
            .lock()
            .expect("event log lock poisoned")
            .iter()
            .filter(|e| e.organization_id == organization_id && filter.matches(e))
            .filter(|e| match after {
                Some(cursor) => {
                    (e.occurred_at, e.id) > (cursor.occurred_at, cursor.id)
                }
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by_key(|e| (e.occurred_at, e.id));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}
