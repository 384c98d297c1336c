//! Audit event repository: the Postgres adapter for the event-log query
//! interface.
//!
//! The event log is append-only and can be large, so reads are keyset-paged
//! on `(occurred_at, id)`. Re-running a query with identical parameters
//! yields the same logical set, which makes the sequence restartable.

use async_trait::async_trait;
use domain::models::{AuditEvent, EntityType, EventFilter, EventType};
use domain::services::event_log::{EventLogError, EventLogQuery};
use shared::pagination::EventCursor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AuditEventEntity;
use crate::metrics::QueryTimer;

const EVENT_COLUMNS: &str = "id, organization_id, occurred_at, actor_id, actor_email, \
                             event_type, entity_type, entity_id, entity_name, details";

/// Helper for building the WHERE clause of an event query. Tracks parameter
/// positions so conditions and binds stay in step.
struct EventFilterBuilder {
    conditions: Vec<String>,
    param_count: i32,
}

impl EventFilterBuilder {
    fn build(filter: &EventFilter, cursor: Option<&EventCursor>) -> Self {
        let mut conditions = vec![
            "organization_id = $1".to_string(),
            "occurred_at >= $2".to_string(),
            "occurred_at <= $3".to_string(),
        ];
        let mut param_count = 3;

        if !filter.event_types.is_empty() {
            param_count += 1;
            conditions.push(format!("event_type = ANY(${})", param_count));
        }

        if !filter.entity_types.is_empty() {
            param_count += 1;
            conditions.push(format!("entity_type = ANY(${})", param_count));
        }

        if cursor.is_some() {
            conditions.push(format!(
                "(occurred_at, id) > (${}, ${})",
                param_count + 1,
                param_count + 2
            ));
            param_count += 2;
        }

        Self {
            conditions,
            param_count,
        }
    }

    fn where_clause(&self) -> String {
        self.conditions.join(" AND ")
    }

    fn param_count(&self) -> i32 {
        self.param_count
    }
}

/// Repository providing read access to the platform's audit event log.
#[derive(Clone)]
pub struct AuditEventRepository {
    pool: PgPool,
}

impl AuditEventRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLogQuery for AuditEventRepository {
    async fn fetch_batch(
        &self,
        organization_id: Uuid,
        filter: &EventFilter,
        after: Option<EventCursor>,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, EventLogError> {
        let builder = EventFilterBuilder::build(filter, after.as_ref());
        let sql = format!(
            "SELECT {} FROM audit_events WHERE {} ORDER BY occurred_at, id LIMIT ${}",
            EVENT_COLUMNS,
            builder.where_clause(),
            builder.param_count() + 1
        );

        let event_types: Vec<String> = filter.event_types.iter().map(|t| t.to_string()).collect();
        let entity_types: Vec<String> =
            filter.entity_types.iter().map(|t| t.to_string()).collect();

        let mut query = sqlx::query_as::<_, AuditEventEntity>(&sql)
            .bind(organization_id)
            .bind(filter.date_from)
            .bind(filter.date_to);

        if !event_types.is_empty() {
            query = query.bind(event_types);
        }
        if !entity_types.is_empty() {
            query = query.bind(entity_types);
        }
        if let Some(cursor) = after {
            query = query.bind(cursor.occurred_at).bind(cursor.id);
        }
        query = query.bind(limit);

        let timer = QueryTimer::new("fetch_event_batch");
        let entities = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventLogError::Query(e.to_string()))?;
        timer.record();

        Ok(entities.into_iter().map(entity_to_domain).collect())
    }
}

fn entity_to_domain(entity: AuditEventEntity) -> AuditEvent {
    AuditEvent {
        id: entity.id,
        organization_id: entity.organization_id,
        occurred_at: entity.occurred_at,
        actor_id: entity.actor_id,
        actor_email: entity.actor_email,
        event_type: EventType::from(entity.event_type),
        entity_type: EntityType::from(entity.entity_type),
        entity_id: entity.entity_id,
        entity_name: entity.entity_name,
        details: entity.details,
    }
}
