//! Audit event entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for audit events. The table is append-only and owned by
/// the surrounding platform; this service only reads it.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEventEntity {
    /// Unique identifier.
    pub id: Uuid,

    /// Organization this event belongs to.
    pub organization_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// ID of the actor who performed the action.
    pub actor_id: Option<Uuid>,

    /// Email of the actor, when known.
    pub actor_email: Option<String>,

    /// Kind of event (create, update, delete, ...).
    pub event_type: String,

    /// Kind of entity affected (course, lesson, user, ...).
    pub entity_type: String,

    /// ID of the affected entity.
    pub entity_id: Option<String>,

    /// Display name of the affected entity.
    pub entity_name: Option<String>,

    /// Free-form event payload.
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_entity_creation() {
        let entity = AuditEventEntity {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            actor_id: Some(Uuid::new_v4()),
            actor_email: Some("teacher@example.com".to_string()),
            event_type: "publish".to_string(),
            entity_type: "course".to_string(),
            entity_id: Some("course-42".to_string()),
            entity_name: Some("Intro to Botany".to_string()),
            details: Some(serde_json::json!({"version": 3})),
        };

        assert_eq!(entity.event_type, "publish");
        assert_eq!(entity.entity_type, "course");
    }
}
