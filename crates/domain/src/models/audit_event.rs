//! Audit event domain models.
//!
//! The event log is an append-only store owned by the surrounding platform;
//! this service only reads it. Event and entity kinds are closed enumerations
//! with a passthrough variant, so records written by a newer platform version
//! still export instead of being dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

/// Kinds of audited platform events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Create,
    Update,
    Delete,
    Publish,
    Unpublish,
    Enroll,
    Unenroll,
    Login,
    Logout,
    Download,
    PermissionChange,
    /// Event kind this service does not know about; exported verbatim.
    Other(String),
}

impl EventType {
    fn parse(s: &str) -> Self {
        match s {
            "create" => EventType::Create,
            "update" => EventType::Update,
            "delete" => EventType::Delete,
            "publish" => EventType::Publish,
            "unpublish" => EventType::Unpublish,
            "enroll" => EventType::Enroll,
            "unenroll" => EventType::Unenroll,
            "login" => EventType::Login,
            "logout" => EventType::Logout,
            "download" => EventType::Download,
            "permission_change" => EventType::PermissionChange,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::Delete => "delete",
            EventType::Publish => "publish",
            EventType::Unpublish => "unpublish",
            EventType::Enroll => "enroll",
            EventType::Unenroll => "unenroll",
            EventType::Login => "login",
            EventType::Logout => "logout",
            EventType::Download => "download",
            EventType::PermissionChange => "permission_change",
            EventType::Other(other) => other,
        };
        write!(f, "{}", s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.to_string()
    }
}

/// Kinds of platform entities an event can reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Course,
    Lesson,
    Quiz,
    Assignment,
    Enrollment,
    User,
    Page,
    MediaAsset,
    Setting,
    /// Entity kind this service does not know about; exported verbatim.
    Other(String),
}

impl EntityType {
    fn parse(s: &str) -> Self {
        match s {
            "course" => EntityType::Course,
            "lesson" => EntityType::Lesson,
            "quiz" => EntityType::Quiz,
            "assignment" => EntityType::Assignment,
            "enrollment" => EntityType::Enrollment,
            "user" => EntityType::User,
            "page" => EntityType::Page,
            "media_asset" => EntityType::MediaAsset,
            "setting" => EntityType::Setting,
            other => EntityType::Other(other.to_string()),
        }
    }
}

impl FromStr for EntityType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Course => "course",
            EntityType::Lesson => "lesson",
            EntityType::Quiz => "quiz",
            EntityType::Assignment => "assignment",
            EntityType::Enrollment => "enrollment",
            EntityType::User => "user",
            EntityType::Page => "page",
            EntityType::MediaAsset => "media_asset",
            EntityType::Setting => "setting",
            EntityType::Other(other) => other,
        };
        write!(f, "{}", s)
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EntityType> for String {
    fn from(t: EntityType) -> Self {
        t.to_string()
    }
}

/// One audit event as read from the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub event_type: EventType,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

/// Filter applied to an event-log query. Empty type lists mean "no filter".
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub event_types: Vec<EventType>,
    pub entity_types: Vec<EntityType>,
}

impl EventFilter {
    /// Whether an event falls inside this filter. The date range is inclusive
    /// on both ends.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if event.occurred_at < self.date_from || event.occurred_at > self.date_to {
            return false;
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if !self.entity_types.is_empty() && !self.entity_types.contains(&event.entity_type) {
            return false;
        }
        true
    }
}
