//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod audit_event;
pub mod export_job;
pub mod export_schedule;

pub use audit_event::AuditEventEntity;
pub use export_job::ExportJobEntity;
pub use export_schedule::ExportScheduleEntity;
