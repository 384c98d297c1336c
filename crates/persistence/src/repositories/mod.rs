//! Repository implementations for database operations.

pub mod audit_event;
pub mod export_job;
pub mod export_schedule;

pub use audit_event::AuditEventRepository;
pub use export_job::ExportJobRepository;
pub use export_schedule::ExportScheduleRepository;
