//! Domain models.

mod audit_event;
mod export_job;
mod export_schedule;

pub use audit_event::*;
pub use export_job::*;
pub use export_schedule::*;
