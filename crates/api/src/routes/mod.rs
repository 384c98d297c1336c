//! HTTP route handlers.

pub mod export_jobs;
pub mod export_schedules;
pub mod health;
