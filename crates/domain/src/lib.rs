//! Domain layer for the audit export service.
//!
//! This crate contains:
//! - Domain models and construction-time validation
//! - The trigger-time computation for recurring schedules
//! - Streaming export formatters (CSV, JSON, spreadsheet table)
//! - Collaborator traits (event log, artifact store, job/schedule stores,
//!   notification channel) with in-memory implementations

pub mod models;
pub mod services;
