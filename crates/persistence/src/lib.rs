//! Persistence layer for the audit export service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain storage traits

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
