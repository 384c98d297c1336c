//! Service layer: the export runner, the schedule engine, and the
//! production adapters for the artifact store and notification channel.

pub mod export_runner;
pub mod fs_artifact_store;
pub mod notifier;
pub mod schedule_engine;

pub use export_runner::ExportJobRunner;
pub use fs_artifact_store::FsArtifactStore;
pub use notifier::{build_notifier, ConsoleNotifier};
pub use schedule_engine::{ScheduleEngine, TickSummary};
