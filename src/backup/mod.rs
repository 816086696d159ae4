pub mod archive;
pub mod collector;
pub mod filter;
pub mod prune;
pub mod runner;
pub mod scheduler;

pub use filter::{CompiledFilter, SkipRules};
pub use runner::{BackupRunner, RunReport, RunStatus};
pub use scheduler::{ActivityClock, BackupScheduler};

use chrono::{DateTime, Local};
use std::path::Path;

/// Lifecycle signals emitted to the host for broadcast. The host owns the
/// message text, formatting and the delivery context; each signal carries
/// no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Succeeded,
    Failed,
    Skipped,
}

/// Terminal state of a run that got past the single-flight lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// Final path segment of the snapshotted root, used as the archive name
/// prefix.
pub fn root_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "backup".to_string())
}

/// `<rootName>_<timestamp>.zip`. The retention pruner relies on the
/// extension to recognize prior archives.
pub fn archive_file_name(root_name: &str, when: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        root_name,
        when.format("%Y-%m-%d-%I-%M-%S"),
        archive::ARCHIVE_EXT
    )
}
