//! Periodic, filtered zip snapshots of a live directory tree, embedded in a
//! long-lived host process. The scheduler sleeps for a configured interval,
//! backs up only when the host saw recent activity, guarantees at most one
//! run in flight, and prunes prior archives by age.

pub mod backup;
pub mod error;
pub mod utils;

pub use backup::{
    ActivityClock, BackupRunner, BackupScheduler, CompiledFilter, LifecycleEvent, RunOutcome,
    RunReport, RunStatus, SkipRules,
};
pub use error::ArchiveError;
pub use utils::config::Config;
