use super::filter::SkipRules;
use super::{archive, collector, prune, LifecycleEvent, RunOutcome};
use crate::error::ArchiveError;
use crate::utils::config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

/// What came of asking the runner for a backup.
#[derive(Debug)]
pub enum RunStatus {
    /// A run executed to completion; the report describes it.
    Ran(RunReport),
    /// Another run already held the single-flight lock; nothing happened
    /// and no lifecycle event was emitted.
    AlreadyRunning,
}

/// One finished execution, handed back to the caller and then discarded.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub files: usize,
    /// None when the run failed before a complete archive existed.
    pub archive: Option<PathBuf>,
    pub outcome: RunOutcome,
}

/// Orchestrates one end-to-end backup: output directory, lifecycle events,
/// prune, collect, write. At most one run is ever in flight, across both
/// scheduled and manual triggers.
pub struct BackupRunner {
    config: Arc<Config>,
    rules: Arc<SkipRules>,
    event_tx: broadcast::Sender<LifecycleEvent>,
    pub(crate) in_flight: Arc<Semaphore>,
}

impl BackupRunner {
    pub fn new(config: Arc<Config>) -> Self {
        let rules = Arc::new(SkipRules::new(
            &config.directory_skip_regexes,
            &config.file_skip_regexes,
        ));
        let (event_tx, _) = broadcast::channel(16);

        Self {
            config,
            rules,
            event_tx,
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    /// Lifecycle events for the host to broadcast. Emission is safe from any
    /// task; the subscriber delivers on whatever context its users require.
    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Run one backup end to end, or return immediately when another run
    /// already holds the single-flight lock.
    pub async fn run(&self) -> RunStatus {
        let permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return RunStatus::AlreadyRunning,
        };

        RunStatus::Ran(self.execute(permit).await)
    }

    /// Dispatch a run onto a worker task so the triggering caller is never
    /// blocked. Returns whether the run was accepted; a refusal means one
    /// is already in flight, not an error, and spawns nothing.
    pub fn spawn_run(self: &Arc<Self>) -> bool {
        let permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return false,
        };

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.execute(permit).await;
        });

        true
    }

    async fn execute(&self, permit: OwnedSemaphorePermit) -> RunReport {
        // held for the whole run, released on every exit path when dropped
        let _permit = permit;

        let root = self.config.source_dir.clone();
        let output_dir = self.config.backup_dir.clone();
        let mut report = RunReport {
            root: root.clone(),
            output_dir: output_dir.clone(),
            files: 0,
            archive: None,
            outcome: RunOutcome::Failed,
        };

        if let Err(source) = tokio::fs::create_dir_all(&output_dir).await {
            // the run never reaches the notification point; operators see
            // the log, the host broadcasts nothing
            let e = ArchiveError::Directory {
                path: output_dir.clone(),
                source,
            };
            warn!("Backup skipped: {:#}", anyhow::Error::from(e));
            return report;
        }

        self.emit(LifecycleEvent::Started);

        let rules = Arc::clone(&self.rules);
        let max_age = Duration::from_secs(self.config.backup_deletion_threshold_secs);
        let level = self.config.compression_level;
        let pipeline = tokio::task::spawn_blocking(move || {
            run_pipeline(&root, &output_dir, &rules, max_age, level)
        });

        match pipeline.await {
            Ok(Ok((files, archive_path))) => {
                info!(
                    "Backup complete: {} file(s) -> {}",
                    files,
                    archive_path.display()
                );
                report.files = files;
                report.archive = Some(archive_path);
                report.outcome = RunOutcome::Succeeded;
                self.emit(LifecycleEvent::Succeeded);
            }
            Ok(Err(e)) => {
                warn!("Backup failed: {:#}", anyhow::Error::from(e));
                self.emit(LifecycleEvent::Failed);
            }
            Err(e) => {
                // the blocking task panicked; report it like any failed run
                warn!("Backup task aborted unexpectedly: {}", e);
                self.emit(LifecycleEvent::Failed);
            }
        }

        report
    }
}

/// Prune, collect, write — in that order, so an expired archive is gone
/// before its replacement appears. Runs on the blocking pool.
fn run_pipeline(
    root: &Path,
    output_dir: &Path,
    rules: &SkipRules,
    max_age: Duration,
    level: i64,
) -> Result<(usize, PathBuf), ArchiveError> {
    let deleted = prune::prune(output_dir, max_age, SystemTime::now());
    if deleted > 0 {
        info!("Pruned {} expired backup(s)", deleted);
    }

    let entries = collector::collect(root, rules)?;

    let name = super::archive_file_name(&super::root_name(root), chrono::Local::now());
    let destination = output_dir.join(name);
    info!("Creating archive... {}", destination.display());
    archive::write(root, &entries, &destination, level)?;

    Ok((entries.len(), destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_config(source: &Path, dest: &Path) -> Arc<Config> {
        Arc::new(Config {
            source_dir: source.to_path_buf(),
            backup_dir: dest.to_path_buf(),
            ..Config::default()
        })
    }

    fn populate_source(root: &Path) {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("sub/b.txt"), b"beta").unwrap();
    }

    #[tokio::test]
    async fn concurrent_attempts_are_rejected_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("world");
        populate_source(&source);
        let runner = Arc::new(BackupRunner::new(test_config(
            &source,
            &dir.path().join("backups"),
        )));

        // hold the single-flight lock as an in-progress run would
        let held = runner.in_flight.clone().try_acquire_owned().unwrap();

        assert!(matches!(runner.run().await, RunStatus::AlreadyRunning));
        assert!(!runner.spawn_run());

        drop(held);
        assert!(matches!(runner.run().await, RunStatus::Ran(_)));
    }

    #[tokio::test]
    async fn successful_run_writes_archive_and_emits_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("world");
        populate_source(&source);
        let backups = dir.path().join("backups");
        let runner = BackupRunner::new(test_config(&source, &backups));

        let mut events = runner.subscribe_events();
        let status = runner.run().await;

        let RunStatus::Ran(report) = status else {
            panic!("run was rejected");
        };
        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.files, 2);
        assert!(report.archive.as_ref().unwrap().exists());

        assert_eq!(events.try_recv().unwrap(), LifecycleEvent::Started);
        assert_eq!(events.try_recv().unwrap(), LifecycleEvent::Succeeded);
    }

    #[tokio::test]
    async fn missing_source_fails_the_run_with_failed_event() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BackupRunner::new(test_config(
            &dir.path().join("gone"),
            &dir.path().join("backups"),
        ));

        let mut events = runner.subscribe_events();
        let RunStatus::Ran(report) = runner.run().await else {
            panic!("run was rejected");
        };

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert!(report.archive.is_none());
        assert_eq!(events.try_recv().unwrap(), LifecycleEvent::Started);
        assert_eq!(events.try_recv().unwrap(), LifecycleEvent::Failed);
    }

    #[tokio::test]
    async fn uncreatable_output_dir_fails_silently() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("world");
        populate_source(&source);

        // a file where the backup directory should go
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"file").unwrap();
        let runner = BackupRunner::new(test_config(&source, &blocker.join("backups")));

        let mut events = runner.subscribe_events();
        let RunStatus::Ran(report) = runner.run().await else {
            panic!("run was rejected");
        };

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn run_honors_skip_rules() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("world");
        populate_source(&source);
        fs::create_dir_all(source.join("logs")).unwrap();
        fs::write(source.join("logs/latest.log"), b"chatter").unwrap();
        fs::write(source.join("tool.jar"), b"jar").unwrap();

        let runner = BackupRunner::new(test_config(&source, &dir.path().join("backups")));
        let RunStatus::Ran(report) = runner.run().await else {
            panic!("run was rejected");
        };

        // a.txt and sub/b.txt survive the default rules
        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.files, 2);
    }
}
