use super::runner::BackupRunner;
use super::LifecycleEvent;
use crate::utils::config::Config;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Timestamp of the most recent host activity, written lock-free from any
/// number of callers. Last write wins; staleness of one scheduler tick is
/// acceptable.
#[derive(Debug)]
pub struct ActivityClock {
    last: AtomicI64,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(now_millis()),
        }
    }

    pub fn record(&self, epoch_millis: i64) {
        self.last.store(epoch_millis, Ordering::Relaxed);
    }

    pub fn record_now(&self) {
        self.record(now_millis());
    }

    pub fn last(&self) -> i64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the background timing loop: sleep for the configured interval, then
/// either run a backup (host was active within the idle window) or emit a
/// skip. Started once on enable, stopped once on disable.
pub struct BackupScheduler {
    config: Arc<Config>,
    runner: Arc<BackupRunner>,
    activity: Arc<ActivityClock>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BackupScheduler {
    pub fn new(config: Arc<Config>) -> Self {
        let runner = Arc::new(BackupRunner::new(Arc::clone(&config)));

        Self {
            config,
            runner,
            activity: Arc::new(ActivityClock::new()),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn runner(&self) -> &Arc<BackupRunner> {
        &self.runner
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.runner.subscribe_events()
    }

    /// Note host activity at the given epoch-millisecond timestamp. Safe to
    /// call from any number of concurrent contexts.
    pub fn record_activity(&self, epoch_millis: i64) {
        self.activity.record(epoch_millis);
    }

    pub fn record_activity_now(&self) {
        self.activity.record_now();
    }

    /// Dispatch a manual backup onto a worker task, bypassing the timing
    /// loop. Returns false when a run is already in flight.
    pub fn request_manual_run(&self) -> bool {
        self.runner.spawn_run()
    }

    /// Spawn the timing loop. Calling start on an already-started scheduler
    /// is a no-op.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        info!(
            "Backup scheduler started (interval: {}s, idle window: {}s)",
            self.config.backup_interval_secs,
            self.config.idle_threshold_secs()
        );

        let config = Arc::clone(&self.config);
        let runner = Arc::clone(&self.runner);
        let activity = Arc::clone(&self.activity);
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            run_loop(config, runner, activity, cancel).await;
        }));
    }

    /// Cancel the loop and wait up to `timeout` for the task to exit. The
    /// cancellation wakes an in-progress sleep immediately; a run already in
    /// flight is left to finish. Returns true when the task is still alive
    /// after the timeout.
    pub async fn stop(&mut self, timeout: Duration) -> bool {
        self.cancel.cancel();

        let Some(task) = self.task.take() else {
            return false;
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(())) => {
                info!("Backup scheduler stopped.");
                false
            }
            Ok(Err(e)) => {
                warn!("Backup scheduler task failed: {}", e);
                false
            }
            Err(_) => {
                warn!("Backup scheduler did not stop within {:?}", timeout);
                true
            }
        }
    }
}

async fn run_loop(
    config: Arc<Config>,
    runner: Arc<BackupRunner>,
    activity: Arc<ActivityClock>,
    cancel: CancellationToken,
) {
    let interval = Duration::from_secs(config.backup_interval_secs);
    let idle_window_millis = config.idle_threshold_secs() as i64 * 1000;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        // only back up if there has been activity within the idle window
        let idle_for = now_millis().saturating_sub(activity.last());
        if idle_for < idle_window_millis {
            runner.run().await;
        } else {
            debug!("Skipping backup; no activity for {}ms", idle_for);
            if config.broadcast_messages {
                runner.emit(LifecycleEvent::Skipped);
            }
        }
    }
}
