use anyhow::Result;
use backup_archiver::{BackupScheduler, Config, LifecycleEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    backup_archiver::utils::logging::init_tracing();

    let config = Arc::new(Config::load()?);
    info!(
        "Snapshotting {} -> {} every {}s",
        config.source_dir.display(),
        config.backup_dir.display(),
        config.backup_interval_secs
    );

    let mut scheduler = BackupScheduler::new(Arc::clone(&config));

    // Relay lifecycle events to the console; a real host renders these
    // templates on whatever context its users require.
    let mut events = scheduler.subscribe_events();
    let messages = Arc::clone(&config);
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let message = match event {
                LifecycleEvent::Started => &messages.backup_started_message,
                LifecycleEvent::Succeeded => &messages.backup_succeeded_message,
                LifecycleEvent::Failed => &messages.backup_failed_message,
                LifecycleEvent::Skipped => &messages.skip_backup_message,
            };
            info!("{}", message);
        }
    });

    scheduler.start();
    shutdown_signal().await;

    if scheduler.stop(STOP_TIMEOUT).await {
        warn!("Backup task is still alive.");
    }

    info!("Stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
