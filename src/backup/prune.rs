use super::archive::ARCHIVE_EXT;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Delete prior archives in `output_dir` that are strictly older than
/// `max_age` at `now`. Only the immediate entries with the archive
/// extension are candidates; unrelated files are never touched. Per-file
/// stat/delete failures are logged and do not abort the scan. Returns the
/// number of archives deleted.
pub fn prune(output_dir: &Path, max_age: Duration, now: SystemTime) -> usize {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Failed to scan backup directory {}: {}",
                output_dir.display(),
                e
            );
            return 0;
        }
    };

    let mut deleted = 0;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read backup directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != ARCHIVE_EXT) {
            continue;
        }

        match archive_age(&path, now) {
            Ok(Some(age)) if age > max_age => match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Deleted old backup {}", path.display());
                    deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete old backup file {}: {}", path.display(), e);
                }
            },
            Ok(_) => {}
            Err(e) => warn!("Failed to stat backup file {}: {}", path.display(), e),
        }
    }

    deleted
}

fn archive_age(path: &Path, now: SystemTime) -> io::Result<Option<Duration>> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Ok(None);
    }

    let modified = metadata.modified()?;
    // a modification time in the future is never old
    Ok(now.duration_since(modified).ok())
}
