use super::collector::posix_relative;
use crate::error::ArchiveError;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Extension shared by every archive this crate produces; the retention
/// pruner recognizes candidates by it.
pub const ARCHIVE_EXT: &str = "zip";

const CHUNK_SIZE: usize = 64 * 1024;

/// Stream `entries` (root-relative paths) into a single zip container at
/// `destination`, in the order given, with Deflate at `level`.
///
/// On any I/O error the half-written destination is removed so it can never
/// pass for a valid backup, and the error fails the run.
pub fn write(
    root: &Path,
    entries: &[PathBuf],
    destination: &Path,
    level: i64,
) -> Result<(), ArchiveError> {
    match write_entries(root, entries, destination, level) {
        Ok(()) => Ok(()),
        Err(source) => {
            if destination.exists() {
                if let Err(e) = std::fs::remove_file(destination) {
                    warn!(
                        "Failed to remove partial archive {}: {}",
                        destination.display(),
                        e
                    );
                }
            }

            Err(ArchiveError::Write {
                path: destination.to_path_buf(),
                source,
            })
        }
    }
}

fn write_entries(
    root: &Path,
    entries: &[PathBuf],
    destination: &Path,
    level: i64,
) -> Result<(), ZipError> {
    let file = File::create(destination)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    for entry in entries {
        let source_path = root.join(entry);
        debug!("Compressing {}", source_path.display());

        writer.start_file(posix_relative(root, &source_path), options)?;

        let source = File::open(&source_path)?;
        let mut reader = BufReader::with_capacity(CHUNK_SIZE, source);
        io::copy(&mut reader, &mut writer)?;
    }

    writer.finish()?;
    Ok(())
}
