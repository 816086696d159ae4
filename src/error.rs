use std::io;
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

/// Run-level failures. Per-entry problems (an unreadable file during the
/// walk, a stale archive that refuses to delete) are logged and recovered
/// in place; only these variants fail a run or startup.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Configuration could not be loaded at all. Fatal to startup;
    /// individually malformed values are substituted with defaults instead.
    #[error("configuration error: {0}")]
    Config(String),

    /// The backup output directory is missing and could not be created.
    #[error("failed to create backup directory {path}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source root is missing or unreadable.
    #[error("failed to walk source directory {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O failure while streaming entries into the archive.
    #[error("failed to write archive {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}
