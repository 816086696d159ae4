use crate::error::ArchiveError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Smallest Deflate level the archive format accepts.
pub const MIN_COMPRESSION_LEVEL: i64 = 0;
/// Largest Deflate level the archive format accepts; also the fallback for
/// out-of-range configuration.
pub const MAX_COMPRESSION_LEVEL: i64 = 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory tree to snapshot
    pub source_dir: PathBuf,

    /// Where archives land; created on demand at the start of each run
    pub backup_dir: PathBuf,

    /// Seconds between scheduled backup attempts
    pub backup_interval_secs: u64,

    /// Lookback window for the idle-skip decision; falls back to the
    /// interval when unset
    pub idle_threshold_secs: Option<u64>,

    /// Age in seconds past which prior archives are pruned
    pub backup_deletion_threshold_secs: u64,

    /// Deflate level for archive entries
    pub compression_level: i64,

    /// Gates the skip notification; started/succeeded/failed always fire
    pub broadcast_messages: bool,

    /// Message templates rendered by the host, carried here verbatim
    pub skip_backup_message: String,
    pub backup_started_message: String,
    pub backup_succeeded_message: String,
    pub backup_failed_message: String,

    /// Files whose root-relative path matches any of these are excluded
    pub file_skip_regexes: Vec<String>,

    /// Directories whose root-relative path matches any of these are
    /// excluded along with their entire subtree
    pub directory_skip_regexes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            backup_dir: PathBuf::from("backups"),
            backup_interval_secs: 1800,
            idle_threshold_secs: None,
            backup_deletion_threshold_secs: 86400,
            compression_level: MAX_COMPRESSION_LEVEL,
            broadcast_messages: true,
            skip_backup_message: "Skipped backup due to no player activity.".to_string(),
            backup_started_message: "Started backup...".to_string(),
            backup_succeeded_message: "Backup complete.".to_string(),
            backup_failed_message: "Backup failed. Check the server logs for more details."
                .to_string(),
            file_skip_regexes: vec!["\\.jar$".to_string(), "\\.zip$".to_string()],
            directory_skip_regexes: vec![
                "logs".to_string(),
                "cache".to_string(),
                "version".to_string(),
                "libraries".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load config from an optional JSON file and environment overrides.
    /// Only a totally unreadable config file is fatal; individually
    /// malformed values keep their defaults with a warning.
    pub fn load() -> Result<Self, ArchiveError> {
        let mut config = match std::env::var("BACKUP_CONFIG") {
            Ok(path) => Self::load_from(Path::new(&path))?,
            Err(_) => Config::default(),
        };

        config.apply_env();
        config.sanitize();
        Ok(config)
    }

    /// Parse a JSON config file; missing keys fall back to defaults.
    pub fn load_from(path: &Path) -> Result<Self, ArchiveError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ArchiveError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            ArchiveError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn apply_env(&mut self) {
        if let Ok(source) = std::env::var("BACKUP_SOURCE") {
            self.source_dir = PathBuf::from(source);
        }

        if let Ok(dest) = std::env::var("BACKUP_DEST") {
            self.backup_dir = PathBuf::from(dest);
        }

        env_override("BACKUP_INTERVAL_SECS", &mut self.backup_interval_secs);
        env_override(
            "BACKUP_DELETION_THRESHOLD_SECS",
            &mut self.backup_deletion_threshold_secs,
        );
        env_override("BACKUP_COMPRESSION_LEVEL", &mut self.compression_level);
    }

    /// Coerce out-of-range values once at load time; the write path assumes
    /// a level the archive format accepts.
    pub fn sanitize(&mut self) {
        if self.compression_level < MIN_COMPRESSION_LEVEL
            || self.compression_level > MAX_COMPRESSION_LEVEL
        {
            warn!(
                "Invalid compression level {}, defaulting to {}",
                self.compression_level, MAX_COMPRESSION_LEVEL
            );
            self.compression_level = MAX_COMPRESSION_LEVEL;
        }
    }

    /// The idle lookback window used by the scheduler's skip decision.
    pub fn idle_threshold_secs(&self) -> u64 {
        self.idle_threshold_secs.unwrap_or(self.backup_interval_secs)
    }
}

/// Apply a numeric env override; a value that fails to parse keeps the
/// current setting with a warning rather than failing startup.
fn env_override<T>(name: &str, current: &mut T)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(name) {
        match raw.parse() {
            Ok(value) => *current = value,
            Err(e) => warn!("Invalid {} {:?}, keeping current value: {}", name, raw, e),
        }
    }
}
