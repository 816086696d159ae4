use super::filter::SkipRules;
use crate::error::ArchiveError;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Root-relative path with forward slashes, used both for pattern matching
/// and as the archive entry name.
pub fn posix_relative(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();

    parts.join("/")
}

/// Depth-first walk of `root`, returning the root-relative paths of every
/// file to archive, in traversal order.
///
/// A directory whose relative path matches the directory rules is pruned
/// before descent, so nothing under it is ever visited. A file whose
/// relative path matches the file rules is excluded individually.
/// Unreadable entries are logged and skipped; a missing root fails the run.
pub fn collect(root: &Path, rules: &SkipRules) -> Result<Vec<PathBuf>, ArchiveError> {
    if !root.is_dir() {
        return Err(ArchiveError::Walk {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "source directory does not exist"),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter();
    let walker = walker.filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }

        // the root itself participates with an empty relative path
        let relative = posix_relative(root, entry.path());
        if rules.directories.matches(&relative) {
            debug!("Skipping subtree starting at {}", entry.path().display());
            return false;
        }

        true
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("I/O error while walking source tree: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = posix_relative(root, entry.path());
        if rules.files.matches(&relative) {
            debug!("Skipping file {}", entry.path().display());
            continue;
        }

        files.push(PathBuf::from(relative));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    fn rules(dirs: &[&str], files: &[&str]) -> SkipRules {
        SkipRules::new(
            &dirs.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &files.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn collected(root: &Path, rules: &SkipRules) -> BTreeSet<String> {
        collect(root, rules)
            .unwrap()
            .into_iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn directory_rule_prunes_subtree_but_not_similarly_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("logs/a.txt"));
        touch(&root.join("other/logs.txt"));
        touch(&root.join("other/b.txt"));

        let found = collected(root, &rules(&["logs"], &[]));
        let expected: BTreeSet<String> = ["other/logs.txt", "other/b.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn empty_rules_collect_every_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("sub/b.txt"));
        touch(&root.join("sub/deeper/c.txt"));

        let all = collect(root, &SkipRules::default()).unwrap();
        assert_eq!(all.len(), 3);

        let unique: BTreeSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn file_rule_excludes_individual_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("plugins/tool.jar"));
        touch(&root.join("plugins/config.yml"));

        let found = collected(root, &rules(&[], &["\\.jar$"]));
        let expected: BTreeSet<String> = ["plugins/config.yml"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");

        assert!(matches!(
            collect(&gone, &SkipRules::default()),
            Err(ArchiveError::Walk { .. })
        ));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("sub/deeper/c.txt"));

        let all = collect(root, &SkipRules::default()).unwrap();
        assert_eq!(all[0].to_string_lossy(), "sub/deeper/c.txt");
    }
}
