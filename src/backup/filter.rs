use regex::Regex;
use tracing::{debug, warn};

/// A set of compiled skip patterns. A candidate is skipped when any pattern
/// finds a match anywhere inside it; patterns that want full-string
/// semantics anchor themselves.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    patterns: Vec<Regex>,
}

impl CompiledFilter {
    /// Compile a list of regexes. An invalid pattern is dropped with a
    /// warning rather than failing the whole set.
    pub fn compile(patterns: &[String]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            debug!("Compiling skip pattern {}", pattern);
            match Regex::new(pattern) {
                Ok(regex) => compiled.push(regex),
                Err(e) => warn!("Invalid skip pattern in configuration: {}", e),
            }
        }

        Self { patterns: compiled }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(candidate))
    }
}

/// Directory and file skip rules, immutable once built from configuration.
/// Directory rules prune whole subtrees; file rules exclude single files.
#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    pub directories: CompiledFilter,
    pub files: CompiledFilter,
}

impl SkipRules {
    pub fn new(directory_patterns: &[String], file_patterns: &[String]) -> Self {
        Self {
            directories: CompiledFilter::compile(directory_patterns),
            files: CompiledFilter::compile(file_patterns),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let filter = CompiledFilter::compile(&[]);
        assert!(!filter.matches("anything"));
        assert!(!filter.matches(""));
    }

    #[test]
    fn invalid_pattern_is_dropped_not_fatal() {
        let filter = CompiledFilter::compile(&patterns(&["[unclosed", "logs"]));
        assert!(filter.matches("logs/latest.log"));
        assert!(!filter.matches("world/region"));
    }

    #[test]
    fn matching_is_substring_search() {
        let filter = CompiledFilter::compile(&patterns(&["cache"]));
        assert!(filter.matches("cache"));
        assert!(filter.matches("plugin_cache"));
        assert!(filter.matches("data/cache/blobs"));
    }

    #[test]
    fn pattern_anchors_are_honored() {
        let filter = CompiledFilter::compile(&patterns(&["\\.jar$"]));
        assert!(filter.matches("plugins/worldedit.jar"));
        assert!(!filter.matches("plugins/worldedit.jar.backup"));
    }
}
