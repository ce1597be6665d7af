// Cache path utilities.
// Resolves the cache directory and maps cache keys to entry files.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Fallback directory when the platform cache dir cannot be determined.
const FALLBACK_DIR: &str = "cache";

/// Get the platform cache directory (~/.cache/world-monitor on Linux).
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "world-monitor")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR))
}

/// Path to the entry file for a cache key.
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", sanitize_key(key)))
}

/// Sanitize a key for use as a file name.
/// Replaces path separators and other problematic characters with underscores.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => '_',
            c if c.is_whitespace() => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("rss_news"), "rss_news");
        assert_eq!(sanitize_key("gdelt/geo"), "gdelt_geo");
        assert_eq!(sanitize_key("../etc passwd"), "___etc_passwd");
    }

    #[test]
    fn test_entry_path_stays_in_dir() {
        let dir = Path::new("/tmp/wm-cache");
        let path = entry_path(dir, "../../escape");
        assert_eq!(path.parent(), Some(dir));
        assert!(path.ends_with("______escape.json"));
    }
}
