//! Configuration access port trait.

use std::path::PathBuf;

/// Read-only `[section] key` lookups.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Integer value, or `default` when absent or unparseable.
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;

    /// A non-blank value as a path.
    fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_string(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}
