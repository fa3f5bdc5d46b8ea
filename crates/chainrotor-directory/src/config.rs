//! Directory configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Public catalog of chains and their RPC endpoints.
pub const DEFAULT_CATALOG_URL: &str = "https://chainlist.org/rpcs.json";

/// Default interval between background catalog refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// Where the parsed catalog is persisted between runs.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Catalog download timeout, in seconds. Zero disables it.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_catalog_url() -> String { DEFAULT_CATALOG_URL.to_string() }
fn default_snapshot_path() -> PathBuf { std::env::temp_dir().join("chainlist.json") }
fn default_refresh_interval_secs() -> u64 { DEFAULT_REFRESH_INTERVAL.as_secs() }
fn default_fetch_timeout_secs() -> u64 { 30 }

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            snapshot_path: default_snapshot_path(),
            refresh_interval_secs: default_refresh_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl DirectoryConfig {
    /// Never shorter than one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DirectoryConfig::default();
        assert_eq!(cfg.catalog_url, "https://chainlist.org/rpcs.json");
        assert!(cfg.snapshot_path.ends_with("chainlist.json"));
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1800));
        assert_eq!(cfg.fetch_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg: DirectoryConfig = serde_json::from_str(r#"{"refresh_interval_secs":0}"#).unwrap();
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1));
        assert_eq!(cfg.fetch_timeout_secs, 30);
    }

    #[test]
    fn zero_fetch_timeout_disables_it() {
        let cfg: DirectoryConfig = serde_json::from_str(r#"{"fetch_timeout_secs":0}"#).unwrap();
        assert_eq!(cfg.fetch_timeout(), None);
    }
}
