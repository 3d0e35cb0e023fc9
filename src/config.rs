use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_STUCK_TIMEOUT_SECS;

fn default_api_port() -> u16 {
    3000
}

fn default_stuck_timeout_secs() -> u64 {
    DEFAULT_STUCK_TIMEOUT_SECS
}

fn default_scan_interval_secs() -> u64 {
    60
}

/// Tracker configuration file structure (TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Path to the SQLite job database (required)
    pub db_path: PathBuf,
    /// Jobs in PROCESSING older than this are considered stuck (default: 300)
    #[serde(default = "default_stuck_timeout_secs")]
    pub stuck_timeout_secs: u64,
    /// How often serve mode re-runs the stuck-job scan (default: 60)
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// API server port for serve mode (default: 3000)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

impl TrackerConfig {
    /// Load and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: TrackerConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    pub fn stuck_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.stuck_timeout_secs)
    }
}
