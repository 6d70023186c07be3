//! Configuration file format.
//!
//! ```toml
//! [directory]
//! scan_timeout_ms = 30000
//! feed_capacity = 256
//!
//! [directory.filter]
//! identifier_types = [2]
//! include_categories = false
//!
//! [region]
//! preset = "itu2"
//!
//! [logging]
//! log_dir = "logs"
//! retention_days = 7
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use radio_directory_protocol::{AmFmRegionConfig, ProgramFilter, RegionPreset};

use crate::directory::{DirectoryConfig, DEFAULT_FEED_CAPACITY, DEFAULT_SCAN_TIMEOUT};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "radio-directory.toml";

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub directory: DirectorySection,
    #[serde(default)]
    pub region: RegionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct DirectorySection {
    pub scan_timeout_ms: Option<u64>,
    pub feed_capacity: Option<usize>,
    /// Admission filter applied before entries are retained.
    pub filter: Option<ProgramFilter>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RegionSection {
    pub preset: Option<RegionPreset>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

impl DirectorySection {
    /// Directory parameters with defaults filled in.
    pub fn to_directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            scan_timeout: self
                .scan_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SCAN_TIMEOUT),
            feed_capacity: self.feed_capacity.unwrap_or(DEFAULT_FEED_CAPACITY),
            admission: self.filter.clone(),
        }
    }
}

impl RegionSection {
    pub fn to_region_config(&self) -> AmFmRegionConfig {
        AmFmRegionConfig::preset(self.preset.unwrap_or_default())
    }
}

/// Parse a configuration file.
pub fn load_config(path: &Path) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Explicit path, else the default file if it exists.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    })
}
