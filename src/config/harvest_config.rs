use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Tunables of the harvesting pipeline.
///
/// Every field has a default, so a YAML file only needs to name the values
/// that differ for a given platform.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HarvestConfig {
    /// Staging directory on the device for command output
    pub remote_log_dir: String,

    /// Directory searched for core files from the device shell
    pub core_search_root: String,

    /// The same directory as addressed by the device CLI
    pub core_device_root: String,

    /// `find -name` pattern for core files
    pub core_name_pattern: String,

    /// Only core files whose name contains this string are decoded
    pub decode_name_filter: String,

    /// Decoder executable, invoked as `<decoder> -l <core>`
    pub decoder_command: String,

    pub transfer_timeout_secs: u64,
    pub connection_timeout_secs: u64,
    pub stabilization_interval_ms: u64,
    pub max_parallel_devices: usize,

    /// Write `harvest_summary.json` next to each invocation's artifacts
    pub write_summary: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            remote_log_dir: DEFAULT_REMOTE_LOG_DIR.to_string(),
            core_search_root: DEFAULT_CORE_SEARCH_ROOT.to_string(),
            core_device_root: DEFAULT_CORE_DEVICE_ROOT.to_string(),
            core_name_pattern: DEFAULT_CORE_NAME_PATTERN.to_string(),
            decode_name_filter: DEFAULT_DECODE_NAME_FILTER.to_string(),
            decoder_command: DEFAULT_DECODER_COMMAND.to_string(),
            transfer_timeout_secs: TRANSFER_TIMEOUT_SECS,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            stabilization_interval_ms: STABILIZATION_INTERVAL_MS,
            max_parallel_devices: MAX_PARALLEL_DEVICES,
            write_summary: true,
        }
    }
}

impl HarvestConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: HarvestConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;

        debug!("Loaded harvest configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved harvest configuration to {}", path.display());
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn stabilization_interval(&self) -> Duration {
        Duration::from_millis(self.stabilization_interval_ms)
    }
}

/// Load the configuration at `config_path`, or the defaults when no path is given
pub fn load_or_default(config_path: Option<&Path>) -> Result<HarvestConfig> {
    match config_path {
        Some(path) => HarvestConfig::from_yaml_file(path),
        None => {
            info!("No config path provided, using default harvest configuration");
            Ok(HarvestConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults_match_device_layout() {
        let config = HarvestConfig::default();
        assert_eq!(config.remote_log_dir, "harddisk:/firex_log_directory");
        assert_eq!(config.core_search_root, "/misc/disk1");
        assert_eq!(config.transfer_timeout(), Duration::from_secs(300));
        assert_eq!(config.stabilization_interval(), Duration::from_secs(5));
        assert!(config.write_summary);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
remote_log_dir: "disk0:/harvest"
stabilization_interval_ms: 10
"#;
        let config: HarvestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.remote_log_dir, "disk0:/harvest");
        assert_eq!(config.stabilization_interval(), Duration::from_millis(10));
        assert_eq!(config.core_name_pattern, "*core*");
        assert_eq!(config.max_parallel_devices, 4);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("harvest.yaml");

        let mut config = HarvestConfig::default();
        config.decoder_command = "/opt/decode".to_string();
        config.save_to_yaml_file(&path).unwrap();

        let loaded = load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "remote_log_dir: [unclosed").unwrap();

        let result = HarvestConfig::from_yaml_file(temp_file.path());
        assert!(result.unwrap_err().to_string().contains("Failed to parse YAML"));
    }

    #[test]
    fn test_load_without_path_gives_defaults() {
        assert_eq!(load_or_default(None).unwrap(), HarvestConfig::default());
    }
}
