//! netrepair configuration
//!
//! Config file: `<config dir>/netrepair/config.toml`
//! (`%APPDATA%\netrepair\config.toml` on Windows). Every field has a
//! default, so a missing file is the same as an empty one.

use crate::error::{RepairError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name fragments that mark an adapter as wired Ethernet.
/// `本地连接` / `Local Area Connection` are the default names older Windows
/// releases give wired connections.
pub const DEFAULT_ETHERNET_TOKENS: &[&str] = &["eth", "以太网", "本地连接", "local area connection"];

/// Timing knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause between lease release and renewal
    #[serde(default = "default_renegotiation_pause_secs")]
    pub renegotiation_pause_secs: u64,

    /// Delay between finalization and process exit
    #[serde(default = "default_exit_delay_secs")]
    pub exit_delay_secs: u64,

    /// Presenter queue drain interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay before this instance exits after an elevated relaunch
    #[serde(default = "default_relaunch_grace_ms")]
    pub relaunch_grace_ms: u64,
}

fn default_renegotiation_pause_secs() -> u64 {
    5
}

fn default_exit_delay_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_relaunch_grace_ms() -> u64 {
    1000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            renegotiation_pause_secs: default_renegotiation_pause_secs(),
            exit_delay_secs: default_exit_delay_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            relaunch_grace_ms: default_relaunch_grace_ms(),
        }
    }
}

impl TimingConfig {
    pub fn renegotiation_pause(&self) -> Duration {
        Duration::from_secs(self.renegotiation_pause_secs)
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_secs(self.exit_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would make tokio's interval panic
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn relaunch_grace(&self) -> Duration {
        Duration::from_millis(self.relaunch_grace_ms)
    }
}

/// Adapter selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_ethernet_tokens")]
    pub ethernet_tokens: Vec<String>,
}

fn default_ethernet_tokens() -> Vec<String> {
    DEFAULT_ETHERNET_TOKENS.iter().map(|t| t.to_string()).collect()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            ethernet_tokens: default_ethernet_tokens(),
        }
    }
}

/// Color display mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    #[default]
    Auto,
    Always,
    Never,
}

/// Emoji display mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmojiMode {
    /// Emojis when the terminal looks Unicode capable
    #[default]
    Auto,
    Enabled,
    Disabled,
}

/// Presenter appearance. Only the presenter reads this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub color: ColorMode,

    #[serde(default)]
    pub emojis: EmojiMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairConfig {
    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub adapters: AdapterConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl RepairConfig {
    /// Default user config path
    pub fn user_config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| RepairError::Config("Cannot determine config directory".into()))?;
        Ok(dir.join("netrepair").join("config.toml"))
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config
    /// 3. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            RepairError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
            .map_err(|e| RepairError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Write this configuration as pretty TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RepairError::Config(format!("Failed to serialize configuration: {}", e)))?;

        fs::write(path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = RepairConfig::parse("").unwrap();
        assert_eq!(config, RepairConfig::default());
        assert_eq!(config.timing.renegotiation_pause(), Duration::from_secs(5));
        assert_eq!(config.timing.exit_delay(), Duration::from_secs(60));
        assert_eq!(config.timing.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_override() {
        let config = RepairConfig::parse(
            r#"
[timing]
exit_delay_secs = 5

[output]
color = "never"
"#,
        )
        .unwrap();

        assert_eq!(config.timing.exit_delay_secs, 5);
        assert_eq!(config.timing.renegotiation_pause_secs, 5);
        assert_eq!(config.output.color, ColorMode::Never);
        assert_eq!(config.output.emojis, EmojiMode::Auto);
        assert_eq!(config.adapters.ethernet_tokens.len(), DEFAULT_ETHERNET_TOKENS.len());
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = RepairConfig::parse("[timing]\npoll_interval_ms = 0\n").unwrap();
        assert_eq!(config.timing.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(RepairConfig::parse("[output]\ncolor = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_save_and_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = RepairConfig::default();
        config.timing.exit_delay_secs = 10;
        config.save(&path).unwrap();

        let loaded = RepairConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_path_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RepairConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, RepairError::Config(_)));
    }
}
