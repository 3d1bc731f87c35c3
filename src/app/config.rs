//! Configuration Management

use crate::control::autostart::DEFAULT_LABEL;
use crate::filter::state::DEFAULT_THRESHOLD_MS;
use crate::notify::DEFAULT_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub struct Config {
    /// Filter settings
    #[serde(default)]
    pub filter: FilterConfig,
    /// OS hook settings
    #[serde(default)]
    pub hook: HookConfig,
    /// Notification settings
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Login item settings
    #[serde(default)]
    pub autostart: AutostartConfig,
}

/// Filter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Threshold used when none is given on the command line (ms)
    pub default_threshold_ms: u64,
}

/// Hook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// How long to wait for the OS to confirm the hook (ms)
    pub install_timeout_ms: u64,
}

/// Notification configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Per-subscriber queue length
    pub queue_capacity: usize,
}

/// Autostart configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutostartConfig {
    /// Login item label (LaunchAgent label / desktop entry name)
    pub label: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            default_threshold_ms: DEFAULT_THRESHOLD_MS,
        }
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            install_timeout_ms: 2000,
        }
    }
}

impl HookConfig {
    pub fn install_timeout(&self) -> Duration {
        Duration::from_millis(self.install_timeout_ms)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Default for AutostartConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hook.install_timeout_ms == 0 {
            return Err(crate::Error::Config("install_timeout_ms must be > 0".to_string()));
        }
        if self.notify.queue_capacity == 0 {
            return Err(crate::Error::Config("queue_capacity must be > 0".to_string()));
        }
        let label = self.autostart.label.trim();
        if label.is_empty() {
            return Err(crate::Error::Config("autostart label must not be empty".to_string()));
        }
        if label.contains('/') {
            return Err(crate::Error::Config(format!(
                "autostart label must not contain '/', got {}", label
            )));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        self.validate()?;
        let content = self.to_toml()?;

        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".click_debounce").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.filter.default_threshold_ms, 100);
        assert_eq!(config.hook.install_timeout_ms, 2000);
        assert_eq!(config.notify.queue_capacity, 64);
        assert_eq!(config.autostart.label, "com.click-debounce.agent");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[filter]"));
        assert!(toml.contains("[hook]"));
        assert!(toml.contains("[notify]"));
        assert!(toml.contains("[autostart]"));
        assert!(toml.contains("default_threshold_ms = 100"));
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains("config.toml"));
        assert!(path.to_string_lossy().contains(".click_debounce"));
    }

    #[test]
    fn test_install_timeout_duration() {
        let hook = HookConfig { install_timeout_ms: 1500 };
        assert_eq!(hook.install_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_config_roundtrip_serialization() {
        let original = Config::default();
        let toml_str = original.to_toml().unwrap();
        let deserialized: Config = toml::from_str(&toml_str).expect("Failed to deserialize");
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut original = Config::default();
        original.filter.default_threshold_ms = 65;
        original.hook.install_timeout_ms = 500;
        original.notify.queue_capacity = 8;

        original.save(&config_path).expect("Failed to save config");
        assert!(config_path.exists());

        let loaded = Config::load(&config_path).expect("Failed to load config");
        assert_eq!(loaded.filter.default_threshold_ms, 65);
        assert_eq!(loaded.hook.install_timeout_ms, 500);
        assert_eq!(loaded.notify.queue_capacity, 8);
    }

    #[test]
    fn test_config_save_creates_parent_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let nested_path = temp_dir.path().join("nested").join("path").join("config.toml");

        let config = Config::default();
        config.save(&nested_path).expect("Failed to save config");

        assert!(nested_path.exists());
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.notify.queue_capacity = 0;
        assert!(config.save(&config_path).is_err());
        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result = Config::load(&temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_invalid_toml_parsing() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        std::fs::write(&config_path, "this is not valid toml {{{}}}").unwrap();
        assert!(matches!(Config::load(&config_path), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_install_timeout() {
        let mut config = Config::default();
        config.hook.install_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_queue_capacity() {
        let mut config = Config::default();
        config.notify.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_label() {
        let mut config = Config::default();
        config.autostart.label = "  ".to_string();
        assert!(config.validate().is_err());
        config.autostart.label = "a/b".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_threshold_is_valid() {
        let mut config = Config::default();
        config.filter.default_threshold_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_values() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("bad_config.toml");
        std::fs::write(&config_path, r#"
[hook]
install_timeout_ms = 0
"#).expect("Failed to write config");
        assert!(Config::load(&config_path).is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[filter]
default_threshold_ms = 40
"#;
        let config: Config = toml::from_str(partial).expect("Partial config should deserialize");
        assert_eq!(config.filter.default_threshold_ms, 40);
        assert_eq!(config.hook, HookConfig::default());
        assert_eq!(config.notify, NotifyConfig::default());
        assert_eq!(config.autostart, AutostartConfig::default());
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = toml::from_str("").expect("Empty config should deserialize");
        assert_eq!(config, Config::default());
    }
}
