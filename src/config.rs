// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Everything bring-up needs that used to be a free-standing constant (window
// size, layer names, extension lists) lives here, so the whole sequence can
// be driven by an alternate Config. Missing files or fields fall back to
// defaults.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub instance: InstanceConfig,
    pub debug: DebugConfig,
    pub device: DeviceConfig,
    pub swapchain: SwapchainConfig,
}

/// Window settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "HelloTriangleApp".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Application identity reported to the driver
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub application_name: String,
    pub engine_name: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            application_name: "HelloTriangle".to_string(),
            engine_name: "Test".to_string(),
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Only honoured in debug builds
    pub validation: bool,
    pub validation_layers: Vec<String>,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation: true,
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            log_level: "info".to_string(),
        }
    }
}

/// Physical device requirements
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub extensions: Vec<String>,
    pub require_discrete_gpu: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["VK_KHR_swapchain".to_string()],
            require_discrete_gpu: false,
        }
    }
}

/// Swapchain settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapchainConfig {
    pub present_mode: String,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            present_mode: "mailbox".to_string(),
        }
    }
}

/// Where the active configuration came from. Loading happens before the
/// logger exists, so this is reported once logging is up.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    /// The file exists but could not be used; defaults are active
    Invalid(anyhow::Error),
}

impl ConfigSource {
    pub fn level(&self) -> log::Level {
        match self {
            ConfigSource::File(_) | ConfigSource::Missing(_) => log::Level::Info,
            ConfigSource::Invalid(_) => log::Level::Warn,
        }
    }

    pub fn report(&self) {
        let level = self.level();
        match self {
            ConfigSource::File(path) => log::log!(level, "Loaded configuration from {:?}", path),
            ConfigSource::Missing(path) => {
                log::log!(level, "Config file not found at {:?}, using defaults", path)
            }
            ConfigSource::Invalid(e) => {
                log::log!(level, "Failed to load config: {:#}. Using defaults.", e)
            }
        }
    }
}

impl Config {
    /// Load config.toml from the working directory, falling back to defaults
    pub fn load() -> (Self, ConfigSource) {
        Self::load_or_default("config.toml")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, ConfigSource) {
        let path = path.as_ref();
        match Self::load_from_path(path) {
            Ok(Some(config)) => (config, ConfigSource::File(path.to_path_buf())),
            Ok(None) => (Config::default(), ConfigSource::Missing(path.to_path_buf())),
            Err(e) => (Config::default(), ConfigSource::Invalid(e)),
        }
    }

    /// Load configuration from a specific path. `None` if there is no file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(Some(config))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validation is compiled out of release builds regardless of the file
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation
    }

    /// Log level for env_logger, `None` if the name is not a level.
    /// RUST_LOG directives still apply on top.
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.debug.log_level.parse().ok()
    }

    /// Get the preferred present mode as Vulkan enum
    pub fn preferred_present_mode(&self) -> vk::PresentModeKHR {
        match self.swapchain.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to MAILBOX",
                    self.swapchain.present_mode
                );
                vk::PresentModeKHR::MAILBOX
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hello_triangle() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(!config.window.resizable);
        assert_eq!(config.debug.validation_layers, ["VK_LAYER_KHRONOS_validation"]);
        assert_eq!(config.device.extensions, ["VK_KHR_swapchain"]);
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.log_level(), Some(log::LevelFilter::Info));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            width = 1024

            [device]
            require_discrete_gpu = true

            [swapchain]
            present_mode = "FIFO"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "HelloTriangleApp");
        assert!(config.device.require_discrete_gpu);
        assert_eq!(config.device.extensions, ["VK_KHR_swapchain"]);
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn unknown_values_fall_back() {
        let config = Config::parse(
            r#"
            [debug]
            log_level = "chatty"

            [swapchain]
            present_mode = "triple"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level(), None);
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        assert!(Config::load_from_path("does/not/exist.toml").unwrap().is_none());

        let (config, source) = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.window.title, "HelloTriangleApp");
        assert!(matches!(source, ConfigSource::Missing(_)));
        assert_eq!(source.level(), log::Level::Info);
    }

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn invalid_file_falls_back_with_warning() {
        let path = write_temp("invalid-config.toml", "[window]\nwidth = \"wide\"");
        let (config, source) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(source.level(), log::Level::Warn);
        match source {
            ConfigSource::Invalid(e) => assert!(format!("{:#}", e).contains("invalid-config.toml")),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn valid_file_is_used() {
        let path = write_temp("valid-config.toml", "[window]\nwidth = 1280");
        let (config, source) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.width, 1280);
        assert!(matches!(source, ConfigSource::File(ref p) if *p == path));
    }

    #[test]
    fn validation_follows_build_profile() {
        let mut config = Config::default();
        assert_eq!(config.validation_enabled(), cfg!(debug_assertions));
        config.debug.validation = false;
        assert!(!config.validation_enabled());
    }
}
