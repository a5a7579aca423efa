//! TOML configuration for the provisioning tool.
//!
//! Reads and writes [`ProvConfig`] at the platform-appropriate path:
//! - Windows:  `%APPDATA%\RMakerProv\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/rmaker-prov/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/RMakerProv/config.toml`
//!
//! ```toml
//! log_level = "info"
//!
//! [cloud]
//! base_url = "https://api.rainmaker.espressif.com/v1/"
//! id_token = "eyJraWQiOi..."
//! user_id = "a1b2c3"
//!
//! [transport]
//! http_timeout_secs = 5
//! serial_retries = 3
//!
//! [provisioning]
//! poll_interval_secs = 5
//! max_retries = 1
//! ```
//!
//! Every field is optional; `#[serde(default = "...")]` fills in the rest.
//! Command-line flags override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::cloud::{CloudSettings, DEFAULT_BASE_URL};
use crate::infrastructure::transport::TransportSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Everything persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

/// Cloud API endpoint and login.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Id token from a previous login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// User id for the legacy `cloud_user_assoc` binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default = "default_cloud_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("base_url", &self.base_url)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Per-link timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_serial_timeout")]
    pub serial_timeout_secs: u64,
    #[serde(default = "default_serial_retries")]
    pub serial_retries: u32,
    #[serde(default = "default_ble_timeout")]
    pub ble_timeout_secs: u64,
}

/// Wi-Fi provisioning behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Extra credential attempts after a failed connection.
    #[serde(default)]
    pub max_retries: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_cloud_timeout() -> u64 {
    10
}
fn default_http_timeout() -> u64 {
    5
}
fn default_serial_timeout() -> u64 {
    3
}
fn default_serial_retries() -> u32 {
    3
}
fn default_ble_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    5
}

impl Default for ProvConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            cloud: CloudConfig::default(),
            transport: TransportConfig::default(),
            provisioning: ProvisioningConfig::default(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            id_token: None,
            user_id: None,
            timeout_secs: default_cloud_timeout(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            serial_timeout_secs: default_serial_timeout(),
            serial_retries: default_serial_retries(),
            ble_timeout_secs: default_ble_timeout(),
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_retries: 0,
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl ProvConfig {
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            http_timeout: Duration::from_secs(self.transport.http_timeout_secs),
            serial_timeout: Duration::from_secs(self.transport.serial_timeout_secs),
            serial_retries: self.transport.serial_retries,
            ble_timeout: Duration::from_secs(self.transport.ble_timeout_secs),
        }
    }

    pub fn cloud_settings(&self) -> CloudSettings {
        CloudSettings {
            base_url: self.cloud.base_url.clone(),
            id_token: self.cloud.id_token.clone(),
            user_id: self.cloud.user_id.clone(),
            timeout: Duration::from_secs(self.cloud.timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.provisioning.poll_interval_secs)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// # Errors
///
/// As [`config_dir`].
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform path.
///
/// # Errors
///
/// As [`load_config_from`].
pub fn load_config() -> Result<ProvConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config at `path`, or the defaults when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ProvConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProvConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to the platform path.
///
/// # Errors
///
/// As [`save_config_to`].
pub fn save_config(config: &ProvConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &ProvConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RMakerProv"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rmaker-prov"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RMakerProv")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("rmaker_prov_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_defaults_match_documented_timeouts() {
        // Arrange / Act
        let cfg = ProvConfig::default();

        // Assert
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.transport.http_timeout_secs, 5);
        assert_eq!(cfg.transport.serial_timeout_secs, 3);
        assert_eq!(cfg.transport.serial_retries, 3);
        assert_eq!(cfg.transport.ble_timeout_secs, 30);
        assert_eq!(cfg.cloud.timeout_secs, 10);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert!(cfg.cloud.id_token.is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg: ProvConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, ProvConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[transport]
serial_retries = 7

[provisioning]
max_retries = 2
"#;

        // Act
        let cfg: ProvConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.transport.serial_retries, 7);
        assert_eq!(cfg.transport.http_timeout_secs, 5);
        assert_eq!(cfg.provisioning.max_retries, 2);
        assert_eq!(cfg.provisioning.poll_interval_secs, 5);
    }

    #[test]
    fn test_absent_optional_fields_are_not_written() {
        let toml_str = toml::to_string_pretty(&ProvConfig::default()).expect("serialize");
        assert!(!toml_str.contains("id_token"));
        assert!(!toml_str.contains("user_id"));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");
        assert_eq!(load_config_from(&path).unwrap(), ProvConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips_via_temp_dir() {
        // Arrange
        let path = temp_path();
        let mut cfg = ProvConfig::default();
        cfg.cloud.id_token = Some("token".into());
        cfg.cloud.user_id = Some("user-1".into());
        cfg.log_level = "debug".into();

        // Act
        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_settings_conversions() {
        let mut cfg = ProvConfig::default();
        cfg.transport.http_timeout_secs = 9;
        cfg.cloud.id_token = Some("t".into());

        assert_eq!(cfg.transport_settings().http_timeout, Duration::from_secs(9));
        assert_eq!(cfg.cloud_settings().id_token.as_deref(), Some("t"));
        assert_eq!(cfg.cloud_settings().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_debug_redacts_id_token() {
        let mut cfg = ProvConfig::default();
        cfg.cloud.id_token = Some("secret-token".into());
        assert!(!format!("{cfg:?}").contains("secret-token"));
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
