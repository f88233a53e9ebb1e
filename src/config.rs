//! Configuration for pada-io
//!
//! Loads configuration from a TOML file. Every key has a default, so a
//! partial file (or none at all) gives the reference deployment values.

use crate::core::types::DEFAULT_SLOTS_PER_LAYER;
use crate::error::Result;
use crate::protocol::constants::{
    INFO_WINDOW_MS, LOAD_DEADLINE_MS, LOAD_WINDOW_MS, PACING_MS, POLL_SLICE_MS,
};
use crate::transport::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyACM0` or `COM3`. Unset means no device
    /// selected; the CLI `--port` flag overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Baud rate (default: 115200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Protocol timing, all in milliseconds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Longest single blocking read (default: 200)
    #[serde(default = "default_poll_slice")]
    pub poll_slice_ms: u64,

    /// Quiet period that ends an `INFO` response (default: 1000)
    #[serde(default = "default_info_window")]
    pub info_window_ms: u64,

    /// Quiet period that ends a `GET` dump without `OK: GET` (default: 2000)
    #[serde(default = "default_load_window")]
    pub load_window_ms: u64,

    /// Absolute cap on a `GET` transaction (default: 10000)
    #[serde(default = "default_load_deadline")]
    pub load_deadline_ms: u64,

    /// Gap after each `SET` (default: 30)
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,
}

/// Layout assumed before the device reports one
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Controls per layer (default: 5)
    #[serde(default = "default_slots_per_layer")]
    pub slots_per_layer: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_poll_slice() -> u64 {
    POLL_SLICE_MS
}

fn default_info_window() -> u64 {
    INFO_WINDOW_MS
}

fn default_load_window() -> u64 {
    LOAD_WINDOW_MS
}

fn default_load_deadline() -> u64 {
    LOAD_DEADLINE_MS
}

fn default_pacing() -> u64 {
    PACING_MS
}

fn default_slots_per_layer() -> usize {
    DEFAULT_SLOTS_PER_LAYER
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            poll_slice_ms: default_poll_slice(),
            info_window_ms: default_info_window(),
            load_window_ms: default_load_window(),
            load_deadline_ms: default_load_deadline(),
            pacing_ms: default_pacing(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slots_per_layer: default_slots_per_layer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ProtocolConfig {
    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms)
    }

    pub fn info_window(&self) -> Duration {
        Duration::from_millis(self.info_window_ms)
    }

    pub fn load_window(&self) -> Duration {
        Duration::from_millis(self.load_window_ms)
    }

    pub fn load_deadline(&self) -> Duration {
        Duration::from_millis(self.load_deadline_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use pada_io::config::Config;
    ///
    /// let config = Config::load("pada.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.port, None);
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.protocol.poll_slice(), Duration::from_millis(200));
        assert_eq!(config.protocol.info_window(), Duration::from_millis(1000));
        assert_eq!(config.protocol.load_window(), Duration::from_millis(2000));
        assert_eq!(config.protocol.pacing(), Duration::from_millis(30));
        assert_eq!(config.layout.slots_per_layer, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"

[protocol]
pacing_ms = 50
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.protocol.pacing_ms, 50);
        assert_eq!(config.protocol.load_window_ms, 2000);
        assert_eq!(config.layout.slots_per_layer, 5);
    }

    #[test]
    fn test_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pada.toml");

        let mut config = Config::default();
        config.serial.port = Some("COM3".to_string());
        config.layout.slots_per_layer = 7;
        config.to_file(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[serial]"));
        assert!(contents.contains("[protocol]"));
        assert!(contents.contains("port = \"COM3\""));

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[serial\nport = 1").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(crate::error::Error::Config(_))
        ));
    }
}
