//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{IngestError, Result};
use crate::frame::protocol::ChecksumMode;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub udp: UdpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which driver the binary runs
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IngestMode {
    SerialListener,
    SerialTalker,
    UdpListener,
    UdpTalker,
}

/// Ingestion configuration
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_mode")]
    pub mode: IngestMode,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default)]
    pub checksum: ChecksumMode,

    #[serde(default = "default_talker_interval_ms")]
    pub talker_interval_ms: u64,
}

/// UDP socket configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UdpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_udp_port")]
    pub port: u16,

    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    #[serde(default = "default_talker_interval_ms")]
    pub talker_interval_ms: u64,
}

/// Diagnostics logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for rolling diagnostic logs; stdout only when unset
    #[serde(default)]
    pub diagnostics_dir: Option<String>,

    #[serde(default = "default_status_interval_records")]
    pub status_interval_records: u64,
}

// Default value functions
fn default_mode() -> IngestMode { IngestMode::SerialListener }
fn default_log_dir() -> String { "./logs".to_string() }

fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_talker_interval_ms() -> u64 { 100 }

fn default_bind_address() -> String { "127.0.0.1".to_string() }
fn default_udp_port() -> u16 { 5005 }
fn default_max_datagram_size() -> usize { 4096 }

fn default_status_interval_records() -> u64 { 1000 }

impl Default for IngestConfig {
    fn default() -> Self {
        Self { mode: default_mode(), log_dir: default_log_dir() }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            checksum: ChecksumMode::default(),
            talker_interval_ms: default_talker_interval_ms(),
        }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_udp_port(),
            max_datagram_size: default_max_datagram_size(),
            talker_interval_ms: default_talker_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            diagnostics_dir: None,
            status_interval_records: default_status_interval_records(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_ingest::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.ingest.log_dir.is_empty() {
            return Err(invalid("log_dir cannot be empty"));
        }

        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        for (name, value) in [
            ("serial.talker_interval_ms", self.serial.talker_interval_ms),
            ("udp.talker_interval_ms", self.udp.talker_interval_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(invalid(format!("{} must be between 1 and 60000", name)));
            }
        }

        if self.udp.bind_address.is_empty() {
            return Err(invalid("udp bind_address cannot be empty"));
        }

        if self.udp.port == 0 {
            return Err(invalid("udp port must be greater than 0"));
        }

        // 65507 is the largest IPv4 UDP payload
        if self.udp.max_datagram_size == 0 || self.udp.max_datagram_size > 65507 {
            return Err(invalid("max_datagram_size must be between 1 and 65507"));
        }

        if self.logging.status_interval_records == 0 {
            return Err(invalid("status_interval_records must be greater than 0"));
        }

        if let Some(dir) = &self.logging.diagnostics_dir {
            if dir.is_empty() {
                return Err(invalid("diagnostics_dir cannot be empty when set"));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> IngestError {
    IngestError::Config(toml::de::Error::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config {
            ingest: IngestConfig::default(),
            serial: SerialConfig::default(),
            udp: UdpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingest.mode, IngestMode::SerialListener);
        assert_eq!(config.serial.checksum, ChecksumMode::IncludePreamble);
        assert_eq!(config.udp.port, 5005);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[ingest]
mode = "udp-listener"
log_dir = "/tmp/telemetry"

[serial]
checksum = "exclude-preamble"

[udp]
port = 6006
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.ingest.mode, IngestMode::UdpListener);
        assert_eq!(config.ingest.log_dir, "/tmp/telemetry");
        assert_eq!(config.serial.checksum, ChecksumMode::ExcludePreamble);
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.udp.port, 6006);
        assert!(config.logging.diagnostics_dir.is_none());
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingest.log_dir, "./logs");
    }

    #[test]
    fn test_load_rejects_unknown_checksum_mode() {
        let result: std::result::Result<SerialConfig, _> = toml::from_str("checksum = \"crc16\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/telemetry-ingest.toml");
        assert!(matches!(result, Err(IngestError::Io(_))));
    }

    #[test]
    fn test_empty_log_dir() {
        let mut config = create_valid_config();
        config.ingest.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_talker_interval_zero() {
        let mut config = create_valid_config();
        config.serial.talker_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.udp.talker_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_talker_interval_too_high() {
        let mut config = create_valid_config();
        config.udp.talker_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_udp_port_zero() {
        let mut config = create_valid_config();
        config.udp.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_datagram_size_bounds() {
        let mut config = create_valid_config();
        config.udp.max_datagram_size = 0;
        assert!(config.validate().is_err());

        config.udp.max_datagram_size = 65508;
        assert!(config.validate().is_err());

        config.udp.max_datagram_size = 65507;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_status_interval_zero() {
        let mut config = create_valid_config();
        config.logging.status_interval_records = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_diagnostics_dir() {
        let mut config = create_valid_config();
        config.logging.diagnostics_dir = Some(String::new());
        assert!(config.validate().is_err());

        config.logging.diagnostics_dir = Some("./diagnostics".to_string());
        assert!(config.validate().is_ok());
    }
}
