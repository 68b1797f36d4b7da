//! Configuration management.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use nextion_panel_hw::config::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_REGISTRY_CAPACITY, DEFAULT_RESPONSE_TIMEOUT_MS,
    DEFAULT_TRANSMIT_TIMEOUT_MS,
};
use nextion_panel_hw::{DriverConfig, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial link settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Command timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Component table settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Components to register
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

/// Serial port configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Transmit timeout in milliseconds
    #[serde(default = "default_transmit_ms")]
    pub transmit_ms: u64,

    /// Get reply timeout in milliseconds
    #[serde(default = "default_response_ms")]
    pub response_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            transmit_ms: default_transmit_ms(),
            response_ms: default_response_ms(),
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Maximum number of components
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Events buffered for the monitor
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// A display component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Object name (e.g., "t0" or "page1.b0")
    pub name: String,

    /// Page number
    #[serde(default)]
    pub page: u8,

    /// Component id
    pub id: u8,
}

// Default value functions
fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_transmit_ms() -> u64 {
    DEFAULT_TRANSMIT_TIMEOUT_MS
}

fn default_response_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_MS
}

fn default_capacity() -> usize {
    DEFAULT_REGISTRY_CAPACITY
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
        Ok(())
    }

    /// Driver settings derived from this configuration.
    pub fn driver(&self) -> DriverConfig {
        DriverConfig {
            transmit_timeout: Duration::from_millis(self.timeouts.transmit_ms),
            response_timeout: Duration::from_millis(self.timeouts.response_ms),
            registry_capacity: self.registry.capacity,
            event_capacity: self.registry.event_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud, 9600);
        assert!(config.components.is_empty());
        assert_eq!(config.driver(), DriverConfig::default());
    }

    #[test]
    fn test_parse_components() {
        let config: Config = toml::from_str(
            r#"
            [serial]
            port = "/dev/ttyAMA0"
            baud = 115200

            [timeouts]
            response_ms = 40

            [[components]]
            name = "t0"
            id = 1

            [[components]]
            name = "b0"
            page = 2
            id = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.baud, 115200);
        assert_eq!(config.timeouts.transmit_ms, 250);
        assert_eq!(
            config.driver().response_timeout,
            Duration::from_millis(40)
        );
        assert_eq!(config.components.len(), 2);
        assert_eq!(config.components[1].page, 2);
        assert_eq!(config.components[0].page, 0);
    }

    #[test]
    fn test_save_then_load() {
        let mut config = Config::default();
        config.components.push(ComponentConfig {
            name: "n0".to_string(),
            page: 1,
            id: 3,
        });
        let path = std::env::temp_dir().join(format!("nextionctl-{}.toml", std::process::id()));
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.components[0].name, "n0");
        assert_eq!(loaded.registry.capacity, 32);
    }
}
