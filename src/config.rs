// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TOML configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::crypto::SecretKey;
use crate::error::ConfigError;

const APP_DIR: &str = "danfoss-eco";

/// Thermostat to connect to.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// BLE address, e.g. `00:04:2F:12:34:56`.
    pub address: String,
    /// Friendly name used in logs. Defaults to the address.
    #[serde(default)]
    pub name: Option<String>,
    /// 32 hex character XXTEA key.
    pub secret_key: SecretKey,
}

impl DeviceConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Re-read the status this often once paired.
    pub poll_interval_secs: Option<u64>,
    /// Abandon a handshake phase after this long. Unset waits forever.
    pub handshake_timeout_secs: Option<u64>,
    /// Wait before reconnecting after the link drops.
    pub reconnect_delay_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: Some(300),
            handshake_timeout_secs: None,
            reconnect_delay_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Directory for persistent state.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let address = &self.device.address;
        let octets: Vec<&str> = address.split(':').collect();
        let valid = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
        if !valid {
            return Err(ConfigError::InvalidAddress(address.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
[device]
address = "00:04:2F:12:34:56"
secret_key = "00112233445566778899aabbccddeeff"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.device.display_name(), "00:04:2F:12:34:56");
        assert_eq!(config.session.poll_interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.session.handshake_timeout(), None);
        assert_eq!(config.session.reconnect_delay(), Duration::from_secs(10));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
[device]
address = "00:04:2f:aa:bb:cc"
name = "Living room"
secret_key = "ffeeddccbbaa99887766554433221100"

[session]
poll_interval_secs = 0
handshake_timeout_secs = 30
reconnect_delay_secs = 5

[log]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.device.display_name(), "Living room");
        assert_eq!(config.device.secret_key.as_bytes()[0], 0xff);
        assert_eq!(config.session.poll_interval(), None);
        assert_eq!(config.session.handshake_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_bad_secret_key_rejected() {
        let result = Config::parse(
            r#"
[device]
address = "00:04:2F:12:34:56"
secret_key = "0011"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bad_address_rejected() {
        let result = Config::parse(
            r#"
[device]
address = "not-an-address"
secret_key = "00112233445566778899aabbccddeeff"
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL)?;

        let config = Config::load(&path)?;
        assert_eq!(config.device.address, "00:04:2F:12:34:56");

        assert!(matches!(
            Config::load(&temp_dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
        Ok(())
    }
}
