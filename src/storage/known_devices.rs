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

//! Registry of thermostats that completed the PIN handshake.
//!
//! Keeps the last decoded reading per device so it survives restarts.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::codec::Reading;

/// A thermostat seen at least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownDevice {
    /// BLE address.
    pub address: String,
    /// Optional friendly name.
    pub name: Option<String>,
    /// ISO 8601 timestamp of the first successful read.
    pub first_paired: String,
    /// ISO 8601 timestamp of the latest successful read.
    pub last_seen: String,
    /// Latest decoded temperatures.
    pub last_reading: Option<Reading>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnownDevicesFile {
    version: u32,
    devices: Vec<KnownDevice>,
}

pub struct KnownDeviceStore {
    file_path: PathBuf,
    devices: Vec<KnownDevice>,
}

impl KnownDeviceStore {
    /// Open the store in `data_dir`, creating the directory if needed.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let file_path = data_dir.join("known_devices.json");

        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let devices = Self::load(&file_path)?;
        info!(
            "Loaded {} known thermostat(s) from {:?}",
            devices.len(),
            file_path
        );

        Ok(Self { file_path, devices })
    }

    pub fn get(&self, address: &str) -> Option<&KnownDevice> {
        self.devices.iter().find(|d| d.address == address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Record a successful reading. Unknown readings are not stored.
    pub fn record_reading(
        &mut self,
        address: &str,
        name: Option<&str>,
        reading: &Reading,
    ) -> Result<()> {
        if reading.is_unknown() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();

        if let Some(device) = self.devices.iter_mut().find(|d| d.address == address) {
            device.name = name.map(str::to_string).or(device.name.take());
            device.last_seen = now;
            device.last_reading = Some(*reading);
            debug!("Updated known thermostat: {}", address);
        } else {
            self.devices.push(KnownDevice {
                address: address.to_string(),
                name: name.map(str::to_string),
                first_paired: now.clone(),
                last_seen: now,
                last_reading: Some(*reading),
            });
            info!("Added new known thermostat: {}", address);
        }

        self.save()
    }

    fn load(path: &Path) -> Result<Vec<KnownDevice>> {
        if !path.exists() {
            debug!("Known devices file doesn't exist, starting with empty list");
            return Ok(Vec::new());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let file: KnownDevicesFile = serde_json::from_str(&content)
            .with_context(|| "Failed to parse known_devices.json")?;

        Ok(file.devices)
    }

    fn save(&self) -> Result<()> {
        let file = KnownDevicesFile {
            version: 1,
            devices: self.devices.clone(),
        };

        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, content)
            .with_context(|| format!("Failed to write {:?}", self.file_path))?;

        debug!("Saved {} known thermostat(s)", self.devices.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ADDR: &str = "00:04:2F:12:34:56";

    fn reading(target: f32, current: f32) -> Reading {
        Reading {
            current_temperature: current,
            target_temperature: target,
        }
    }

    #[test]
    fn test_new_store_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = KnownDeviceStore::new(temp_dir.path())?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_record_reading() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut store = KnownDeviceStore::new(temp_dir.path())?;

        store.record_reading(ADDR, Some("Bedroom"), &reading(21.0, 19.5))?;

        let device = store.get(ADDR).unwrap();
        assert_eq!(device.name.as_deref(), Some("Bedroom"));
        assert_eq!(device.last_reading, Some(reading(21.0, 19.5)));
        assert!(store.get("00:00:00:00:00:00").is_none());
        Ok(())
    }

    #[test]
    fn test_update_existing_device() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut store = KnownDeviceStore::new(temp_dir.path())?;

        store.record_reading(ADDR, Some("Bedroom"), &reading(21.0, 19.5))?;
        let first_paired = store.get(ADDR).unwrap().first_paired.clone();
        store.record_reading(ADDR, None, &reading(17.0, 18.0))?;

        assert_eq!(store.len(), 1);
        let device = store.get(ADDR).unwrap();
        assert_eq!(device.name.as_deref(), Some("Bedroom"));
        assert_eq!(device.first_paired, first_paired);
        assert_eq!(device.last_reading, Some(reading(17.0, 18.0)));
        Ok(())
    }

    #[test]
    fn test_unknown_reading_not_recorded() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut store = KnownDeviceStore::new(temp_dir.path())?;

        store.record_reading(ADDR, None, &Reading::UNKNOWN)?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_persistence() -> Result<()> {
        let temp_dir = TempDir::new()?;

        {
            let mut store = KnownDeviceStore::new(temp_dir.path())?;
            store.record_reading(ADDR, Some("Bedroom"), &reading(21.0, 19.5))?;
        }

        let store = KnownDeviceStore::new(temp_dir.path())?;
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(ADDR).unwrap().last_reading,
            Some(reading(21.0, 19.5))
        );
        Ok(())
    }
}
