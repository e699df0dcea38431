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

//! Connects to a Danfoss Eco thermostat and logs its temperatures.
//!
//! Usage: `danfoss-eco [CONFIG]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use danfoss_eco::bluetooth::client;
use danfoss_eco::config::Config;
use danfoss_eco::error::ConfigError;
use danfoss_eco::events::EventProcessor;
use danfoss_eco::storage::KnownDeviceStore;
use danfoss_eco::{Device, Reading};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;

    init_logging(&config.log.level);
    info!("Using config {:?}", config_path);

    let address: bluer::Address = config
        .device
        .address
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(config.device.address.clone()))?;

    // Create BlueZ session
    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    info!("Using Bluetooth adapter: {}", adapter.name());

    if !adapter.is_powered().await? {
        info!("Powering on Bluetooth adapter...");
        adapter.set_powered(true).await?;
    }

    let (event_tx, event_rx) = mpsc::channel(32);
    let (transport, link) = client::open(
        &adapter,
        address,
        event_tx,
        config.session.reconnect_delay(),
    )?;

    let mut store = KnownDeviceStore::new(&Config::data_dir())?;
    let name = config.device.display_name().to_string();
    let store_address = config.device.address.clone();
    let store_name = config.device.name.clone();
    let sink = move |reading: &Reading| {
        info!("Published state: {}", reading);
        if let Err(e) = store.record_reading(&store_address, store_name.as_deref(), reading) {
            error!("Failed to record reading: {}", e);
        }
    };

    let mut device = Device::new(name, transport, sink)
        .with_handshake_timeout(config.session.handshake_timeout());
    device.set_key(config.device.secret_key.clone());
    device.dump_config();
    device.setup().context("Failed to install secret key")?;

    let link_task = tokio::spawn(link.run());
    let processor = EventProcessor::new(device, event_rx, config.session.poll_interval());

    tokio::select! {
        result = processor.run() => {
            let device = result?;
            info!("Stopped, last reading: {}", device.current_reading());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    link_task.abort();
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,danfoss_eco={}", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
