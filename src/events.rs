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

//! Event processing and dispatch into the device.

use anyhow::{bail, Result};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::bluetooth::TransportEvent;
use crate::bluetooth::Transport;
use crate::device::{ClimateSink, Device};

/// How often stalled handshakes are checked.
const DEADLINE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Pumps transport events and timer ticks into one [`Device`].
pub struct EventProcessor<T, S> {
    device: Device<T, S>,
    events: mpsc::Receiver<TransportEvent>,
    poll_interval: Option<Duration>,
}

impl<T: Transport, S: ClimateSink> EventProcessor<T, S> {
    pub fn new(
        device: Device<T, S>,
        events: mpsc::Receiver<TransportEvent>,
        poll_interval: Option<Duration>,
    ) -> Self {
        Self {
            device,
            events,
            poll_interval,
        }
    }

    /// Run until the transport closes its event channel.
    ///
    /// Returns the device so its final state can be inspected.
    pub async fn run(mut self) -> Result<Device<T, S>> {
        if self.device.is_failed() {
            bail!("device '{}' failed during setup", self.device.name());
        }

        // With polling disabled the tick still fires but does nothing.
        let mut poll = interval(self.poll_interval.unwrap_or(Duration::from_secs(3600)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        let mut deadline = interval(DEADLINE_CHECK_INTERVAL);
        deadline.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        info!("Transport closed, stopping event processing");
                        return Ok(self.device);
                    };
                    self.process_event(event);
                }
                _ = poll.tick() => {
                    if self.poll_interval.is_some() {
                        debug!("Refreshing '{}'", self.device.name());
                        self.device.request_refresh();
                    }
                }
                _ = deadline.tick() => {
                    self.device.check_deadline(Instant::now());
                }
            }
        }
    }

    /// Process a single event.
    pub fn process_event(&mut self, event: TransportEvent) {
        debug!("Processing transport event: {}", describe(&event));
        self.device.on_transport_event(event);
    }
}

fn describe(event: &TransportEvent) -> String {
    match event {
        TransportEvent::Connected { connection_id } => format!("connected {:?}", connection_id),
        TransportEvent::Disconnected => "disconnected".to_string(),
        TransportEvent::ServiceDiscovered => "service discovered".to_string(),
        TransportEvent::WriteCompleted { handle, status } => {
            format!("write completed {} {:?}", handle, status)
        }
        TransportEvent::ReadCompleted {
            handle,
            status,
            value,
            ..
        } => format!(
            "read completed {} {:?} {}",
            handle,
            status,
            hex::encode(value)
        ),
        TransportEvent::Notified { handle, value, .. } => {
            format!("notified {} {}", handle, hex::encode(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::ble_constants::{PIN_UUID, SETTINGS_SERVICE_UUID, STATUS_UUID};
    use crate::bluetooth::session::Phase;
    use crate::bluetooth::transport::mock::MockTransport;
    use crate::bluetooth::{ConnectionId, GattStatus, Handle};
    use crate::codec::{PayloadCodec, Reading};
    use crate::crypto::SecretKey;

    const KEY: &str = "00112233445566778899aabbccddeeff";

    fn noop(_: &Reading) {}

    #[tokio::test]
    async fn test_processes_until_channel_closed() -> Result<()> {
        let transport = MockTransport::with(&[
            (SETTINGS_SERVICE_UUID, PIN_UUID, Handle(1)),
            (SETTINGS_SERVICE_UUID, STATUS_UUID, Handle(2)),
        ]);
        let mut device = Device::new("office", transport, noop as fn(&Reading));
        device.set_secret_key(KEY)?;
        device.setup()?;

        let codec = PayloadCodec::new(&SecretKey::from_hex(KEY)?)?;
        let value = codec.encode(&[42, 40, 0, 0, 0, 0, 0, 0])?;

        let (tx, rx) = mpsc::channel(8);
        let connection_id = ConnectionId(1);
        for event in [
            TransportEvent::Connected { connection_id },
            TransportEvent::ServiceDiscovered,
            TransportEvent::WriteCompleted {
                handle: Handle(1),
                status: GattStatus::Success,
            },
            TransportEvent::ReadCompleted {
                handle: Handle(2),
                status: GattStatus::Success,
                connection_id,
                value,
            },
        ] {
            tx.send(event).await?;
        }
        drop(tx);

        let device = EventProcessor::new(device, rx, None).run().await?;
        assert_eq!(device.phase(), Phase::Ready);
        assert_eq!(device.current_reading().target_temperature, 21.0);
        assert_eq!(device.current_reading().current_temperature, 20.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_device_is_rejected() {
        let mut device = Device::new("office", MockTransport::default(), noop as fn(&Reading));
        assert!(device.setup().is_err());

        let (_tx, rx) = mpsc::channel(1);
        assert!(EventProcessor::new(device, rx, None).run().await.is_err());
    }
}
