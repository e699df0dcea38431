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

//! BLE GATT central built on BlueZ.
//!
//! [`BluerTransport`] is the synchronous half handed to the device: it looks
//! characteristics up in a shared cache and queues requests. [`BluerLink`]
//! is the async half: it owns the connection, executes queued requests and
//! reports every completion back as a [`TransportEvent`].

use anyhow::{anyhow, Result};
use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, Address, DeviceEvent, DeviceProperty};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::transport::{ConnectionId, GattStatus, Handle, Transport, TransportEvent};
use crate::error::TransportError;

/// How long to wait for BlueZ to resolve services after connecting.
const SERVICES_RESOLVE_TIMEOUT: Duration = Duration::from_secs(20);
const SERVICES_RESOLVE_POLL: Duration = Duration::from_millis(250);

/// Characteristics discovered on the current connection.
#[derive(Default)]
struct CharacteristicCache {
    handles: HashMap<(Uuid, Uuid), Handle>,
    characteristics: HashMap<Handle, Characteristic>,
}

impl CharacteristicCache {
    fn clear(&mut self) {
        self.handles.clear();
        self.characteristics.clear();
    }
}

#[derive(Debug)]
enum Request {
    Write(Handle, Vec<u8>),
    Read(Handle),
    Disconnect,
}

/// Request side of the BlueZ link.
pub struct BluerTransport {
    address: Address,
    cache: Arc<Mutex<CharacteristicCache>>,
    request_tx: mpsc::UnboundedSender<Request>,
}

impl BluerTransport {
    fn submit(&self, request: Request) -> Result<(), TransportError> {
        self.request_tx
            .send(request)
            .map_err(|_| TransportError::Closed)
    }
}

impl Transport for BluerTransport {
    fn discover_characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<Handle> {
        self.cache
            .lock()
            .handles
            .get(&(service, characteristic))
            .copied()
    }

    fn write_characteristic(&mut self, handle: Handle, data: &[u8]) -> Result<(), TransportError> {
        if !self.cache.lock().characteristics.contains_key(&handle) {
            return Err(TransportError::Rejected(format!("unknown handle {}", handle)));
        }
        self.submit(Request::Write(handle, data.to_vec()))
    }

    fn read_characteristic(&mut self, handle: Handle) -> Result<(), TransportError> {
        if !self.cache.lock().characteristics.contains_key(&handle) {
            return Err(TransportError::Rejected(format!("unknown handle {}", handle)));
        }
        self.submit(Request::Read(handle))
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.submit(Request::Disconnect)
    }

    fn address(&self) -> String {
        self.address.to_string()
    }
}

/// Connection side of the BlueZ link.
pub struct BluerLink {
    device: bluer::Device,
    cache: Arc<Mutex<CharacteristicCache>>,
    request_rx: mpsc::UnboundedReceiver<Request>,
    event_tx: mpsc::Sender<TransportEvent>,
    reconnect_delay: Duration,
    next_connection: u32,
}

/// Create both halves of a link to the thermostat at `address`.
pub fn open(
    adapter: &Adapter,
    address: Address,
    event_tx: mpsc::Sender<TransportEvent>,
    reconnect_delay: Duration,
) -> Result<(BluerTransport, BluerLink)> {
    let device = adapter.device(address)?;
    let cache = Arc::new(Mutex::new(CharacteristicCache::default()));
    let (request_tx, request_rx) = mpsc::unbounded_channel();

    let transport = BluerTransport {
        address,
        cache: cache.clone(),
        request_tx,
    };
    let link = BluerLink {
        device,
        cache,
        request_rx,
        event_tx,
        reconnect_delay,
        next_connection: 0,
    };
    Ok((transport, link))
}

impl BluerLink {
    /// Keep the thermostat connected until the transport half is dropped.
    pub async fn run(mut self) -> Result<()> {
        let address = self.device.address();
        info!("[{}] starting BLE link", address);

        loop {
            match self.connect().await {
                Ok(connection_id) => {
                    let closed = self.serve(connection_id).await;
                    self.cache.lock().clear();
                    self.emit(TransportEvent::Disconnected).await?;

                    match closed {
                        Ok(true) => {
                            info!("[{}] transport dropped, stopping BLE link", address);
                            let _ = self.device.disconnect().await;
                            return Ok(());
                        }
                        Ok(false) => {}
                        Err(e) => warn!("[{}] connection error: {}", address, e),
                    }
                }
                Err(e) => {
                    warn!("[{}] connect failed: {}", address, e);
                    self.cache.lock().clear();
                    self.emit(TransportEvent::Disconnected).await?;
                }
            }

            if self.event_tx.is_closed() {
                return Ok(());
            }
            debug!("[{}] reconnecting in {:?}", address, self.reconnect_delay);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Connect and populate the characteristic cache.
    async fn connect(&mut self) -> Result<ConnectionId> {
        let address = self.device.address();

        if !self.device.is_connected().await? {
            info!("[{}] connecting...", address);
            self.device.connect().await?;
        }

        self.next_connection = self.next_connection.wrapping_add(1);
        let connection_id = ConnectionId(self.next_connection);
        self.emit(TransportEvent::Connected { connection_id }).await?;

        let mut waited = Duration::ZERO;
        while !self.device.is_services_resolved().await? {
            if waited >= SERVICES_RESOLVE_TIMEOUT {
                let _ = self.device.disconnect().await;
                return Err(anyhow!("services not resolved after {:?}", waited));
            }
            tokio::time::sleep(SERVICES_RESOLVE_POLL).await;
            waited += SERVICES_RESOLVE_POLL;
        }

        let mut cache = CharacteristicCache::default();
        for service in self.device.services().await? {
            let service_uuid = service.uuid().await?;
            for characteristic in service.characteristics().await? {
                let uuid = characteristic.uuid().await?;
                let handle = Handle(characteristic.id());
                debug!(
                    "[{}] characteristic {} / {} at {}",
                    address, service_uuid, uuid, handle
                );
                cache.handles.insert((service_uuid, uuid), handle);
                cache.characteristics.insert(handle, characteristic);
            }
        }
        info!(
            "[{}] connected, {} characteristic(s) discovered",
            address,
            cache.characteristics.len()
        );
        *self.cache.lock() = cache;

        self.emit(TransportEvent::ServiceDiscovered).await?;
        Ok(connection_id)
    }

    /// Execute requests until the link drops.
    ///
    /// Returns `Ok(true)` when the transport half was dropped.
    async fn serve(&mut self, connection_id: ConnectionId) -> Result<bool> {
        let address = self.device.address();
        let mut device_events = Box::pin(self.device.events().await?);

        loop {
            tokio::select! {
                request = self.request_rx.recv() => {
                    let Some(request) = request else {
                        return Ok(true);
                    };
                    self.execute(request, connection_id).await?;
                }
                event = device_events.next() => {
                    match event {
                        Some(DeviceEvent::PropertyChanged(DeviceProperty::Connected(false))) | None => {
                            info!("[{}] link lost", address);
                            return Ok(false);
                        }
                        Some(other) => {
                            debug!("[{}] device event: {:?}", address, other);
                        }
                    }
                }
            }
        }
    }

    async fn execute(&self, request: Request, connection_id: ConnectionId) -> Result<()> {
        let address = self.device.address();
        match request {
            Request::Write(handle, data) => {
                let status = match self.characteristic(handle) {
                    Some(characteristic) => status_of(characteristic.write(&data).await),
                    None => GattStatus::Failed(format!("unknown handle {}", handle)),
                };
                debug!("[{}] write to {} completed: {:?}", address, handle, status);
                self.emit(TransportEvent::WriteCompleted { handle, status })
                    .await
            }
            Request::Read(handle) => {
                let (status, value) = match self.characteristic(handle) {
                    Some(characteristic) => match characteristic.read().await {
                        Ok(value) => (GattStatus::Success, value),
                        Err(e) => (GattStatus::Failed(e.to_string()), Vec::new()),
                    },
                    None => (
                        GattStatus::Failed(format!("unknown handle {}", handle)),
                        Vec::new(),
                    ),
                };
                debug!("[{}] read from {} completed: {:?}", address, handle, status);
                self.emit(TransportEvent::ReadCompleted {
                    handle,
                    status,
                    connection_id,
                    value,
                })
                .await
            }
            Request::Disconnect => {
                info!("[{}] disconnect requested", address);
                if let Err(e) = self.device.disconnect().await {
                    error!("[{}] disconnect failed: {}", address, e);
                }
                Ok(())
            }
        }
    }

    fn characteristic(&self, handle: Handle) -> Option<Characteristic> {
        self.cache.lock().characteristics.get(&handle).cloned()
    }

    async fn emit(&self, event: TransportEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| anyhow!("event receiver dropped"))
    }
}

fn status_of(result: bluer::Result<()>) -> GattStatus {
    match result {
        Ok(()) => GattStatus::Success,
        Err(e) => GattStatus::Failed(e.to_string()),
    }
}
