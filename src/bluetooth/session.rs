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

//! Pairing handshake state machine.
//!
//! One [`Session`] tracks one connection: service discovery triggers the PIN
//! write, the PIN acknowledgement triggers the status read, and the read
//! completion hands the raw value back to the caller for decoding. Phases
//! only advance on confirmed completion events.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::ble_constants::{PIN_CODE, PIN_UUID, SETTINGS_SERVICE_UUID, STATUS_UUID};
use super::transport::{ConnectionId, GattStatus, Handle, Transport, TransportEvent};

/// Stage of the handshake for the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingPinAck,
    AwaitingStatusRead,
    Ready,
}

/// Characteristic handles discovered for the current connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Handles {
    pin: Option<Handle>,
    status: Option<Handle>,
}

/// What the owner of the session has to do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do.
    None,
    /// Required characteristic missing; not a supported thermostat.
    Unsupported,
    /// A request was rejected or completed with an error.
    Fault,
    /// Status value ready for decoding.
    StatusValue(Vec<u8>),
    /// Connection gone; published state must be cleared.
    Reset,
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    handles: Handles,
    connection_id: Option<ConnectionId>,
    phase_entered: Instant,
    /// The outstanding status read was issued from Ready.
    refreshing: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            handles: Handles::default(),
            connection_id: None,
            phase_entered: Instant::now(),
            refreshing: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn pin_handle(&self) -> Option<Handle> {
        self.handles.pin
    }

    pub fn status_handle(&self) -> Option<Handle> {
        self.handles.status
    }

    /// Advance the handshake for one transport event.
    pub fn handle_event<T: Transport>(
        &mut self,
        event: TransportEvent,
        transport: &mut T,
        now: Instant,
    ) -> Outcome {
        match event {
            TransportEvent::Connected { connection_id } => {
                debug!("[{}] connected, id {:?}", transport.address(), connection_id);
                self.reset(now);
                self.connection_id = Some(connection_id);
                Outcome::None
            }
            TransportEvent::Disconnected => {
                info!("[{}] disconnected in phase {:?}", transport.address(), self.phase);
                self.reset(now);
                self.connection_id = None;
                Outcome::Reset
            }
            TransportEvent::ServiceDiscovered => self.on_service_discovered(transport, now),
            TransportEvent::WriteCompleted { handle, status } => {
                self.on_write_completed(handle, status, transport, now)
            }
            TransportEvent::ReadCompleted {
                handle,
                status,
                connection_id,
                value,
            } => self.on_read_completed(handle, status, connection_id, value, transport, now),
            TransportEvent::Notified {
                handle,
                connection_id,
                value,
            } => {
                if matches!(self.phase, Phase::Ready | Phase::AwaitingStatusRead)
                    && self.connection_id == Some(connection_id)
                    && self.handles.status == Some(handle)
                {
                    Outcome::StatusValue(value)
                } else {
                    debug!("Ignoring notification on handle {}", handle);
                    Outcome::None
                }
            }
        }
    }

    fn on_service_discovered<T: Transport>(&mut self, transport: &mut T, now: Instant) -> Outcome {
        if self.phase != Phase::Idle {
            debug!("Ignoring service discovery in phase {:?}", self.phase);
            return Outcome::None;
        }

        let Some(pin) = transport.discover_characteristic(SETTINGS_SERVICE_UUID, PIN_UUID) else {
            warn!(
                "[{}] No settings service found at device, not a Danfoss Eco?",
                transport.address()
            );
            return Outcome::Unsupported;
        };

        self.handles.pin = Some(pin);
        self.enter(Phase::AwaitingPinAck, now);

        match transport.write_characteristic(pin, &PIN_CODE) {
            Ok(()) => {
                info!("[{}] PIN write submitted to handle {}", transport.address(), pin);
                Outcome::None
            }
            Err(e) => {
                warn!("[{}] PIN write failed: {}", transport.address(), e);
                Outcome::Fault
            }
        }
    }

    fn on_write_completed<T: Transport>(
        &mut self,
        handle: Handle,
        status: GattStatus,
        transport: &mut T,
        now: Instant,
    ) -> Outcome {
        if self.phase != Phase::AwaitingPinAck || self.handles.pin != Some(handle) {
            debug!("Ignoring write completion on handle {}", handle);
            return Outcome::None;
        }

        if let GattStatus::Failed(reason) = status {
            warn!("[{}] PIN rejected: {}", transport.address(), reason);
            return Outcome::Fault;
        }

        let Some(status_handle) = transport.discover_characteristic(SETTINGS_SERVICE_UUID, STATUS_UUID)
        else {
            warn!(
                "[{}] No temperature characteristic found at device, not a Danfoss Eco?",
                transport.address()
            );
            self.reset(now);
            return Outcome::Unsupported;
        };

        self.handles.status = Some(status_handle);
        self.enter(Phase::AwaitingStatusRead, now);
        self.submit_status_read(status_handle, transport)
    }

    fn on_read_completed<T: Transport>(
        &mut self,
        handle: Handle,
        status: GattStatus,
        connection_id: ConnectionId,
        value: Vec<u8>,
        transport: &mut T,
        now: Instant,
    ) -> Outcome {
        if self.connection_id != Some(connection_id) {
            debug!("Ignoring read completion for stale connection {:?}", connection_id);
            return Outcome::None;
        }
        if self.phase != Phase::AwaitingStatusRead || self.handles.status != Some(handle) {
            debug!("Ignoring read completion on handle {}", handle);
            return Outcome::None;
        }
        if let GattStatus::Failed(reason) = status {
            warn!(
                "[{}] Error reading char at handle {}: {}",
                transport.address(),
                handle,
                reason
            );
            if self.refreshing {
                self.refreshing = false;
                self.enter(Phase::Ready, now);
            }
            return Outcome::Fault;
        }

        self.refreshing = false;
        self.enter(Phase::Ready, now);
        Outcome::StatusValue(value)
    }

    /// Re-read the status characteristic of a ready session.
    pub fn request_refresh<T: Transport>(&mut self, transport: &mut T, now: Instant) -> Outcome {
        let (Phase::Ready, Some(handle)) = (self.phase, self.handles.status) else {
            debug!("Refresh skipped in phase {:?}", self.phase);
            return Outcome::None;
        };

        match self.submit_status_read(handle, transport) {
            Outcome::None => {
                self.refreshing = true;
                self.enter(Phase::AwaitingStatusRead, now);
                Outcome::None
            }
            other => other,
        }
    }

    /// Abandon a handshake stuck in one phase for longer than `timeout`.
    ///
    /// Returns true when the session was reset.
    pub fn check_deadline<T: Transport>(
        &mut self,
        now: Instant,
        timeout: Duration,
        transport: &mut T,
    ) -> bool {
        if !matches!(self.phase, Phase::AwaitingPinAck | Phase::AwaitingStatusRead) {
            return false;
        }
        if now.saturating_duration_since(self.phase_entered) < timeout {
            return false;
        }

        warn!(
            "[{}] No completion after {:?} in phase {:?}, disconnecting",
            transport.address(),
            timeout,
            self.phase
        );
        if let Err(e) = transport.disconnect() {
            warn!("[{}] disconnect request failed: {}", transport.address(), e);
        }
        self.reset(now);
        true
    }

    fn submit_status_read<T: Transport>(&mut self, handle: Handle, transport: &mut T) -> Outcome {
        match transport.read_characteristic(handle) {
            Ok(()) => {
                debug!("[{}] status read submitted to handle {}", transport.address(), handle);
                Outcome::None
            }
            Err(e) => {
                warn!("[{}] status read failed: {}", transport.address(), e);
                Outcome::Fault
            }
        }
    }

    fn enter(&mut self, phase: Phase, now: Instant) {
        self.phase = phase;
        self.phase_entered = now;
    }

    fn reset(&mut self, now: Instant) {
        self.handles = Handles::default();
        self.refreshing = false;
        self.enter(Phase::Idle, now);
    }
}
