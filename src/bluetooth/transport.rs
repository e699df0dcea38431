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

//! Boundary between the pairing logic and a BLE central stack.
//!
//! Requests are submitted and return immediately. Their completions arrive
//! later as [`TransportEvent`]s.

use std::fmt;
use uuid::Uuid;

use crate::error::TransportError;

/// Transport-assigned characteristic handle, valid for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u16);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Identity of one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u32);

/// Completion status reported by the remote GATT server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    Failed(String),
}

impl GattStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, GattStatus::Success)
    }
}

/// Events delivered by the transport, in the order it issued them.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Link established.
    Connected { connection_id: ConnectionId },
    /// Link lost or closed.
    Disconnected,
    /// Service discovery finished; characteristics can be looked up.
    ServiceDiscovered,
    /// A write request completed.
    WriteCompleted { handle: Handle, status: GattStatus },
    /// A read request completed.
    ReadCompleted {
        handle: Handle,
        status: GattStatus,
        connection_id: ConnectionId,
        value: Vec<u8>,
    },
    /// The device pushed a new characteristic value.
    Notified {
        handle: Handle,
        connection_id: ConnectionId,
        value: Vec<u8>,
    },
}

/// Operations the pairing logic needs from a BLE central.
pub trait Transport {
    /// Look up a discovered characteristic.
    fn discover_characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<Handle>;

    /// Submit a write with response.
    fn write_characteristic(&mut self, handle: Handle, data: &[u8]) -> Result<(), TransportError>;

    /// Submit a read.
    fn read_characteristic(&mut self, handle: Handle) -> Result<(), TransportError>;

    /// Ask the transport to drop the link. A `Disconnected` event follows.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Human-readable peer address for logs.
    fn address(&self) -> String;
}
