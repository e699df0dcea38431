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

//! Bluetooth communication module.
//!
//! Handles the PIN handshake with the thermostat over BLE GATT.

pub mod ble_constants;
pub mod client;
pub mod session;
pub mod transport;

pub use client::{BluerLink, BluerTransport};
pub use session::{Outcome, Phase, Session};
pub use transport::{ConnectionId, GattStatus, Handle, Transport, TransportEvent};
