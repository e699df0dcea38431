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

//! BLE service and characteristic UUIDs for Danfoss Eco thermostats.

use uuid::Uuid;

/// Settings GATT service UUID.
pub const SETTINGS_SERVICE_UUID: Uuid = Uuid::from_u128(0x10020000_2749_0001_0000_00805f9b042f);

/// PIN characteristic UUID (must be written before anything else is readable).
/// Properties: Write
pub const PIN_UUID: Uuid = Uuid::from_u128(0x10020001_2749_0001_0000_00805f9b042f);

/// Temperature characteristic UUID (set point and room temperature).
/// Properties: Read, Write
pub const TEMPERATURE_UUID: Uuid = Uuid::from_u128(0x10020005_2749_0001_0000_00805f9b042f);

/// Characteristic read after a successful PIN write and decoded into a reading.
pub const STATUS_UUID: Uuid = TEMPERATURE_UUID;

/// PIN payload. Thermostats ship with PIN 0000 and the app never changes it.
pub const PIN_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

/// Byte-order chunk size of the wire format.
pub const CHUNK_SIZE: usize = 4;

/// Smallest buffer XXTEA can operate on (two 32-bit words).
pub const MIN_CIPHER_LEN: usize = 2 * CHUNK_SIZE;

/// Temperature payload layout after decoding.
pub mod temperature {
    /// Offset of the set point, in half degrees.
    pub const TARGET_OFFSET: usize = 0;

    /// Offset of the measured room temperature, in half degrees.
    pub const CURRENT_OFFSET: usize = 1;

    /// Fields are stored as half-degree steps.
    pub const SCALE: f32 = 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            SETTINGS_SERVICE_UUID.to_string(),
            "10020000-2749-0001-0000-00805f9b042f"
        );
        assert_eq!(PIN_UUID.to_string(), "10020001-2749-0001-0000-00805f9b042f");
        assert_eq!(
            TEMPERATURE_UUID.to_string(),
            "10020005-2749-0001-0000-00805f9b042f"
        );
    }

    #[test]
    fn test_characteristics_distinct() {
        assert_ne!(PIN_UUID, STATUS_UUID);
        assert_ne!(SETTINGS_SERVICE_UUID, PIN_UUID);
    }
}
