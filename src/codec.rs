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

//! Status payload decoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::bluetooth::ble_constants::temperature;
use crate::crypto::{decode_pipeline, encode_pipeline, SecretKey, Xxtea};
use crate::error::{CipherError, CodecError};

/// Temperatures reported by the thermostat, in degrees Celsius.
///
/// Both fields are NaN while nothing valid has been decoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub current_temperature: f32,
    pub target_temperature: f32,
}

impl Reading {
    pub const UNKNOWN: Reading = Reading {
        current_temperature: f32::NAN,
        target_temperature: f32::NAN,
    };

    pub fn is_unknown(&self) -> bool {
        self.current_temperature.is_nan() && self.target_temperature.is_nan()
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("unknown");
        }
        write!(
            f,
            "current {:.1}°C, target {:.1}°C",
            self.current_temperature, self.target_temperature
        )
    }
}

/// Decodes raw status values with an installed key.
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    cipher: Xxtea,
}

impl PayloadCodec {
    /// Install `key` into the cipher.
    pub fn new(key: &SecretKey) -> Result<Self, CipherError> {
        Ok(Self {
            cipher: Xxtea::new(key.as_bytes())?,
        })
    }

    /// Decode a raw characteristic value into a reading.
    pub fn decode(&self, raw: &[u8]) -> Result<Reading, CodecError> {
        debug!("raw value: {}", hex::encode(raw));

        let plain = decode_pipeline(&self.cipher, raw)?;
        debug!("decrypted value: {}", hex::encode(&plain));

        // The cipher never yields fewer than two words.
        Ok(Reading {
            current_temperature: plain[temperature::CURRENT_OFFSET] as f32 * temperature::SCALE,
            target_temperature: plain[temperature::TARGET_OFFSET] as f32 * temperature::SCALE,
        })
    }

    /// Produce the characteristic value a thermostat would send for `plain`.
    pub fn encode(&self, plain: &[u8]) -> Result<Vec<u8>, CipherError> {
        encode_pipeline(&self.cipher, plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> PayloadCodec {
        let key = SecretKey::from_hex("0f1e2d3c4b5a69788796a5b4c3d2e1f0").unwrap();
        PayloadCodec::new(&key).unwrap()
    }

    #[test]
    fn test_decode_temperatures() {
        let codec = codec();
        // 21.0 target, 19.5 room
        let raw = codec.encode(&[42, 39, 0, 0, 0, 0, 0, 0]).unwrap();
        let reading = codec.decode(&raw).unwrap();
        assert_eq!(reading.target_temperature, 21.0);
        assert_eq!(reading.current_temperature, 19.5);
        assert!(!reading.is_unknown());
    }

    #[test]
    fn test_decode_with_wrong_key_differs() {
        let codec = codec();
        let raw = codec.encode(&[42, 39, 0, 0, 0, 0, 0, 0]).unwrap();

        let other = PayloadCodec::new(&SecretKey::from_bytes([7; 16])).unwrap();
        let reading = other.decode(&raw).unwrap();
        assert_ne!(
            (reading.target_temperature, reading.current_temperature),
            (21.0, 19.5)
        );
    }

    #[test]
    fn test_decode_misaligned_is_cipher_error() {
        let err = codec().decode(&[1, 2, 3, 4, 5, 6]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Cipher(CipherError::InvalidLength { len: 6, .. })
        ));
    }

    #[test]
    fn test_decode_short_is_cipher_error() {
        let err = codec().decode(&[1, 2, 3, 4]).unwrap_err();
        assert_eq!(err, CodecError::Cipher(CipherError::DecryptFailed { len: 4 }));
    }

    #[test]
    fn test_unknown_reading() {
        let reading = Reading::default();
        assert!(reading.is_unknown());
        assert!(reading.current_temperature.is_nan());
        assert_eq!(reading.to_string(), "unknown");
    }

    #[test]
    fn test_display_reading() {
        let reading = Reading {
            current_temperature: 19.5,
            target_temperature: 21.0,
        };
        assert_eq!(reading.to_string(), "current 19.5°C, target 21.0°C");
    }
}
