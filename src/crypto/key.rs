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

//! Shared secret used to key the thermostat cipher.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Length of the secret in bytes.
pub const SECRET_LEN: usize = 16;

/// 16-byte thermostat secret.
///
/// Parsed from the 32 hex characters printed by the pairing tools.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct SecretKey([u8; SECRET_LEN]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a key from exactly 32 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, ConfigError> {
        if s.len() != SECRET_LEN * 2 {
            return Err(ConfigError::InvalidKeyLength(s.len()));
        }

        let mut bytes = [0u8; SECRET_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| ConfigError::InvalidKeyHex(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// Short SHA-256 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..4])
    }
}

impl FromStr for SecretKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for SecretKey {
    type Error = ConfigError;

    // Config files may carry stray whitespace around the value.
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(s.trim())
    }
}

// Never print key bytes.
impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({})", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "00112233445566778899aabbccddeeff";

    #[test]
    fn test_parse_hex_key() {
        let key = SecretKey::from_hex(HEX).unwrap();
        assert_eq!(key.as_bytes()[0], 0x00);
        assert_eq!(key.as_bytes()[15], 0xff);

        let upper: SecretKey = HEX.to_uppercase().parse().unwrap();
        assert_eq!(upper, key);
    }

    #[test]
    fn test_reject_wrong_length() {
        assert!(matches!(
            SecretKey::from_hex("0011"),
            Err(ConfigError::InvalidKeyLength(4))
        ));
        assert!(matches!(
            SecretKey::from_hex(&format!("{}00", HEX)),
            Err(ConfigError::InvalidKeyLength(34))
        ));
        assert!(matches!(
            SecretKey::from_hex(""),
            Err(ConfigError::InvalidKeyLength(0))
        ));
    }

    #[test]
    fn test_reject_surrounding_whitespace() {
        assert!(matches!(
            SecretKey::from_hex(&format!(" {} ", HEX)),
            Err(ConfigError::InvalidKeyLength(34))
        ));
        assert!(SecretKey::from_hex(&format!("{}\n", HEX)).is_err());

        let loaded = SecretKey::try_from(format!(" {}\n", HEX)).unwrap();
        assert_eq!(loaded, SecretKey::from_hex(HEX).unwrap());
    }

    #[test]
    fn test_reject_non_hex() {
        let bad = "zz112233445566778899aabbccddeeff";
        assert!(matches!(
            SecretKey::from_hex(bad),
            Err(ConfigError::InvalidKeyHex(_))
        ));
    }

    #[test]
    fn test_debug_hides_key_bytes() {
        let key = SecretKey::from_hex(HEX).unwrap();
        let printed = format!("{:?}", key);
        assert!(!printed.contains("aabbcc"));
        assert_eq!(key.fingerprint().len(), 8);
    }
}
