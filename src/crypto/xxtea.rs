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

//! XXTEA block cipher and the byte-order transform used on the wire.
//!
//! The thermostat stores its 32-bit words big-endian while the cipher works
//! on little-endian words, so every value is chunk-reversed before and after
//! the cipher runs.

use crate::bluetooth::ble_constants::{CHUNK_SIZE, MIN_CIPHER_LEN};
use crate::error::CipherError;

const DELTA: u32 = 0x9e37_79b9;

/// Reverse the byte order inside every `chunk_size` chunk of `data`.
///
/// The number and position of chunks is unchanged. Lengths that are not an
/// exact multiple of `chunk_size` are rejected.
pub fn reverse_chunks(data: &[u8], chunk_size: usize) -> Result<Vec<u8>, CipherError> {
    if chunk_size == 0 || data.len() % chunk_size != 0 {
        return Err(CipherError::InvalidLength {
            len: data.len(),
            multiple: chunk_size,
        });
    }

    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(chunk_size) {
        out.extend(chunk.iter().rev());
    }
    Ok(out)
}

/// XXTEA cipher with an installed 128-bit key.
#[derive(Clone)]
pub struct Xxtea {
    key: [u32; 4],
}

impl std::fmt::Debug for Xxtea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xxtea").finish_non_exhaustive()
    }
}

impl Xxtea {
    /// Run the key schedule. The key must be exactly 16 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 16 {
            return Err(CipherError::KeySetupFailed(key.len()));
        }

        let mut words = [0u32; 4];
        for (word, bytes) in words.iter_mut().zip(key.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Ok(Self { key: words })
    }

    /// Decrypt `data` in one pass over all of its words.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut v = to_words(data).ok_or(CipherError::DecryptFailed { len: data.len() })?;
        self.decrypt_words(&mut v);
        Ok(from_words(&v))
    }

    /// Encrypt `data` the way the thermostat does.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut v = to_words(data).ok_or(CipherError::InvalidLength {
            len: data.len(),
            multiple: CHUNK_SIZE,
        })?;
        self.encrypt_words(&mut v);
        Ok(from_words(&v))
    }

    fn mx(&self, sum: u32, y: u32, z: u32, p: usize, e: usize) -> u32 {
        (((z >> 5) ^ (y << 2)).wrapping_add((y >> 3) ^ (z << 4)))
            ^ ((sum ^ y).wrapping_add(self.key[(p & 3) ^ e] ^ z))
    }

    fn encrypt_words(&self, v: &mut [u32]) {
        let n = v.len();
        let rounds = 6 + 52 / n;
        let mut sum = 0u32;
        let mut z = v[n - 1];

        for _ in 0..rounds {
            sum = sum.wrapping_add(DELTA);
            let e = ((sum >> 2) & 3) as usize;
            for p in 0..n {
                let y = v[(p + 1) % n];
                v[p] = v[p].wrapping_add(self.mx(sum, y, z, p, e));
                z = v[p];
            }
        }
    }

    fn decrypt_words(&self, v: &mut [u32]) {
        let n = v.len();
        let rounds = 6 + 52 / n;
        let mut sum = (rounds as u32).wrapping_mul(DELTA);
        let mut y = v[0];

        for _ in 0..rounds {
            let e = ((sum >> 2) & 3) as usize;
            for p in (0..n).rev() {
                let z = v[(p + n - 1) % n];
                v[p] = v[p].wrapping_sub(self.mx(sum, y, z, p, e));
                y = v[p];
            }
            sum = sum.wrapping_sub(DELTA);
        }
    }
}

/// Little-endian words, or `None` when the buffer is misaligned or shorter
/// than the two words XXTEA needs.
fn to_words(data: &[u8]) -> Option<Vec<u32>> {
    if data.len() % CHUNK_SIZE != 0 || data.len() < MIN_CIPHER_LEN {
        return None;
    }
    Some(
        data.chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn from_words(v: &[u32]) -> Vec<u8> {
    v.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Recover plaintext from a characteristic value:
/// reverse chunks, decrypt, reverse chunks again.
pub fn decode_pipeline(cipher: &Xxtea, raw: &[u8]) -> Result<Vec<u8>, CipherError> {
    let reversed = reverse_chunks(raw, CHUNK_SIZE)?;
    let decrypted = cipher.decrypt(&reversed)?;
    reverse_chunks(&decrypted, CHUNK_SIZE)
}

/// The thermostat's side of [`decode_pipeline`].
pub fn encode_pipeline(cipher: &Xxtea, plain: &[u8]) -> Result<Vec<u8>, CipherError> {
    let reversed = reverse_chunks(plain, CHUNK_SIZE)?;
    let encrypted = cipher.encrypt(&reversed)?;
    reverse_chunks(&encrypted, CHUNK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore};

    const KEY: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    #[test]
    fn test_reverse_chunks() {
        let data: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(
            reverse_chunks(&data, 4).unwrap(),
            vec![4, 3, 2, 1, 8, 7, 6, 5]
        );
        assert_eq!(reverse_chunks(&data, 8).unwrap(), vec![8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(reverse_chunks(&data, 1).unwrap(), data.to_vec());
        assert!(reverse_chunks(&[], 4).unwrap().is_empty());
    }

    #[test]
    fn test_reverse_chunks_rejects_misaligned() {
        assert_eq!(
            reverse_chunks(&[1, 2, 3, 4, 5], 4),
            Err(CipherError::InvalidLength { len: 5, multiple: 4 })
        );
        assert!(reverse_chunks(&[1, 2], 0).is_err());
    }

    #[test]
    fn test_reverse_chunks_self_inverse() {
        let mut rng = rand::thread_rng();
        for chunk_size in [1usize, 2, 4, 8, 16] {
            for chunks in 0..8 {
                let mut data = vec![0u8; chunk_size * chunks];
                rng.fill_bytes(&mut data);
                let once = reverse_chunks(&data, chunk_size).unwrap();
                assert_eq!(reverse_chunks(&once, chunk_size).unwrap(), data);
            }
        }
    }

    #[test]
    fn test_key_setup_requires_16_bytes() {
        assert!(Xxtea::new(&KEY).is_ok());
        assert_eq!(Xxtea::new(&KEY[..15]).unwrap_err(), CipherError::KeySetupFailed(15));
        assert_eq!(Xxtea::new(&[]).unwrap_err(), CipherError::KeySetupFailed(0));
    }

    #[test]
    fn test_decrypt_rejects_short_and_misaligned() {
        let cipher = Xxtea::new(&KEY).unwrap();
        assert_eq!(
            cipher.decrypt(&[0u8; 4]),
            Err(CipherError::DecryptFailed { len: 4 })
        );
        assert_eq!(
            cipher.decrypt(&[0u8; 10]),
            Err(CipherError::DecryptFailed { len: 10 })
        );
    }

    #[test]
    fn test_encrypt_changes_data() {
        let cipher = Xxtea::new(&KEY).unwrap();
        let plain = [0u8; 8];
        let encrypted = cipher.encrypt(&plain).unwrap();
        assert_eq!(encrypted.len(), 8);
        assert_ne!(encrypted, plain.to_vec());
    }

    #[test]
    fn test_decryption_is_deterministic() {
        let cipher = Xxtea::new(&KEY).unwrap();
        let raw = [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            decode_pipeline(&cipher, &raw).unwrap(),
            decode_pipeline(&cipher, &raw).unwrap()
        );
    }

    #[test]
    fn test_different_keys_disagree() {
        let a = Xxtea::new(&KEY).unwrap();
        let mut other = KEY;
        other[0] ^= 0x01;
        let b = Xxtea::new(&other).unwrap();
        let plain = b"\x2a\x28\x00\x00\x00\x00\x00\x00";
        assert_ne!(a.encrypt(plain).unwrap(), b.encrypt(plain).unwrap());
    }

    #[test]
    fn test_pipeline_inverts_device_encoding() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let mut key = [0u8; 16];
            rng.fill_bytes(&mut key);
            let cipher = Xxtea::new(&key).unwrap();

            let words = rng.gen_range(2..=16);
            let mut plain = vec![0u8; words * 4];
            rng.fill_bytes(&mut plain);

            let wire = encode_pipeline(&cipher, &plain).unwrap();
            assert_eq!(wire.len(), plain.len());
            assert_eq!(decode_pipeline(&cipher, &wire).unwrap(), plain);
        }
    }

    #[test]
    fn test_pipeline_rejects_misaligned_payload() {
        let cipher = Xxtea::new(&KEY).unwrap();
        assert_eq!(
            decode_pipeline(&cipher, &[0u8; 9]),
            Err(CipherError::InvalidLength { len: 9, multiple: 4 })
        );
    }
}
