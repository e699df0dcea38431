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

//! Error types.
//!
//! Only configuration and key setup errors ever reach the owner of a
//! [`Device`](crate::device::Device). Everything raised while handling a
//! transport event is logged and absorbed inside the event handler.

use thiserror::Error;

/// Errors from the cipher transform and key installation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// The key could not be installed into the cipher.
    #[error("key setup failed: expected 16 key bytes, got {0}")]
    KeySetupFailed(usize),

    /// The block transform rejected the buffer.
    #[error("decryption failed for {len} byte buffer")]
    DecryptFailed { len: usize },

    /// Buffer length is not an exact multiple of the chunk or block size.
    #[error("buffer length {len} is not a multiple of {multiple}")]
    InvalidLength { len: usize, multiple: usize },
}

/// Errors from decoding a status payload into a reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}

/// Configuration errors, surfaced synchronously before setup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("secret key must be 32 hex characters, got {0}")]
    InvalidKeyLength(usize),

    #[error("secret key is not valid hex: {0}")]
    InvalidKeyHex(String),

    #[error("invalid device address: {0}")]
    InvalidAddress(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A read or write request the transport refused to submit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport is no longer accepting requests.
    #[error("transport closed")]
    Closed,

    #[error("request rejected: {0}")]
    Rejected(String),
}
