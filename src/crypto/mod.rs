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

//! Cryptography for the thermostat link.
//!
//! The thermostat encrypts its characteristic values with XXTEA keyed by a
//! 16-byte secret read from the device while in pairing mode.

pub mod key;
pub mod xxtea;

pub use key::SecretKey;
pub use xxtea::{decode_pipeline, encode_pipeline, reverse_chunks, Xxtea};
