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

//! A single Danfoss Eco thermostat.
//!
//! [`Device`] owns the key material, the handshake session and the last
//! published reading. The transport calls [`Device::on_transport_event`] for
//! every callback; nothing in here blocks or spawns.

use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::bluetooth::session::{Outcome, Phase, Session};
use crate::bluetooth::transport::{Transport, TransportEvent};
use crate::codec::{PayloadCodec, Reading};
use crate::crypto::SecretKey;
use crate::error::{CipherError, ConfigError};

/// Receives every published climate state.
pub trait ClimateSink {
    fn publish_state(&mut self, reading: &Reading);
}

impl<F: FnMut(&Reading)> ClimateSink for F {
    fn publish_state(&mut self, reading: &Reading) {
        self(reading)
    }
}

pub struct Device<T, S> {
    name: String,
    transport: T,
    sink: S,
    secret: Option<SecretKey>,
    codec: Option<PayloadCodec>,
    session: Session,
    reading: Reading,
    handshake_timeout: Option<Duration>,
    failed: bool,
    warning: bool,
    unsupported: bool,
}

impl<T: Transport, S: ClimateSink> Device<T, S> {
    pub fn new(name: impl Into<String>, transport: T, sink: S) -> Self {
        Self {
            name: name.into(),
            transport,
            sink,
            secret: None,
            codec: None,
            session: Session::new(),
            reading: Reading::UNKNOWN,
            handshake_timeout: None,
            failed: false,
            warning: false,
            unsupported: false,
        }
    }

    /// Give up on a handshake phase that sees no completion within `timeout`.
    ///
    /// Without a timeout the handshake waits for the transport indefinitely.
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Parse and store the 32 hex character secret.
    ///
    /// An invalid string leaves any previous key untouched. A valid key
    /// replaces the previous one entirely, including an installed cipher.
    pub fn set_secret_key(&mut self, hex: &str) -> Result<(), ConfigError> {
        let key = SecretKey::from_hex(hex)?;
        self.set_key(key);
        Ok(())
    }

    pub fn set_key(&mut self, key: SecretKey) {
        info!("[{}] secret key fingerprint: {}", self.name, key.fingerprint());
        if self.codec.is_some() {
            match PayloadCodec::new(&key) {
                Ok(codec) => self.codec = Some(codec),
                Err(e) => {
                    error!("[{}] key setup failed: {}", self.name, e);
                    self.mark_failed();
                }
            }
        }
        self.secret = Some(key);
    }

    /// Install the key into the cipher. Failure is permanent.
    pub fn setup(&mut self) -> Result<(), CipherError> {
        let installed = match &self.secret {
            Some(key) => PayloadCodec::new(key),
            None => Err(CipherError::KeySetupFailed(0)),
        };

        match installed {
            Ok(codec) => {
                self.codec = Some(codec);
                debug!("[{}] key installed", self.name);
                Ok(())
            }
            Err(e) => {
                error!("[{}] key setup failed: {}", self.name, e);
                self.mark_failed();
                Err(e)
            }
        }
    }

    /// Log the effective configuration.
    pub fn dump_config(&self) {
        info!("Danfoss Eco eTRV '{}'", self.name);
        info!("  Address: {}", self.transport.address());
        info!(
            "  Secret key: {}",
            self.secret
                .as_ref()
                .map(|k| k.fingerprint())
                .unwrap_or_else(|| "<not set>".to_string())
        );
        match self.handshake_timeout {
            Some(t) => info!("  Handshake timeout: {:?}", t),
            None => info!("  Handshake timeout: none"),
        }
    }

    /// Feed one transport callback into the handshake.
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        if self.failed {
            debug!("[{}] failed, dropping {:?}", self.name, event);
            return;
        }
        if self.codec.is_none() {
            warn!("[{}] event before setup, dropping {:?}", self.name, event);
            return;
        }

        if let TransportEvent::Connected { .. } = event {
            self.unsupported = false;
        }

        let outcome = self
            .session
            .handle_event(event, &mut self.transport, Instant::now());
        self.apply(outcome);
    }

    /// Re-read the status characteristic if the handshake is complete.
    pub fn request_refresh(&mut self) {
        if self.failed || self.codec.is_none() {
            return;
        }
        let outcome = self
            .session
            .request_refresh(&mut self.transport, Instant::now());
        self.apply(outcome);
    }

    /// Reset a stalled handshake. Returns true if the session was abandoned.
    pub fn check_deadline(&mut self, now: Instant) -> bool {
        let Some(timeout) = self.handshake_timeout else {
            return false;
        };
        if self.failed {
            return false;
        }

        let expired = self.session.check_deadline(now, timeout, &mut self.transport);
        if expired {
            self.warning = true;
        }
        expired
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::None => {}
            Outcome::Unsupported => {
                self.unsupported = true;
                self.warning = true;
            }
            Outcome::Fault => self.warning = true,
            Outcome::StatusValue(raw) => {
                self.warning = false;
                self.parse_data(&raw);
            }
            Outcome::Reset => {
                self.reading = Reading::UNKNOWN;
                self.sink.publish_state(&self.reading);
            }
        }
    }

    fn parse_data(&mut self, raw: &[u8]) {
        let Some(codec) = &self.codec else {
            return;
        };

        match codec.decode(raw) {
            Ok(reading) => {
                info!("[{}] {}", self.name, reading);
                self.reading = reading;
                self.sink.publish_state(&self.reading);
            }
            Err(e) => {
                warn!(
                    "[{}] failed to decode status from {}: {}",
                    self.name,
                    self.transport.address(),
                    e
                );
            }
        }
    }

    fn mark_failed(&mut self) {
        self.failed = true;
        self.codec = None;
    }

    /// Last published reading.
    pub fn current_reading(&self) -> Reading {
        self.reading
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key setup failed; the device no longer processes events.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Something went wrong since the last successful status read.
    pub fn has_warning(&self) -> bool {
        self.warning
    }

    /// The connected peer lacks the thermostat characteristics.
    pub fn is_unsupported(&self) -> bool {
        self.unsupported
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
