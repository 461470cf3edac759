//! Per-client signing session
//!
//! Holds the secret PIN and the keys stretched from it. Stretching runs
//! once per distinct parameter set, on first use, and the result lives only
//! as long as the session.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::crypto::keys::KeyMaterial;
use crate::crypto::passphrase::{extract_key_with, stretch_with, EncryptedPassphrase, EncryptionKey, KdfParams};
use crate::error::{SignerError, SignerResult};
use crate::log_debug;

pub struct Session {
    pin: Option<SecretString>,
    keys: Mutex<HashMap<KdfParams, EncryptionKey>>,
}

impl Session {
    pub fn new(pin: Option<SecretString>) -> Self {
        Self {
            pin,
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn has_pin(&self) -> bool {
        self.pin.is_some()
    }

    /// Run `f` with the PIN, for the API versions that send it as a parameter
    pub(crate) fn with_pin<R>(&self, f: impl FnOnce(&str) -> R) -> Option<R> {
        self.pin.as_ref().map(|p| f(p.expose_secret()))
    }

    /// Stretched key for `params`, computed on first request
    pub fn encryption_key(&self, params: &KdfParams) -> SignerResult<EncryptionKey> {
        let pin = self
            .pin
            .as_ref()
            .ok_or_else(|| SignerError::invalid_input("A PIN is required to decrypt the key passphrase"))?;

        let mut keys = self
            .keys
            .lock()
            .map_err(|_| SignerError::internal("Session key cache lock poisoned"))?;

        if let Some(key) = keys.get(params) {
            return Ok(key.clone());
        }

        log_debug!("session", "Stretching PIN", iterations = params.iterations);
        let key = stretch_with(pin.expose_secret(), params)?;
        keys.insert(params.clone(), key.clone());
        Ok(key)
    }

    /// Decrypt a stored passphrase record into signing key material
    pub fn extract_key(&self, record: &EncryptedPassphrase) -> SignerResult<KeyMaterial> {
        let params = record.algorithm_or_legacy().kdf_params();
        let key = self.encryption_key(&params)?;
        extract_key_with(record, &key)
    }

    /// Number of distinct stretched keys held
    pub fn cached_keys(&self) -> usize {
        self.keys.lock().map(|k| k.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_pin", &self.has_pin())
            .field("cached_keys", &self.cached_keys())
            .finish()
    }
}
