//! Passphrase Encryption
//!
//! Turns a short PIN into an AES-256 key with two chained PBKDF2-HMAC-SHA256
//! passes, and encrypts or decrypts the user's key passphrase with it:
//! - AES-256-ECB for legacy records (no IV)
//! - AES-256-CBC with a 16-byte IV
//! - AES-256-GCM with a 12-byte IV, detached tag and optional AAD
//!
//! Every failure that could come from a wrong PIN surfaces as the same
//! `InvalidPin` error.

#![allow(deprecated)] // GenericArray::from_slice deprecated in generic-array 1.x

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt};
use aes::Aes256;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::crypto::keys::KeyMaterial;
use crate::error::{SignerError, SignerResult};

pub const DEFAULT_SALT: &str = "";
pub const DEFAULT_ITERATIONS: u32 = 1024;
pub const DEFAULT_PHASE1_KEY_LENGTH: usize = 16;
pub const DEFAULT_PHASE2_KEY_LENGTH: usize = 32;
pub const SUPPORTED_HASH_FUNCTION: &str = "SHA256";

const BLOCK_SIZE: usize = 16;
const CBC_IV_LENGTH: usize = 16;
const GCM_IV_LENGTH: usize = 12;
const GCM_TAG_LENGTH: usize = 16;

// =============================================================================
// Cipher and KDF parameters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherKind {
    #[serde(rename = "AES-256-ECB")]
    Aes256Ecb,
    #[serde(rename = "AES-256-CBC")]
    Aes256Cbc,
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl CipherKind {
    pub fn name(&self) -> &'static str {
        match self {
            CipherKind::Aes256Ecb => "AES-256-ECB",
            CipherKind::Aes256Cbc => "AES-256-CBC",
            CipherKind::Aes256Gcm => "AES-256-GCM",
        }
    }

    /// Required IV length, `None` for ECB
    pub fn iv_length(&self) -> Option<usize> {
        match self {
            CipherKind::Aes256Ecb => None,
            CipherKind::Aes256Cbc => Some(CBC_IV_LENGTH),
            CipherKind::Aes256Gcm => Some(GCM_IV_LENGTH),
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CipherKind {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AES-256-ECB" => Ok(CipherKind::Aes256Ecb),
            "AES-256-CBC" => Ok(CipherKind::Aes256Cbc),
            "AES-256-GCM" => Ok(CipherKind::Aes256Gcm),
            other => Err(SignerError::unsupported_cipher(format!(
                "Unsupported cipher: {}",
                other
            ))),
        }
    }
}

/// Key-stretching parameters. Used as the memoization key for stretched PINs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KdfParams {
    pub salt: String,
    pub iterations: u32,
    pub hash_function: String,
    pub phase1_key_length: usize,
    pub phase2_key_length: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_string(),
            iterations: DEFAULT_ITERATIONS,
            hash_function: SUPPORTED_HASH_FUNCTION.to_string(),
            phase1_key_length: DEFAULT_PHASE1_KEY_LENGTH,
            phase2_key_length: DEFAULT_PHASE2_KEY_LENGTH,
        }
    }
}

impl KdfParams {
    pub fn new(salt: impl Into<String>, iterations: u32) -> Self {
        Self {
            salt: salt.into(),
            iterations,
            ..Self::default()
        }
    }

    fn validate(&self) -> SignerResult<()> {
        if self.hash_function.to_uppercase() != SUPPORTED_HASH_FUNCTION {
            return Err(SignerError::unsupported_cipher(format!(
                "Unknown hash function: {}",
                self.hash_function
            )));
        }
        if self.iterations == 0 {
            return Err(SignerError::invalid_input("PBKDF2 iterations must be positive"));
        }
        if self.phase1_key_length == 0 || self.phase1_key_length > 64 {
            return Err(SignerError::invalid_input("Invalid phase 1 key length"));
        }
        if self.phase2_key_length != 32 {
            return Err(SignerError::invalid_input("Phase 2 key length must be 32 for AES-256"));
        }
        Ok(())
    }
}

/// Self-describing parameters attached to newer encrypted records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionAlgorithm {
    pub pbkdf2_salt: String,
    pub pbkdf2_iterations: u32,
    pub pbkdf2_hash_function: String,
    pub pbkdf2_phase1_key_length: usize,
    pub pbkdf2_phase2_key_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aes_iv: Option<String>,
    pub aes_cipher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aes_auth_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aes_auth_data: Option<String>,
}

impl EncryptionAlgorithm {
    /// Parameters implied by a record that carries none
    pub fn legacy() -> Self {
        let kdf = KdfParams::default();
        Self {
            pbkdf2_salt: kdf.salt,
            pbkdf2_iterations: kdf.iterations,
            pbkdf2_hash_function: kdf.hash_function,
            pbkdf2_phase1_key_length: kdf.phase1_key_length,
            pbkdf2_phase2_key_length: kdf.phase2_key_length,
            aes_iv: None,
            aes_cipher: CipherKind::Aes256Ecb.name().to_string(),
            aes_auth_tag: None,
            aes_auth_data: None,
        }
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            salt: self.pbkdf2_salt.clone(),
            iterations: self.pbkdf2_iterations,
            hash_function: self.pbkdf2_hash_function.clone(),
            phase1_key_length: self.pbkdf2_phase1_key_length,
            phase2_key_length: self.pbkdf2_phase2_key_length,
        }
    }

    pub fn cipher(&self) -> SignerResult<CipherKind> {
        self.aes_cipher.parse()
    }
}

/// An encrypted key passphrase as the remote service stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPassphrase {
    /// Public key the decrypted passphrase must produce
    #[serde(default, alias = "signer_public_key", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Base64 ciphertext
    #[serde(alias = "passphrase")]
    pub encrypted_passphrase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<EncryptionAlgorithm>,
}

impl EncryptedPassphrase {
    pub fn algorithm_or_legacy(&self) -> EncryptionAlgorithm {
        self.algorithm.clone().unwrap_or_else(EncryptionAlgorithm::legacy)
    }
}

// =============================================================================
// Key stretching
// =============================================================================

/// A stretched AES-256 key, zeroized on drop
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; 32]>);

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> SignerResult<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignerError::invalid_input("Encryption key must be 32 bytes"))?;
        Ok(Self(Zeroizing::new(arr)))
    }

    pub fn from_hex(key_hex: &str) -> SignerResult<Self> {
        let bytes = Zeroizing::new(hex::decode(key_hex.trim())?);
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.0[..]))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Stretch with the default salt and phase lengths
pub fn stretch(pin: &str, salt: &str, iterations: u32) -> SignerResult<EncryptionKey> {
    stretch_with(pin, &KdfParams::new(salt, iterations))
}

/// PBKDF2(pin) -> hex -> PBKDF2(hex), same salt and iteration count both times
pub fn stretch_with(pin: &str, params: &KdfParams) -> SignerResult<EncryptionKey> {
    params.validate()?;
    if pin.is_empty() {
        return Err(SignerError::invalid_input("PIN must not be empty"));
    }

    let salt = params.salt.as_bytes();

    let mut phase1 = Zeroizing::new(vec![0u8; params.phase1_key_length]);
    pbkdf2::pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, params.iterations, &mut phase1[..]);
    let phase1_hex = Zeroizing::new(hex::encode(phase1.as_slice()));

    let mut phase2 = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(phase1_hex.as_bytes(), salt, params.iterations, &mut phase2[..]);

    Ok(EncryptionKey(phase2))
}

// =============================================================================
// Encryption
// =============================================================================

/// Output of `encrypt`: base64 ciphertext plus the IV/tag that were used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherOutput {
    pub ciphertext: String,
    pub iv_hex: Option<String>,
    pub auth_tag_hex: Option<String>,
}

/// Encrypt `plaintext`. A missing IV is generated for CBC and GCM.
pub fn encrypt(
    plaintext: &[u8],
    key: &EncryptionKey,
    cipher: CipherKind,
    iv: Option<&[u8]>,
    auth_data: &[u8],
) -> SignerResult<CipherOutput> {
    let iv = resolve_iv(cipher, iv)?;

    match cipher {
        CipherKind::Aes256Ecb => {
            let mut buf = pkcs7_pad(plaintext);
            ecb_encrypt(key, &mut buf)?;
            Ok(CipherOutput {
                ciphertext: STANDARD.encode(buf.as_slice()),
                iv_hex: None,
                auth_tag_hex: None,
            })
        }
        CipherKind::Aes256Cbc => {
            let mut buf = pkcs7_pad(plaintext);
            cbc_encrypt(key, &iv, &mut buf)?;
            Ok(CipherOutput {
                ciphertext: STANDARD.encode(buf.as_slice()),
                iv_hex: Some(hex::encode(&iv)),
                auth_tag_hex: None,
            })
        }
        CipherKind::Aes256Gcm => {
            let gcm = Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|e| SignerError::internal(format!("Failed to create cipher: {}", e)))?;
            let mut sealed = gcm
                .encrypt(
                    Nonce::from_slice(&iv),
                    Payload {
                        msg: plaintext,
                        aad: auth_data,
                    },
                )
                .map_err(|e| SignerError::internal(format!("Encryption failed: {}", e)))?;
            let tag = sealed.split_off(sealed.len() - GCM_TAG_LENGTH);
            Ok(CipherOutput {
                ciphertext: STANDARD.encode(&sealed),
                iv_hex: Some(hex::encode(&iv)),
                auth_tag_hex: Some(hex::encode(tag)),
            })
        }
    }
}

/// Decrypt base64 `ciphertext`. Padding, tag and decoding failures are all
/// reported as `InvalidPin`.
pub fn decrypt(
    ciphertext: &str,
    key: &EncryptionKey,
    cipher: CipherKind,
    iv: Option<&[u8]>,
    auth_tag: Option<&[u8]>,
    auth_data: &[u8],
) -> SignerResult<Zeroizing<Vec<u8>>> {
    if let Some(expected) = cipher.iv_length() {
        match iv {
            Some(iv) if iv.len() == expected => {}
            Some(iv) => {
                return Err(SignerError::invalid_input(format!(
                    "{} requires a {}-byte IV, got {}",
                    cipher,
                    expected,
                    iv.len()
                )))
            }
            None => return Err(SignerError::invalid_input(format!("{} requires an IV", cipher))),
        }
    }

    let mut buf = STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| SignerError::invalid_pin())?;

    match cipher {
        CipherKind::Aes256Ecb => {
            ecb_decrypt(key, &mut buf)?;
            pkcs7_unpad(buf)
        }
        CipherKind::Aes256Cbc => {
            cbc_decrypt(key, iv.unwrap_or_default(), &mut buf)?;
            pkcs7_unpad(buf)
        }
        CipherKind::Aes256Gcm => {
            let tag = auth_tag
                .ok_or_else(|| SignerError::invalid_input("AES-256-GCM requires an auth tag"))?;
            if tag.len() != GCM_TAG_LENGTH {
                return Err(SignerError::invalid_input("AES-256-GCM auth tag must be 16 bytes"));
            }
            buf.extend_from_slice(tag);

            let gcm = Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|e| SignerError::internal(format!("Failed to create cipher: {}", e)))?;
            let plaintext = gcm
                .decrypt(
                    Nonce::from_slice(iv.unwrap_or_default()),
                    Payload {
                        msg: &buf,
                        aad: auth_data,
                    },
                )
                .map_err(|_| SignerError::invalid_pin())?;
            Ok(Zeroizing::new(plaintext))
        }
    }
}

/// Decrypt a stored passphrase record with an already stretched key
pub fn extract_key_with(record: &EncryptedPassphrase, key: &EncryptionKey) -> SignerResult<KeyMaterial> {
    let algorithm = record.algorithm_or_legacy();
    let cipher = algorithm.cipher()?;

    let iv = decode_optional_hex(algorithm.aes_iv.as_deref())?;
    let tag = decode_optional_hex(algorithm.aes_auth_tag.as_deref())?;
    let aad = decode_optional_hex(algorithm.aes_auth_data.as_deref())?.unwrap_or_default();

    let plaintext = decrypt(
        &record.encrypted_passphrase,
        key,
        cipher,
        iv.as_deref(),
        tag.as_deref(),
        &aad,
    )?;

    let passphrase_hex = std::str::from_utf8(&plaintext).map_err(|_| SignerError::invalid_pin())?;
    let passphrase = Zeroizing::new(hex::decode(passphrase_hex.trim()).map_err(|_| SignerError::invalid_pin())?);
    let key_material = KeyMaterial::from_passphrase(&passphrase).map_err(|_| SignerError::invalid_pin())?;

    if let Some(declared) = record.public_key.as_deref() {
        if !key_material.matches_public_key(declared) {
            return Err(SignerError::invalid_pin());
        }
    }

    Ok(key_material)
}

/// Stretch the PIN with the record's own parameters, then decrypt it
pub fn dynamic_extract_key(record: &EncryptedPassphrase, pin: &str) -> SignerResult<KeyMaterial> {
    let key = stretch_with(pin, &record.algorithm_or_legacy().kdf_params())?;
    extract_key_with(record, &key)
}

/// Build a record for `passphrase` under `algorithm`. IV and tag fields are
/// filled from what the cipher actually used.
pub fn encrypt_passphrase(
    passphrase: &[u8],
    key: &EncryptionKey,
    mut algorithm: EncryptionAlgorithm,
) -> SignerResult<EncryptedPassphrase> {
    let cipher = algorithm.cipher()?;
    let iv = decode_optional_hex(algorithm.aes_iv.as_deref())?;
    let aad = decode_optional_hex(algorithm.aes_auth_data.as_deref())?.unwrap_or_default();

    let plaintext = Zeroizing::new(hex::encode(passphrase));
    let out = encrypt(plaintext.as_bytes(), key, cipher, iv.as_deref(), &aad)?;

    let public_key = KeyMaterial::from_passphrase(passphrase)?.public_key_hex();
    algorithm.aes_iv = out.iv_hex;
    algorithm.aes_auth_tag = out.auth_tag_hex;

    Ok(EncryptedPassphrase {
        public_key: Some(public_key),
        encrypted_passphrase: out.ciphertext,
        algorithm: Some(algorithm),
    })
}

fn decode_optional_hex(value: Option<&str>) -> SignerResult<Option<Vec<u8>>> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(Some(hex::decode(v.trim())?)),
        _ => Ok(None),
    }
}

fn resolve_iv(cipher: CipherKind, iv: Option<&[u8]>) -> SignerResult<Vec<u8>> {
    let Some(expected) = cipher.iv_length() else {
        return Ok(Vec::new());
    };

    match iv {
        Some(iv) if iv.len() == expected => Ok(iv.to_vec()),
        Some(iv) => Err(SignerError::invalid_input(format!(
            "{} requires a {}-byte IV, got {}",
            cipher,
            expected,
            iv.len()
        ))),
        None => {
            let mut fresh = vec![0u8; expected];
            OsRng.fill_bytes(&mut fresh);
            Ok(fresh)
        }
    }
}

// =============================================================================
// Block modes
// =============================================================================

fn block_cipher(key: &EncryptionKey) -> SignerResult<Aes256> {
    Aes256::new_from_slice(key.as_bytes())
        .map_err(|e| SignerError::internal(format!("Failed to create cipher: {}", e)))
}

fn ecb_encrypt(key: &EncryptionKey, buf: &mut [u8]) -> SignerResult<()> {
    let aes = block_cipher(key)?;
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        aes.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(())
}

fn ecb_decrypt(key: &EncryptionKey, buf: &mut [u8]) -> SignerResult<()> {
    if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
        return Err(SignerError::invalid_pin());
    }
    let aes = block_cipher(key)?;
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        aes.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(())
}

fn cbc_encrypt(key: &EncryptionKey, iv: &[u8], buf: &mut [u8]) -> SignerResult<()> {
    let aes = block_cipher(key)?;
    let mut prev = [0u8; BLOCK_SIZE];
    prev.copy_from_slice(iv);

    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        aes.encrypt_block(GenericArray::from_mut_slice(chunk));
        prev.copy_from_slice(chunk);
    }
    Ok(())
}

fn cbc_decrypt(key: &EncryptionKey, iv: &[u8], buf: &mut [u8]) -> SignerResult<()> {
    if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
        return Err(SignerError::invalid_pin());
    }
    let aes = block_cipher(key)?;
    let mut prev = [0u8; BLOCK_SIZE];
    prev.copy_from_slice(iv);

    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        let mut current = [0u8; BLOCK_SIZE];
        current.copy_from_slice(chunk);
        aes.decrypt_block(GenericArray::from_mut_slice(chunk));
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = current;
    }
    Ok(())
}

fn pkcs7_pad(data: &[u8]) -> Zeroizing<Vec<u8>> {
    let pad = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut out = Zeroizing::new(Vec::with_capacity(data.len() + pad));
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad as u8).take(pad));
    out
}

fn pkcs7_unpad(buf: Vec<u8>) -> SignerResult<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(buf);
    let pad = *buf.last().ok_or_else(SignerError::invalid_pin)? as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return Err(SignerError::invalid_pin());
    }
    if !buf[buf.len() - pad..].iter().all(|&b| b as usize == pad) {
        return Err(SignerError::invalid_pin());
    }
    let new_len = buf.len() - pad;
    buf.truncate(new_len);
    Ok(buf)
}
