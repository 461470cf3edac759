//! secp256k1 Key Material
//!
//! One keypair per instance, built from a passphrase, a raw scalar, or a
//! WIF string. Signatures are deterministic (RFC 6979) and ground until the
//! DER-encoded R is exactly 32 bytes with its high bit clear.

use bitcoin::hashes::{sha256d, Hash};
use secp256k1::constants::CURVE_ORDER;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{SignerError, SignerResult};
use crate::types::Network;

/// Upper bound on nonce grinding. Real keys land within a few tries.
pub const MAX_LOW_R_ATTEMPTS: u32 = 1024;

/// A secp256k1 keypair held only in memory
#[derive(Clone)]
pub struct KeyMaterial {
    secret: Zeroizing<[u8; 32]>,
    public_key: PublicKey,
    compressed: bool,
}

impl KeyMaterial {
    /// SHA-256 of the passphrase bytes becomes the secret scalar
    pub fn from_passphrase(passphrase: &[u8]) -> SignerResult<Self> {
        let digest: [u8; 32] = Sha256::digest(passphrase).into();
        let reduced = Zeroizing::new(reduce_mod_order(digest));
        Self::from_raw_secret(&reduced[..])
    }

    /// Use a 32-byte scalar verbatim; compressed public key
    pub fn from_raw_secret(secret: &[u8]) -> SignerResult<Self> {
        if secret.len() != 32 {
            return Err(SignerError::invalid_key(format!(
                "Secret must be 32 bytes, got {}",
                secret.len()
            )));
        }

        let sk = SecretKey::from_slice(secret)
            .map_err(|_| SignerError::invalid_key("Secret is not a valid secp256k1 scalar"))?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &sk);

        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(secret);

        Ok(Self {
            secret: bytes,
            public_key,
            compressed: true,
        })
    }

    /// Hex scalar, left-padded when leading zero bytes were dropped
    pub fn from_hex_secret(secret_hex: &str) -> SignerResult<Self> {
        let trimmed = secret_hex.trim();
        if trimmed.is_empty() || trimmed.len() > 64 {
            return Err(SignerError::invalid_key("Hex secret must be 1 to 64 hex characters"));
        }

        let padded = Zeroizing::new(format!("{:0>64}", trimmed));
        let bytes = Zeroizing::new(
            hex::decode(padded.as_str()).map_err(|_| SignerError::invalid_key("Hex secret is not valid hex"))?,
        );
        Self::from_raw_secret(&bytes)
    }

    /// Decode a Base58Check WIF secret. A trailing 0x01 selects the
    /// compressed public key.
    pub fn from_encoded_secret(encoded: &str) -> SignerResult<Self> {
        let decoded = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|e| SignerError::invalid_key_encoding(format!("Invalid base58: {}", e)))?,
        );

        if decoded.len() < 5 {
            return Err(SignerError::invalid_key_encoding("Encoded secret is too short"));
        }

        let (payload, checksum) = decoded.split_at(decoded.len() - 4);
        let expected = sha256d::Hash::hash(payload);
        if &expected[..4] != checksum {
            return Err(SignerError::invalid_key_encoding("Invalid checksum"));
        }

        // payload = version || secret || [0x01]
        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == 0x01 => true,
            34 => {
                return Err(SignerError::invalid_key_encoding(
                    "Unknown compression flag in encoded secret",
                ))
            }
            n => {
                return Err(SignerError::invalid_key_encoding(format!(
                    "Encoded secret has unexpected length {}",
                    n
                )))
            }
        };

        let key = Self::from_raw_secret(&payload[1..33]).map_err(|e| {
            SignerError::invalid_key_encoding("Encoded secret is out of range").with_details(e.message)
        })?;
        Ok(key.with_compression(compressed))
    }

    /// Choose which public key form this key matches and exports
    pub fn with_compression(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Public key in the form fixed at construction
    pub fn public_key_hex(&self) -> String {
        self.public_key_hex_as(self.compressed)
    }

    pub fn public_key_hex_as(&self, compressed: bool) -> String {
        hex::encode(self.public_key_bytes_as(compressed))
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key_bytes_as(self.compressed)
    }

    pub fn public_key_bytes_as(&self, compressed: bool) -> Vec<u8> {
        if compressed {
            self.public_key.serialize().to_vec()
        } else {
            self.public_key.serialize_uncompressed().to_vec()
        }
    }

    /// String match against a declared signer key. The declared string's
    /// length tells which form to compare.
    pub fn matches_public_key(&self, declared: &str) -> bool {
        let compressed = declared.len() == 66;
        self.public_key_hex_as(compressed) == declared
    }

    /// Low-R deterministic ECDSA over a 32-byte digest, DER encoded
    pub fn sign(&self, digest: &[u8]) -> SignerResult<Vec<u8>> {
        let digest: [u8; 32] = digest.try_into().map_err(|_| {
            SignerError::invalid_input(format!("Digest must be 32 bytes, got {}", digest.len()))
        })?;

        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(&self.secret[..])?;
        let msg = Message::from_digest(digest);

        for counter in 0..MAX_LOW_R_ATTEMPTS {
            let sig = if counter == 0 {
                secp.sign_ecdsa(&msg, &sk)
            } else {
                secp.sign_ecdsa_with_noncedata(&msg, &sk, &extra_entropy(counter))
            };

            let der = sig.serialize_der();
            if has_low_r(&der) {
                return Ok(der.to_vec());
            }
        }

        Err(SignerError::internal(format!(
            "No low-R signature found after {} attempts",
            MAX_LOW_R_ATTEMPTS
        )))
    }

    pub fn sign_hex(&self, digest_hex: &str) -> SignerResult<String> {
        let digest = hex::decode(digest_hex.trim())?;
        Ok(hex::encode(self.sign(&digest)?))
    }

    /// Explicit export of the raw scalar
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.secret[..]))
    }

    /// Explicit export as WIF for the given network
    pub fn to_wif(&self, network: Network) -> Zeroizing<String> {
        let mut payload = Zeroizing::new(Vec::with_capacity(38));
        payload.push(network.wif_prefix());
        payload.extend_from_slice(&self.secret[..]);
        if self.compressed {
            payload.push(0x01);
        }
        let checksum = sha256d::Hash::hash(&payload);
        payload.extend_from_slice(&checksum[..4]);
        Zeroizing::new(bs58::encode(payload.as_slice()).into_string())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key_hex())
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

/// Compress a 65-byte uncompressed public key: 0x02/0x03 by y parity, then x
pub fn compress_public_key(uncompressed: &[u8]) -> SignerResult<[u8; 33]> {
    if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
        return Err(SignerError::invalid_key("Expected a 65-byte uncompressed public key"));
    }

    let mut out = [0u8; 33];
    out[0] = if uncompressed[64] & 1 == 0 { 0x02 } else { 0x03 };
    out[1..].copy_from_slice(&uncompressed[1..33]);
    Ok(out)
}

/// Counter as a 32-byte little-endian integer
fn extra_entropy(counter: u32) -> [u8; 32] {
    let mut data = [0u8; 32];
    data[..4].copy_from_slice(&counter.to_le_bytes());
    data
}

/// DER: 0x30 len 0x02 rlen r... ; low-R means rlen == 32 and r[0] < 0x80
fn has_low_r(der: &[u8]) -> bool {
    der.len() > 4 && der[3] == 0x20 && der[4] < 0x80
}

/// SHA-256 output is below 2n, so one conditional subtraction reduces it
fn reduce_mod_order(mut value: [u8; 32]) -> [u8; 32] {
    if value.as_slice() < CURVE_ORDER.as_slice() {
        return value;
    }

    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let diff = value[i] as i16 - CURVE_ORDER[i] as i16 - borrow;
        if diff < 0 {
            value[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            value[i] = diff as u8;
            borrow = 0;
        }
    }
    value
}
