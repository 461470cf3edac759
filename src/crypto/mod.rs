//! Key material and passphrase encryption
//!
//! - secp256k1 keypairs with low-R deterministic signing
//! - PIN stretching and AES-256 (ECB/CBC/GCM) passphrase records

pub mod keys;
pub mod passphrase;

pub use keys::{compress_public_key, KeyMaterial};
pub use passphrase::{
    dynamic_extract_key, extract_key_with, stretch, stretch_with, CipherKind, EncryptedPassphrase,
    EncryptionAlgorithm, EncryptionKey, KdfParams,
};
