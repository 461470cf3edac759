//! Block.io Signer Library
//!
//! Client-side signing for partially-custodial multisig wallets. The
//! remote service prepares unsigned transactions; this crate rebuilds
//! them, checks they match what the service claims, signs locally and
//! assembles the final transaction.
//!
//! # Architecture
//!
//! - **crypto**: secp256k1 key material and PIN-encrypted passphrases
//! - **script**: var-ints, data pushes, script templates, address decoding
//! - **tx**: transaction serialization and signature digests
//! - **signing**: prepared-transaction assembly and signature requests
//! - **api**: remote method dispatch, PIN session, HTTP transport
//!
//! # Security
//!
//! Secrets are held in `zeroize` wrappers and cleared on drop. The PIN is
//! a `secrecy::SecretString` and is only exposed to key stretching.
//!
//! # Example
//!
//! ```rust,ignore
//! use blockio_signer::{create_and_sign_transaction, KeyMaterial, PreparedTransaction};
//!
//! let prepared = PreparedTransaction::from_json(&response_body)?;
//! let key = KeyMaterial::from_hex_secret(&secret_hex)?;
//! let payload = create_and_sign_transaction(&prepared, &[key])?;
//! println!("{}", payload.tx_hex);
//! ```

pub mod api;
pub mod crypto;
pub mod error;
pub mod script;
pub mod signing;
pub mod tx;
pub mod types;
pub mod utils;

pub use error::{ErrorCode, SignerError, SignerResult};
pub use types::*;

pub use api::{Client, Session};
pub use crypto::{dynamic_extract_key, stretch, EncryptedPassphrase, EncryptionKey, KeyMaterial};
pub use signing::{
    create_and_sign_transaction, create_and_sign_with_user_key, summarize_prepared_transaction,
    PreparedTransaction, SignatureRequest, SignedPayload, TransactionSummary,
};
pub use utils::config::ClientConfig;
